//! UTF-16 code unit buffers.
//!
//! All diff positions and lengths on the wire are UTF-16 code-unit offsets,
//! so the kernel does its arithmetic on `Vec<u16>` buffers and converts to
//! `String` only at the API boundary. Conversion shifts stray surrogate
//! halves out of equalities so every emitted operation is valid UTF-8.

use crate::ops::{Diff, DiffList, DiffOp};

/// A UTF-16 code unit buffer.
pub(crate) type Units = Vec<u16>;

/// A single diff run over code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Run {
    pub op: DiffOp,
    pub units: Units,
}

impl Run {
    pub fn new(op: DiffOp, units: Units) -> Self {
        Self { op, units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }
}

/// Encodes a string as UTF-16 code units.
pub(crate) fn units_of(text: &str) -> Units {
    text.encode_utf16().collect()
}

/// Decodes code units to a string, replacing unpaired surrogates.
pub(crate) fn text_of(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Returns the UTF-16 length of a string.
pub(crate) fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

pub(crate) fn is_high_surrogate(unit: u16) -> bool {
    (0xd800..=0xdbff).contains(&unit)
}

pub(crate) fn is_low_surrogate(unit: u16) -> bool {
    (0xdc00..=0xdfff).contains(&unit)
}

/// Length of the common prefix of two buffers.
///
/// Binary search over halving windows, so the cost is O(log n) slice
/// comparisons rather than a unit-at-a-time scan.
pub(crate) fn common_prefix(a: &[u16], b: &[u16]) -> usize {
    if a.is_empty() || b.is_empty() || a[0] != b[0] {
        return 0;
    }
    let mut min = 0usize;
    let mut max = a.len().min(b.len());
    let mut mid = max;
    let mut start = 0usize;
    while min < mid {
        if a[start..mid] == b[start..mid] {
            min = mid;
            start = min;
        } else {
            max = mid;
        }
        mid = (max - min) / 2 + min;
    }
    mid
}

/// Length of the common suffix of two buffers.
pub(crate) fn common_suffix(a: &[u16], b: &[u16]) -> usize {
    if a.is_empty() || b.is_empty() || a.last() != b.last() {
        return 0;
    }
    let mut min = 0usize;
    let mut max = a.len().min(b.len());
    let mut mid = max;
    let mut end = 0usize;
    while min < mid {
        if a[a.len() - mid..a.len() - end] == b[b.len() - mid..b.len() - end] {
            min = mid;
            end = min;
        } else {
            max = mid;
        }
        mid = (max - min) / 2 + min;
    }
    mid
}

/// Length of the longest suffix of `a` that is a prefix of `b`.
pub(crate) fn common_overlap(a: &[u16], b: &[u16]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Truncate to equal lengths.
    let (a, b) = if a.len() > b.len() {
        (&a[a.len() - b.len()..], b)
    } else {
        (a, &b[..a.len()])
    };
    let min_len = a.len();
    if a == b {
        return min_len;
    }

    // Start with a single-unit overlap candidate and grow it using the
    // position of the candidate inside `b` (a string-matching trick that
    // skips impossible lengths).
    let mut best = 0usize;
    let mut length = 1usize;
    loop {
        if length > min_len {
            return best;
        }
        let pattern = &a[min_len - length..];
        let found = match find_sub(b, pattern) {
            Some(pos) => pos,
            None => return best,
        };
        length += found;
        if length > min_len {
            return best;
        }
        if found == 0 || a[min_len - length..] == b[..length] {
            best = length;
            length += 1;
        }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_sub(haystack: &[u16], needle: &[u16]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the first occurrence of `needle` at or after `from`.
pub(crate) fn find_sub_from(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    find_sub(&haystack[from..], needle).map(|p| p + from)
}

/// Position of the last occurrence of `needle` starting at or before `from`.
pub(crate) fn rfind_sub_until(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    let last_start = from.min(haystack.len().checked_sub(needle.len())?);
    (0..=last_start)
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// Converts a public diff list to unit runs.
pub(crate) fn to_runs(diffs: &[Diff]) -> Vec<Run> {
    diffs
        .iter()
        .map(|d| Run::new(d.op, units_of(&d.text)))
        .collect()
}

/// Converts unit runs to the public diff list.
///
/// Before conversion, surrogate pairs split across an equality boundary are
/// repaired: a trailing high surrogate on an equality migrates into the
/// adjacent delete and insert runs, and likewise for a leading low
/// surrogate. Moving the unit into both sides preserves the source and
/// target texts. Valid UTF-16 inputs always leave both runs present at such
/// a boundary, so the repair never invents an operation.
pub(crate) fn from_runs(mut runs: Vec<Run>) -> DiffList {
    fix_surrogate_boundaries(&mut runs);
    runs.into_iter()
        .filter(|r| !r.units.is_empty())
        .map(|r| Diff::new(r.op, text_of(&r.units)))
        .collect()
}

fn fix_surrogate_boundaries(runs: &mut Vec<Run>) {
    let mut i = 0;
    while i < runs.len() {
        if runs[i].op != DiffOp::Equal {
            i += 1;
            continue;
        }
        // Trailing high surrogate: push into the delete/insert runs that
        // follow this equality.
        if runs[i].units.last().copied().is_some_and(is_high_surrogate) {
            let stray = runs[i].units.pop().unwrap_or_default();
            let mut j = i + 1;
            while j < runs.len() && runs[j].op != DiffOp::Equal {
                runs[j].units.insert(0, stray);
                j += 1;
            }
        }
        // Leading low surrogate: push into the delete/insert runs that
        // precede this equality.
        if runs[i].units.first().copied().is_some_and(is_low_surrogate) && i > 0 {
            let stray = runs[i].units.remove(0);
            let mut j = i;
            while j > 0 && runs[j - 1].op != DiffOp::Equal {
                runs[j - 1].units.push(stray);
                j -= 1;
            }
        }
        i += 1;
    }

    // Dropping emptied equalities can leave same-op neighbors; coalesce
    // them without re-running affix factoring (which would undo the fix).
    runs.retain(|r| !r.units.is_empty() || r.op != DiffOp::Equal);
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        match merged.last_mut() {
            Some(last) if last.op == run.op => last.units.extend(run.units),
            _ => merged.push(run),
        }
    }
    *runs = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_suffix() {
        let a = units_of("1234abcdef");
        let b = units_of("1234xyz");
        assert_eq!(common_prefix(&a, &b), 4);
        assert_eq!(common_prefix(&units_of("abc"), &units_of("xyz")), 0);
        assert_eq!(common_prefix(&units_of("1234"), &units_of("1234xyz")), 4);

        let a = units_of("abcdef1234");
        let b = units_of("xyz1234");
        assert_eq!(common_suffix(&a, &b), 4);
        assert_eq!(common_suffix(&units_of("abc"), &units_of("xyz")), 0);
        assert_eq!(common_suffix(&units_of("1234"), &units_of("xyz1234")), 4);
    }

    #[test]
    fn overlap() {
        assert_eq!(common_overlap(&units_of(""), &units_of("abcd")), 0);
        assert_eq!(common_overlap(&units_of("abc"), &units_of("abcd")), 3);
        assert_eq!(common_overlap(&units_of("123456"), &units_of("abcd")), 0);
        assert_eq!(
            common_overlap(&units_of("123456xxx"), &units_of("xxxabcd")),
            3
        );
        // Unit-based overlap is blind to grapheme boundaries.
        assert_eq!(common_overlap(&units_of("fi"), &units_of("\u{fb01}i")), 0);
    }

    #[test]
    fn substring_search() {
        let hay = units_of("abcabcabc");
        assert_eq!(find_sub(&hay, &units_of("cab")), Some(2));
        assert_eq!(find_sub_from(&hay, &units_of("cab"), 3), Some(5));
        assert_eq!(rfind_sub_until(&hay, &units_of("abc"), 9), Some(6));
        assert_eq!(rfind_sub_until(&hay, &units_of("abc"), 5), Some(3));
        assert_eq!(find_sub(&hay, &units_of("zzz")), None);
    }

    #[test]
    fn surrogate_repair_moves_stray_into_both_edits() {
        // Equality ends with the high half of U+1D11E; the edit runs hold
        // the two differing low halves.
        let runs = vec![
            Run::new(DiffOp::Equal, vec![0x61, 0xd834]),
            Run::new(DiffOp::Delete, vec![0xdd1e]),
            Run::new(DiffOp::Insert, vec![0xdd1f]),
        ];
        let diffs = from_runs(runs);
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].text, "a");
        assert_eq!(diffs[1].text, "\u{1d11e}");
        assert_eq!(diffs[2].text, "\u{1d11f}");
    }

    #[test]
    fn roundtrip_plain_runs() {
        let runs = vec![
            Run::new(DiffOp::Equal, units_of("abc")),
            Run::new(DiffOp::Insert, units_of("def")),
        ];
        let diffs = from_runs(runs);
        assert_eq!(diffs[0].text, "abc");
        assert_eq!(diffs[1].text, "def");
    }
}
