//! Core diff algorithm: prefix/suffix trim, short-circuits, half-match,
//! line mode and the Myers bisect.

use std::collections::HashMap;
use std::time::Instant;

use crate::cleanup::{cleanup_merge_runs, cleanup_semantic_runs};
use crate::ops::{DiffList, DiffOp};
use crate::units::{
    common_prefix, common_suffix, find_sub, find_sub_from, from_runs, units_of, Run, Units,
};
use crate::TextDiff;

impl TextDiff {
    /// Computes the edit script transforming `a` into `b`.
    ///
    /// Line-level pre-diffing is enabled for large inputs; the time budget
    /// comes from the configuration. For explicit control use
    /// [`TextDiff::diff_main_opt`].
    pub fn diff_main(&self, a: &str, b: &str) -> DiffList {
        self.diff_main_opt(a, b, true, self.deadline())
    }

    /// Computes an edit script with explicit line-mode and deadline control.
    ///
    /// When `deadline` passes mid-computation the bisect bails out to a
    /// coarse delete+insert for the remaining span; the result is still a
    /// valid (just non-minimal) diff.
    pub fn diff_main_opt(
        &self,
        a: &str,
        b: &str,
        check_lines: bool,
        deadline: Option<Instant>,
    ) -> DiffList {
        let runs = diff_units(&units_of(a), &units_of(b), check_lines, deadline);
        from_runs(runs)
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.config.timeout.map(|t| Instant::now() + t)
    }
}

/// Diff over code-unit buffers. All internal recursion goes through here.
pub(crate) fn diff_units(
    a: &[u16],
    b: &[u16],
    check_lines: bool,
    deadline: Option<Instant>,
) -> Vec<Run> {
    if a == b {
        if a.is_empty() {
            return Vec::new();
        }
        return vec![Run::new(DiffOp::Equal, a.to_vec())];
    }

    // Trim common prefix and suffix; diff only the middle block.
    let prefix_len = common_prefix(a, b);
    let suffix_len = common_suffix(&a[prefix_len..], &b[prefix_len..]);
    let mid_a = &a[prefix_len..a.len() - suffix_len];
    let mid_b = &b[prefix_len..b.len() - suffix_len];

    let mut diffs = compute(mid_a, mid_b, check_lines, deadline);
    if prefix_len > 0 {
        diffs.insert(0, Run::new(DiffOp::Equal, a[..prefix_len].to_vec()));
    }
    if suffix_len > 0 {
        diffs.push(Run::new(DiffOp::Equal, a[a.len() - suffix_len..].to_vec()));
    }
    cleanup_merge_runs(&mut diffs);
    diffs
}

/// Diff assuming no common prefix or suffix.
fn compute(a: &[u16], b: &[u16], check_lines: bool, deadline: Option<Instant>) -> Vec<Run> {
    if a.is_empty() {
        return vec![Run::new(DiffOp::Insert, b.to_vec())];
    }
    if b.is_empty() {
        return vec![Run::new(DiffOp::Delete, a.to_vec())];
    }

    let (long, short, a_is_long) = if a.len() > b.len() {
        (a, b, true)
    } else {
        (b, a, false)
    };

    if let Some(i) = find_sub(long, short) {
        // The shorter text sits inside the longer one.
        let op = if a_is_long {
            DiffOp::Delete
        } else {
            DiffOp::Insert
        };
        return vec![
            Run::new(op, long[..i].to_vec()),
            Run::new(DiffOp::Equal, short.to_vec()),
            Run::new(op, long[i + short.len()..].to_vec()),
        ];
    }

    if short.len() == 1 {
        // Single-unit short side after the substring check failed: no
        // commonality is possible.
        return vec![
            Run::new(DiffOp::Delete, a.to_vec()),
            Run::new(DiffOp::Insert, b.to_vec()),
        ];
    }

    // The half-match heuristic trades optimality for speed, so it only
    // runs when a time budget is in force.
    if deadline.is_some() {
        if let Some(hm) = half_match(a, b) {
            let mut diffs = diff_units(&hm.a_head, &hm.b_head, check_lines, deadline);
            diffs.push(Run::new(DiffOp::Equal, hm.common));
            diffs.extend(diff_units(&hm.a_tail, &hm.b_tail, check_lines, deadline));
            return diffs;
        }
    }

    if check_lines && a.len() > 100 && b.len() > 100 {
        return line_mode(a, b, deadline);
    }

    bisect(a, b, deadline)
}

struct HalfMatch {
    a_head: Units,
    a_tail: Units,
    b_head: Units,
    b_tail: Units,
    common: Units,
}

/// Finds a substring shared by both texts that is at least half the length
/// of the longer text, seeded at its first and second quarter points.
fn half_match(a: &[u16], b: &[u16]) -> Option<HalfMatch> {
    let (long, short) = if a.len() > b.len() { (a, b) } else { (b, a) };
    if long.len() < 4 || short.len() * 2 < long.len() {
        return None;
    }

    let hm1 = half_match_at(long, short, (long.len() + 3) / 4);
    let hm2 = half_match_at(long, short, (long.len() + 1) / 2);
    let hm = match (hm1, hm2) {
        (None, None) => return None,
        (Some(h), None) | (None, Some(h)) => h,
        (Some(h1), Some(h2)) => {
            if h1.4.len() > h2.4.len() {
                h1
            } else {
                h2
            }
        }
    };

    let (long_head, long_tail, short_head, short_tail, common) = hm;
    Some(if a.len() > b.len() {
        HalfMatch {
            a_head: long_head,
            a_tail: long_tail,
            b_head: short_head,
            b_tail: short_tail,
            common,
        }
    } else {
        HalfMatch {
            a_head: short_head,
            a_tail: short_tail,
            b_head: long_head,
            b_tail: long_tail,
            common,
        }
    })
}

type HalfMatchParts = (Units, Units, Units, Units, Units);

/// Checks whether a substring of `short` matches a seed taken from `long`
/// at `i`, extending the match as far as possible in both directions.
fn half_match_at(long: &[u16], short: &[u16], i: usize) -> Option<HalfMatchParts> {
    let seed = &long[i..i + long.len() / 4];
    let mut best_common: Units = Vec::new();
    let mut best = (0usize, 0usize); // (i - suffix, j - suffix) anchors
    let mut best_prefix = 0usize;
    let mut best_suffix = 0usize;

    let mut j_opt = find_sub_from(short, seed, 0);
    while let Some(j) = j_opt {
        let prefix_length = common_prefix(&long[i..], &short[j..]);
        let suffix_length = common_suffix(&long[..i], &short[..j]);
        if best_common.len() < suffix_length + prefix_length {
            best_common = short[j - suffix_length..j + prefix_length].to_vec();
            best = (i - suffix_length, j - suffix_length);
            best_prefix = prefix_length;
            best_suffix = suffix_length;
        }
        j_opt = find_sub_from(short, seed, j + 1);
    }

    if best_common.len() * 2 >= long.len() {
        let (ls, ss) = best;
        Some((
            long[..ls].to_vec(),
            long[ls + best_suffix + best_prefix..].to_vec(),
            short[..ss].to_vec(),
            short[ss + best_suffix + best_prefix..].to_vec(),
            best_common,
        ))
    } else {
        None
    }
}

/// Line-level pre-pass: map each line to a dictionary index, diff the index
/// sequences, rehydrate, then re-diff changed regions at unit granularity.
fn line_mode(a: &[u16], b: &[u16], deadline: Option<Instant>) -> Vec<Run> {
    let (encoded_a, encoded_b, line_array) = lines_to_units(a, b);
    let mut diffs = diff_units(&encoded_a, &encoded_b, false, deadline);
    units_to_lines(&mut diffs, &line_array);
    cleanup_semantic_runs(&mut diffs);

    // Re-diff each delete/insert pair for character-level accuracy.
    diffs.push(Run::new(DiffOp::Equal, Vec::new()));
    let mut pointer = 0usize;
    let mut count_delete = 0usize;
    let mut count_insert = 0usize;
    let mut text_delete: Units = Vec::new();
    let mut text_insert: Units = Vec::new();
    while pointer < diffs.len() {
        match diffs[pointer].op {
            DiffOp::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&diffs[pointer].units);
            }
            DiffOp::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&diffs[pointer].units);
            }
            DiffOp::Equal => {
                if count_delete >= 1 && count_insert >= 1 {
                    let sub = diff_units(&text_delete, &text_insert, false, deadline);
                    let start = pointer - count_delete - count_insert;
                    let sub_len = sub.len();
                    diffs.splice(start..pointer, sub);
                    pointer = start + sub_len;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
        pointer += 1;
    }
    diffs.pop();
    diffs
}

/// Encodes each line of both texts as a dictionary index. Index 0 is
/// reserved so that index arithmetic can treat 0 as "no line".
fn lines_to_units(a: &[u16], b: &[u16]) -> (Units, Units, Vec<Units>) {
    let mut line_array: Vec<Units> = vec![Vec::new()];
    let mut line_hash: HashMap<Units, u16> = HashMap::new();
    // Cap the first text's dictionary short of u16::MAX so the second text
    // has room for its own unique lines.
    let encoded_a = encode_lines(a, &mut line_array, &mut line_hash, 40_000);
    let encoded_b = encode_lines(b, &mut line_array, &mut line_hash, 65_535);
    (encoded_a, encoded_b, line_array)
}

fn encode_lines(
    text: &[u16],
    line_array: &mut Vec<Units>,
    line_hash: &mut HashMap<Units, u16>,
    max_lines: usize,
) -> Units {
    let mut units = Vec::new();
    let mut line_start = 0usize;
    while line_start < text.len() {
        let mut line_end = match text[line_start..].iter().position(|&u| u == 0x0a) {
            Some(p) => line_start + p + 1,
            None => text.len(),
        };
        if line_array.len() == max_lines {
            // Dictionary full: the remainder of the text becomes one line.
            line_end = text.len();
        }
        let line = text[line_start..line_end].to_vec();
        match line_hash.get(&line) {
            Some(&index) => units.push(index),
            None => {
                let index = line_array.len() as u16;
                line_hash.insert(line.clone(), index);
                line_array.push(line);
                units.push(index);
            }
        }
        line_start = line_end;
    }
    units
}

/// Rehydrates dictionary indices back into line content.
fn units_to_lines(diffs: &mut [Run], line_array: &[Units]) {
    for run in diffs.iter_mut() {
        let mut text = Vec::new();
        for &index in &run.units {
            text.extend_from_slice(&line_array[index as usize]);
        }
        run.units = text;
    }
}

/// Myers O(ND) bisect: walk the edit graph from both ends and split at the
/// middle snake.
fn bisect(a: &[u16], b: &[u16], deadline: Option<Instant>) -> Vec<Run> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = (n + m + 1) / 2;
    let v_offset = max_d;
    let v_length = (2 * max_d + 2) as usize;
    let mut v1 = vec![-1isize; v_length];
    let mut v2 = vec![-1isize; v_length];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = n - m;
    // With an odd delta the paths can only overlap on the forward sweep;
    // with an even delta only on the reverse sweep.
    let front = delta % 2 != 0;
    let mut k1start = 0isize;
    let mut k1end = 0isize;
    let mut k2start = 0isize;
    let mut k2end = 0isize;

    for d in 0..max_d {
        if deadline.is_some_and(|t| Instant::now() > t) {
            break;
        }

        // Forward path.
        let mut k1 = -d + k1start;
        while k1 <= d - k1end {
            let k1_offset = v_offset + k1;
            let mut x1 = if k1 == -d
                || (k1 != d && v1[(k1_offset - 1) as usize] < v1[(k1_offset + 1) as usize])
            {
                v1[(k1_offset + 1) as usize]
            } else {
                v1[(k1_offset - 1) as usize] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && a[x1 as usize] == b[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset as usize] = x1;
            if x1 > n {
                k1end += 2;
            } else if y1 > m {
                k1start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if k2_offset >= 0 && k2_offset < v_length as isize {
                    let v2_val = v2[k2_offset as usize];
                    if v2_val != -1 && x1 >= n - v2_val {
                        return bisect_split(a, b, x1 as usize, y1 as usize, deadline);
                    }
                }
            }
            k1 += 2;
        }

        // Reverse path.
        let mut k2 = -d + k2start;
        while k2 <= d - k2end {
            let k2_offset = v_offset + k2;
            let mut x2 = if k2 == -d
                || (k2 != d && v2[(k2_offset - 1) as usize] < v2[(k2_offset + 1) as usize])
            {
                v2[(k2_offset + 1) as usize]
            } else {
                v2[(k2_offset - 1) as usize] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n && y2 < m && a[(n - x2 - 1) as usize] == b[(m - y2 - 1) as usize] {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset as usize] = x2;
            if x2 > n {
                k2end += 2;
            } else if y2 > m {
                k2start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if k1_offset >= 0 && k1_offset < v_length as isize {
                    let x1 = v1[k1_offset as usize];
                    if x1 != -1 {
                        let y1 = v_offset + x1 - k1_offset;
                        if x1 >= n - x2 {
                            return bisect_split(a, b, x1 as usize, y1 as usize, deadline);
                        }
                    }
                }
            }
            k2 += 2;
        }
    }

    // Ran out of depth or time: settle for a coarse replacement.
    vec![
        Run::new(DiffOp::Delete, a.to_vec()),
        Run::new(DiffOp::Insert, b.to_vec()),
    ]
}

fn bisect_split(a: &[u16], b: &[u16], x: usize, y: usize, deadline: Option<Instant>) -> Vec<Run> {
    let (a1, a2) = a.split_at(x);
    let (b1, b2) = b.split_at(y);
    let mut diffs = diff_units(a1, b1, false, deadline);
    diffs.extend(diff_units(a2, b2, false, deadline));
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{source_text, target_text, Diff};

    fn engine() -> TextDiff {
        TextDiff::default()
    }

    #[test]
    fn trivial_diffs() {
        assert_eq!(engine().diff_main("", ""), vec![]);
        assert_eq!(engine().diff_main("abc", "abc"), vec![Diff::equal("abc")]);
        assert_eq!(
            engine().diff_main("abc", "abxabc"),
            vec![Diff::insert("abx"), Diff::equal("abc")]
        );
        assert_eq!(
            engine().diff_main("a123bc", "abc"),
            vec![Diff::equal("a"), Diff::delete("123"), Diff::equal("bc")]
        );
    }

    #[test]
    fn simple_insert_and_delete() {
        assert_eq!(engine().diff_main("", "abc"), vec![Diff::insert("abc")]);
        assert_eq!(engine().diff_main("abc", ""), vec![Diff::delete("abc")]);
        assert_eq!(
            engine().diff_main("abc", "ab123c"),
            vec![Diff::equal("ab"), Diff::insert("123"), Diff::equal("c")]
        );
    }

    #[test]
    fn two_sided_edits() {
        assert_eq!(
            engine().diff_main("a123b456c", "abc"),
            vec![
                Diff::equal("a"),
                Diff::delete("123"),
                Diff::equal("b"),
                Diff::delete("456"),
                Diff::equal("c"),
            ]
        );
        assert_eq!(
            engine().diff_main("abc", "a123b456c"),
            vec![
                Diff::equal("a"),
                Diff::insert("123"),
                Diff::equal("b"),
                Diff::insert("456"),
                Diff::equal("c"),
            ]
        );
    }

    #[test]
    fn single_char_replacement() {
        assert_eq!(
            engine().diff_main("a", "b"),
            vec![Diff::delete("a"), Diff::insert("b")]
        );
    }

    #[test]
    fn diff_reconstructs_both_texts() {
        let cases = [
            ("Apples are a fruit.", "Bananas are also fruit."),
            ("ax\t", "\u{0680}x\0"),
            ("1ayb2", "abxab"),
            ("abcy", "xaxcxabc"),
            ("ABCDa=bcd=efghijklmnopqrsEFGHIJKLMNOefg", "a-bcd-efghijklmnopqrs"),
            ("the quick brown fox", "the quick brown fox jumped"),
        ];
        for (a, b) in cases {
            let diffs = engine().diff_main(a, b);
            assert_eq!(source_text(&diffs), *a, "source mismatch for {a:?}");
            assert_eq!(target_text(&diffs), *b, "target mismatch for {a:?}");
        }
    }

    #[test]
    fn diff_astral_plane_text() {
        let a = "music: \u{1d11e} loud";
        let b = "music: \u{1d11f} quiet";
        let diffs = engine().diff_main(a, b);
        assert_eq!(source_text(&diffs), a);
        assert_eq!(target_text(&diffs), b);
        for diff in &diffs {
            assert!(!diff.text.contains('\u{fffd}'), "lone surrogate leaked");
        }
    }

    #[test]
    fn half_match_finds_shared_middle() {
        let hm = half_match(
            &units_of("1234567890"),
            &units_of("a345678z"),
        )
        .expect("half match");
        assert_eq!(hm.a_head, units_of("12"));
        assert_eq!(hm.a_tail, units_of("90"));
        assert_eq!(hm.b_head, units_of("a"));
        assert_eq!(hm.b_tail, units_of("z"));
        assert_eq!(hm.common, units_of("345678"));
    }

    #[test]
    fn half_match_requires_half_length() {
        assert!(half_match(&units_of("1234567890"), &units_of("abcdef")).is_none());
        assert!(half_match(&units_of("12345"), &units_of("23")).is_none());
    }

    #[test]
    fn line_mode_matches_char_mode() {
        let a = "1234567890\n1234567890\n1234567890\n1234567890\n1234567890\n1234567890\n1234567890\n1234567890\n1234567890\n1234567890\n";
        let b = "abcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\nabcdefghij\n";
        let engine = engine();
        let with_lines = engine.diff_main_opt(a, b, true, None);
        let without_lines = engine.diff_main_opt(a, b, false, None);
        assert_eq!(source_text(&with_lines), source_text(&without_lines));
        assert_eq!(target_text(&with_lines), target_text(&without_lines));
    }

    #[test]
    fn line_encoding_assigns_indices() {
        let a = units_of("alpha\nbeta\nalpha\n");
        let b = units_of("beta\nalpha\nbeta\n");
        let (ea, eb, lines) = lines_to_units(&a, &b);
        assert_eq!(ea, vec![1, 2, 1]);
        assert_eq!(eb, vec![2, 1, 2]);
        assert_eq!(lines[1], units_of("alpha\n"));
        assert_eq!(lines[2], units_of("beta\n"));
    }

    #[test]
    fn bisect_splits_at_middle_snake() {
        let a = units_of("cat");
        let b = units_of("map");
        let runs = bisect(&a, &b, None);
        let diffs = from_runs(runs);
        assert_eq!(source_text(&diffs), "cat");
        assert_eq!(target_text(&diffs), "map");
    }
}
