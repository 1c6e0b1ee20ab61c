//! Diff operations and edit-script helpers.

use crate::units::utf16_len;

/// The kind of a single diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffOp {
    /// Text present in the source but not the target.
    Delete,
    /// Text common to source and target.
    Equal,
    /// Text present in the target but not the source.
    Insert,
}

impl DiffOp {
    /// Returns the wire code for this op (-1, 0, +1).
    pub fn code(&self) -> i8 {
        match self {
            DiffOp::Delete => -1,
            DiffOp::Equal => 0,
            DiffOp::Insert => 1,
        }
    }
}

/// A single diff operation: an op kind and the text it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    /// Operation kind.
    pub op: DiffOp,
    /// Covered text.
    pub text: String,
}

impl Diff {
    /// Creates a new diff operation.
    pub fn new(op: DiffOp, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    /// Shorthand for a delete op.
    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(DiffOp::Delete, text)
    }

    /// Shorthand for an equality op.
    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(DiffOp::Equal, text)
    }

    /// Shorthand for an insert op.
    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(DiffOp::Insert, text)
    }
}

/// An edit script: an ordered list of diff operations.
pub type DiffList = Vec<Diff>;

/// Reassembles the source text (equalities and deletions) of a diff.
pub fn source_text(diffs: &[Diff]) -> String {
    let mut text = String::new();
    for diff in diffs {
        if diff.op != DiffOp::Insert {
            text.push_str(&diff.text);
        }
    }
    text
}

/// Reassembles the target text (equalities and insertions) of a diff.
pub fn target_text(diffs: &[Diff]) -> String {
    let mut text = String::new();
    for diff in diffs {
        if diff.op != DiffOp::Delete {
            text.push_str(&diff.text);
        }
    }
    text
}

/// Maps a source-text position through a diff to the target text.
///
/// Positions are UTF-16 code-unit offsets. A position inside a deletion
/// collapses to the start of the deleted run.
pub fn x_index(diffs: &[Diff], loc: usize) -> usize {
    let mut chars1 = 0usize;
    let mut chars2 = 0usize;
    let mut last_chars1 = 0usize;
    let mut last_chars2 = 0usize;
    let mut hit: Option<&Diff> = None;
    for diff in diffs {
        let len = utf16_len(&diff.text);
        if diff.op != DiffOp::Insert {
            chars1 += len;
        }
        if diff.op != DiffOp::Delete {
            chars2 += len;
        }
        if chars1 > loc {
            hit = Some(diff);
            break;
        }
        last_chars1 = chars1;
        last_chars2 = chars2;
    }
    if let Some(diff) = hit {
        if diff.op == DiffOp::Delete {
            return last_chars2;
        }
    }
    last_chars2 + (loc - last_chars1)
}

/// Computes the Levenshtein distance of a diff in code units.
pub fn levenshtein(diffs: &[Diff]) -> usize {
    let mut distance = 0usize;
    let mut insertions = 0usize;
    let mut deletions = 0usize;
    for diff in diffs {
        let len = utf16_len(&diff.text);
        match diff.op {
            DiffOp::Insert => insertions += len,
            DiffOp::Delete => deletions += len,
            DiffOp::Equal => {
                distance += insertions.max(deletions);
                insertions = 0;
                deletions = 0;
            }
        }
    }
    distance + insertions.max(deletions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_codes() {
        assert_eq!(DiffOp::Delete.code(), -1);
        assert_eq!(DiffOp::Equal.code(), 0);
        assert_eq!(DiffOp::Insert.code(), 1);
    }

    #[test]
    fn source_and_target_text() {
        let diffs = vec![
            Diff::equal("jump"),
            Diff::delete("s"),
            Diff::insert("ed"),
            Diff::equal(" over "),
            Diff::delete("the"),
            Diff::insert("a"),
            Diff::equal(" lazy"),
        ];
        assert_eq!(source_text(&diffs), "jumps over the lazy");
        assert_eq!(target_text(&diffs), "jumped over a lazy");
    }

    #[test]
    fn x_index_translation() {
        let diffs = vec![Diff::delete("a"), Diff::insert("1234"), Diff::equal("xyz")];
        assert_eq!(x_index(&diffs, 2), 5);

        let diffs = vec![Diff::equal("a"), Diff::delete("1234"), Diff::equal("xyz")];
        assert_eq!(x_index(&diffs, 3), 1);
    }

    #[test]
    fn x_index_is_monotonic() {
        let diffs = vec![
            Diff::equal("ab"),
            Diff::delete("cd"),
            Diff::insert("XY"),
            Diff::equal("ef"),
        ];
        let mapped: Vec<usize> = (0..=6).map(|loc| x_index(&diffs, loc)).collect();
        for pair in mapped.windows(2) {
            assert!(pair[0] <= pair[1], "x_index regressed: {mapped:?}");
        }
    }

    #[test]
    fn levenshtein_distance() {
        let diffs = vec![Diff::delete("abc"), Diff::insert("1234"), Diff::equal("xyz")];
        assert_eq!(levenshtein(&diffs), 4);

        let diffs = vec![Diff::equal("xyz"), Diff::delete("abc"), Diff::insert("1234")];
        assert_eq!(levenshtein(&diffs), 4);

        let diffs = vec![Diff::delete("abc"), Diff::equal("xyz"), Diff::insert("1234")];
        assert_eq!(levenshtein(&diffs), 7);
    }
}
