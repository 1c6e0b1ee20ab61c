//! Diff cleanup passes: merge, semantic and efficiency.

use crate::ops::DiffList;
use crate::ops::DiffOp;
use crate::units::{common_overlap, common_prefix, common_suffix, from_runs, to_runs, Run, Units};
use crate::TextDiff;

impl TextDiff {
    /// Reduces the number of edits by eliminating semantically trivial
    /// equalities, aligning edits to logical boundaries and extracting
    /// overlaps between adjacent deletions and insertions.
    pub fn cleanup_semantic(&self, diffs: &mut DiffList) {
        let mut runs = to_runs(diffs);
        cleanup_semantic_runs(&mut runs);
        *diffs = from_runs(runs);
    }

    /// Reduces the number of edits by eliminating operationally trivial
    /// equalities shorter than the configured edit cost.
    pub fn cleanup_efficiency(&self, diffs: &mut DiffList) {
        let mut runs = to_runs(diffs);
        cleanup_efficiency_runs(&mut runs, self.config.edit_cost);
        *diffs = from_runs(runs);
    }
}

/// Reorders and merges like edit sections, factoring out commonalities.
/// Any edit section can move as long as it doesn't cross an equality.
pub(crate) fn cleanup_merge_runs(diffs: &mut Vec<Run>) {
    diffs.push(Run::new(DiffOp::Equal, Vec::new()));
    let mut pointer = 0usize;
    let mut count_delete = 0usize;
    let mut count_insert = 0usize;
    let mut text_delete: Units = Vec::new();
    let mut text_insert: Units = Vec::new();

    while pointer < diffs.len() {
        if pointer < diffs.len() - 1 && diffs[pointer].units.is_empty() {
            diffs.remove(pointer);
            continue;
        }
        match diffs[pointer].op {
            DiffOp::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&diffs[pointer].units);
                pointer += 1;
            }
            DiffOp::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&diffs[pointer].units);
                pointer += 1;
            }
            DiffOp::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        // Factor out any common prefix.
                        let prefix_len = common_prefix(&text_insert, &text_delete);
                        if prefix_len != 0 {
                            let start = pointer - count_delete - count_insert;
                            if start > 0 && diffs[start - 1].op == DiffOp::Equal {
                                let prefix = text_insert[..prefix_len].to_vec();
                                diffs[start - 1].units.extend(prefix);
                            } else {
                                diffs.insert(
                                    0,
                                    Run::new(DiffOp::Equal, text_insert[..prefix_len].to_vec()),
                                );
                                pointer += 1;
                            }
                            text_insert.drain(..prefix_len);
                            text_delete.drain(..prefix_len);
                        }
                        // Factor out any common suffix.
                        let suffix_len = common_suffix(&text_insert, &text_delete);
                        if suffix_len != 0 {
                            let mut merged =
                                text_insert[text_insert.len() - suffix_len..].to_vec();
                            merged.extend_from_slice(&diffs[pointer].units);
                            diffs[pointer].units = merged;
                            text_insert.truncate(text_insert.len() - suffix_len);
                            text_delete.truncate(text_delete.len() - suffix_len);
                        }
                    }
                    // Replace the run of edits with the merged pair.
                    pointer -= count_delete + count_insert;
                    diffs.drain(pointer..pointer + count_delete + count_insert);
                    if !text_delete.is_empty() {
                        diffs.insert(pointer, Run::new(DiffOp::Delete, text_delete.clone()));
                        pointer += 1;
                    }
                    if !text_insert.is_empty() {
                        diffs.insert(pointer, Run::new(DiffOp::Insert, text_insert.clone()));
                        pointer += 1;
                    }
                    pointer += 1;
                } else if pointer != 0 && diffs[pointer - 1].op == DiffOp::Equal {
                    // Merge this equality with the previous one.
                    let units = std::mem::take(&mut diffs[pointer].units);
                    diffs[pointer - 1].units.extend(units);
                    diffs.remove(pointer);
                } else {
                    pointer += 1;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }
    if diffs.last().is_some_and(|r| r.units.is_empty()) {
        diffs.pop();
    }

    // Second pass: look for single edits surrounded on both sides by
    // equalities which can be shifted sideways to eliminate an equality,
    // e.g. A<ins>BA</ins>C -> <ins>AB</ins>AC.
    let mut changes = false;
    let mut pointer = 1usize;
    while pointer + 1 < diffs.len() {
        if diffs[pointer - 1].op == DiffOp::Equal && diffs[pointer + 1].op == DiffOp::Equal {
            let prev = diffs[pointer - 1].units.clone();
            let edit = diffs[pointer].units.clone();
            let next = diffs[pointer + 1].units.clone();
            if edit.len() >= prev.len() && edit[edit.len() - prev.len()..] == prev[..] {
                // Shift the edit over the previous equality.
                let mut shifted = prev.clone();
                shifted.extend_from_slice(&edit[..edit.len() - prev.len()]);
                diffs[pointer].units = shifted;
                let mut merged = prev;
                merged.extend(next);
                diffs[pointer + 1].units = merged;
                diffs.remove(pointer - 1);
                changes = true;
            } else if edit.len() >= next.len() && edit[..next.len()] == next[..] {
                // Shift the edit over the next equality.
                diffs[pointer - 1].units.extend_from_slice(&next);
                let mut shifted = edit[next.len()..].to_vec();
                shifted.extend_from_slice(&next);
                diffs[pointer].units = shifted;
                diffs.remove(pointer + 1);
                changes = true;
            }
        }
        pointer += 1;
    }
    // If shifts were made, the path may have opened up further merges.
    if changes {
        cleanup_merge_runs(diffs);
    }
}

/// Semantic cleanup over unit runs.
pub(crate) fn cleanup_semantic_runs(diffs: &mut Vec<Run>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<Units> = None;
    let mut pointer: isize = 0;
    // Edit lengths on either side of the candidate equality.
    let mut length_insertions1 = 0usize;
    let mut length_deletions1 = 0usize;
    let mut length_insertions2 = 0usize;
    let mut length_deletions2 = 0usize;

    while (pointer as usize) < diffs.len() {
        let idx = pointer as usize;
        if diffs[idx].op == DiffOp::Equal {
            equalities.push(idx);
            length_insertions1 = length_insertions2;
            length_deletions1 = length_deletions2;
            length_insertions2 = 0;
            length_deletions2 = 0;
            last_equality = Some(diffs[idx].units.clone());
        } else {
            if diffs[idx].op == DiffOp::Insert {
                length_insertions2 += diffs[idx].len();
            } else {
                length_deletions2 += diffs[idx].len();
            }
            let eliminate = last_equality.as_ref().is_some_and(|eq| {
                eq.len() <= length_insertions1.max(length_deletions1)
                    && eq.len() <= length_insertions2.max(length_deletions2)
            });
            if eliminate {
                let eq_index = *equalities.last().unwrap_or(&0);
                let eq_units = last_equality.take().unwrap_or_default();
                // Duplicate the equality as a delete, turn the original
                // into an insert.
                diffs.insert(eq_index, Run::new(DiffOp::Delete, eq_units));
                diffs[eq_index + 1].op = DiffOp::Insert;
                equalities.pop();
                // The previous equality needs reevaluation too.
                equalities.pop();
                pointer = equalities.last().map_or(-1, |&i| i as isize);
                length_insertions1 = 0;
                length_deletions1 = 0;
                length_insertions2 = 0;
                length_deletions2 = 0;
                changes = true;
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge_runs(diffs);
    }
    cleanup_semantic_lossless_runs(diffs);

    // Find overlaps between adjacent deletions and insertions and hoist
    // them out as equalities when the overlap covers at least half of
    // either edit, e.g. <del>abcxxx</del><ins>xxxdef</ins> ->
    // <del>abc</del>xxx<ins>def</ins>.
    let mut pointer = 1usize;
    while pointer < diffs.len() {
        if diffs[pointer - 1].op == DiffOp::Delete && diffs[pointer].op == DiffOp::Insert {
            let deletion = diffs[pointer - 1].units.clone();
            let insertion = diffs[pointer].units.clone();
            let overlap_length1 = common_overlap(&deletion, &insertion);
            let overlap_length2 = common_overlap(&insertion, &deletion);
            if overlap_length1 >= overlap_length2 {
                if overlap_length1 * 2 >= deletion.len() || overlap_length1 * 2 >= insertion.len()
                {
                    diffs.insert(
                        pointer,
                        Run::new(DiffOp::Equal, insertion[..overlap_length1].to_vec()),
                    );
                    diffs[pointer - 1].units =
                        deletion[..deletion.len() - overlap_length1].to_vec();
                    diffs[pointer + 1].units = insertion[overlap_length1..].to_vec();
                    pointer += 1;
                }
            } else if overlap_length2 * 2 >= deletion.len()
                || overlap_length2 * 2 >= insertion.len()
            {
                // Reverse overlap: the edits switch sides around it.
                diffs.insert(
                    pointer,
                    Run::new(DiffOp::Equal, deletion[..overlap_length2].to_vec()),
                );
                diffs[pointer - 1] = Run::new(
                    DiffOp::Insert,
                    insertion[..insertion.len() - overlap_length2].to_vec(),
                );
                diffs[pointer + 1] =
                    Run::new(DiffOp::Delete, deletion[overlap_length2..].to_vec());
                pointer += 1;
            }
            pointer += 1;
        }
        pointer += 1;
    }
}

/// Slides edits sideways to align them with logical boundaries, preferring
/// (in order) blank lines, line breaks, sentence ends, whitespace and
/// non-alphanumeric characters.
pub(crate) fn cleanup_semantic_lossless_runs(diffs: &mut Vec<Run>) {
    let mut pointer = 1usize;
    while pointer + 1 < diffs.len() {
        if diffs[pointer - 1].op == DiffOp::Equal && diffs[pointer + 1].op == DiffOp::Equal {
            let mut equality1 = diffs[pointer - 1].units.clone();
            let mut edit = diffs[pointer].units.clone();
            let mut equality2 = diffs[pointer + 1].units.clone();

            // First, shift the edit as far left as possible.
            let common_offset = common_suffix(&equality1, &edit);
            if common_offset > 0 {
                let common = edit[edit.len() - common_offset..].to_vec();
                equality1.truncate(equality1.len() - common_offset);
                let mut shifted = common.clone();
                shifted.extend_from_slice(&edit[..edit.len() - common_offset]);
                edit = shifted;
                let mut prefixed = common;
                prefixed.extend(equality2);
                equality2 = prefixed;
            }

            // Then step rightwards, keeping the best-scoring split.
            let mut best_equality1 = equality1.clone();
            let mut best_edit = edit.clone();
            let mut best_equality2 = equality2.clone();
            let mut best_score =
                boundary_score(&equality1, &edit) + boundary_score(&edit, &equality2);
            while !edit.is_empty() && !equality2.is_empty() && edit[0] == equality2[0] {
                let unit = edit[0];
                equality1.push(unit);
                edit.remove(0);
                edit.push(equality2[0]);
                equality2.remove(0);
                let score = boundary_score(&equality1, &edit) + boundary_score(&edit, &equality2);
                // >= favors the rightmost (trailing) position.
                if score >= best_score {
                    best_score = score;
                    best_equality1 = equality1.clone();
                    best_edit = edit.clone();
                    best_equality2 = equality2.clone();
                }
            }

            if diffs[pointer - 1].units != best_equality1 {
                if !best_equality1.is_empty() {
                    diffs[pointer - 1].units = best_equality1;
                } else {
                    diffs.remove(pointer - 1);
                    pointer -= 1;
                }
                diffs[pointer].units = best_edit;
                if !best_equality2.is_empty() {
                    diffs[pointer + 1].units = best_equality2;
                } else {
                    diffs.remove(pointer + 1);
                    pointer = pointer.saturating_sub(1);
                }
            }
        }
        pointer += 1;
    }
}

/// Scores a split between two buffers: 6 at a buffer edge, 5 at a blank
/// line, 4 at a line break, 3 after a sentence, 2 at whitespace, 1 at a
/// non-alphanumeric character, 0 otherwise.
fn boundary_score(one: &[u16], two: &[u16]) -> u32 {
    let (last, first) = match (one.last(), two.first()) {
        (Some(&l), Some(&f)) => (l, f),
        // Edges are the best place to split.
        _ => return 6,
    };

    let non_alnum1 = !unit_is_alnum(last);
    let non_alnum2 = !unit_is_alnum(first);
    let whitespace1 = non_alnum1 && unit_is_whitespace(last);
    let whitespace2 = non_alnum2 && unit_is_whitespace(first);
    let line_break1 = whitespace1 && unit_is_line_break(last);
    let line_break2 = whitespace2 && unit_is_line_break(first);
    let blank_line1 = line_break1 && ends_with_blank_line(one);
    let blank_line2 = line_break2 && starts_with_blank_line(two);

    if blank_line1 || blank_line2 {
        5
    } else if line_break1 || line_break2 {
        4
    } else if non_alnum1 && !whitespace1 && whitespace2 {
        // End of sentence.
        3
    } else if whitespace1 || whitespace2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

fn unit_is_alnum(unit: u16) -> bool {
    matches!(unit, 0x30..=0x39 | 0x41..=0x5a | 0x61..=0x7a)
}

fn unit_is_whitespace(unit: u16) -> bool {
    char::from_u32(u32::from(unit)).is_some_and(char::is_whitespace)
}

fn unit_is_line_break(unit: u16) -> bool {
    unit == 0x0a || unit == 0x0d
}

/// Matches `\n\r?\n` at the end of the buffer.
fn ends_with_blank_line(units: &[u16]) -> bool {
    let n = units.len();
    (n >= 2 && units[n - 2..] == [0x0a, 0x0a])
        || (n >= 3 && units[n - 3..] == [0x0a, 0x0d, 0x0a])
}

/// Matches `^\r?\n\r?\n` at the start of the buffer.
fn starts_with_blank_line(units: &[u16]) -> bool {
    let variants: [&[u16]; 4] = [
        &[0x0a, 0x0a],
        &[0x0a, 0x0d, 0x0a],
        &[0x0d, 0x0a, 0x0a],
        &[0x0d, 0x0a, 0x0d, 0x0a],
    ];
    variants.iter().any(|v| units.starts_with(v))
}

/// Efficiency cleanup over unit runs.
pub(crate) fn cleanup_efficiency_runs(diffs: &mut Vec<Run>, edit_cost: usize) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<Units> = None;
    let mut pointer: isize = 0;
    // Is there an insertion/deletion before/after the candidate equality?
    let mut pre_ins = false;
    let mut pre_del = false;
    let mut post_ins = false;
    let mut post_del = false;

    while (pointer as usize) < diffs.len() {
        let idx = pointer as usize;
        if diffs[idx].op == DiffOp::Equal {
            if diffs[idx].len() < edit_cost && (post_ins || post_del) {
                // Candidate found.
                equalities.push(idx);
                pre_ins = post_ins;
                pre_del = post_del;
                last_equality = Some(diffs[idx].units.clone());
            } else {
                // Not a candidate, and can never become one.
                equalities.clear();
                last_equality = None;
            }
            post_ins = false;
            post_del = false;
        } else {
            if diffs[idx].op == DiffOp::Delete {
                post_del = true;
            } else {
                post_ins = true;
            }
            // Five types to be split:
            // <ins>A</ins><del>B</del>XY<ins>C</ins><del>D</del>
            // <ins>A</ins>X<ins>C</ins><del>D</del>
            // <ins>A</ins><del>B</del>X<ins>C</ins>
            // <ins>A</del>X<ins>C</ins><del>D</del>
            // <ins>A</ins><del>B</del>X<del>C</del>
            let flags =
                usize::from(pre_ins) + usize::from(pre_del) + usize::from(post_ins) + usize::from(post_del);
            let eliminate = last_equality.as_ref().is_some_and(|eq| {
                (pre_ins && pre_del && post_ins && post_del)
                    || (eq.len() * 2 < edit_cost && flags == 3)
            });
            if eliminate {
                let eq_index = *equalities.last().unwrap_or(&0);
                let eq_units = last_equality.take().unwrap_or_default();
                diffs.insert(eq_index, Run::new(DiffOp::Delete, eq_units));
                diffs[eq_index + 1].op = DiffOp::Insert;
                equalities.pop();
                if pre_ins && pre_del {
                    // No changes made which could affect previous entry,
                    // keep going.
                    post_ins = true;
                    post_del = true;
                    equalities.clear();
                } else {
                    equalities.pop();
                    pointer = equalities.last().map_or(-1, |&i| i as isize);
                    post_ins = false;
                    post_del = false;
                }
                changes = true;
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge_runs(diffs);
    }
}
