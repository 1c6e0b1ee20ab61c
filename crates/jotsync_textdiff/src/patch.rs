//! Fuzzy patches: creation, splitting, padding, application and the
//! GNU-style text serialization.

use crate::config::MAX_BITS;
use crate::delta::{decode_uri, encode_uri};
use crate::error::{TextDiffError, TextDiffResult};
use crate::ops::{Diff, DiffList, DiffOp};
use crate::units::{
    find_sub, is_high_surrogate, is_low_surrogate, rfind_sub_until, text_of, to_runs, units_of,
    Run, Units,
};
use crate::{cleanup, TextDiff};

/// A single patch: an edit script plus the spans it covers in the source
/// and destination texts. Context equalities around the edit allow the
/// patch to relocate under fuzzy application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Patch {
    /// The edit script, including context equalities.
    pub diffs: DiffList,
    /// Span start in the source text (code units).
    pub start1: usize,
    /// Span start in the destination text (code units).
    pub start2: usize,
    /// Span length in the source text.
    pub length1: usize,
    /// Span length in the destination text.
    pub length2: usize,
}

/// Internal unit-level patch used by the make/split/pad/apply pipeline.
#[derive(Debug, Clone, Default)]
struct UPatch {
    diffs: Vec<Run>,
    start1: usize,
    start2: usize,
    length1: usize,
    length2: usize,
}

impl UPatch {
    fn from_patch(patch: &Patch) -> Self {
        Self {
            diffs: to_runs(&patch.diffs),
            start1: patch.start1,
            start2: patch.start2,
            length1: patch.length1,
            length2: patch.length2,
        }
    }

    fn into_patch(self) -> Patch {
        Patch {
            diffs: self
                .diffs
                .into_iter()
                .map(|r| Diff::new(r.op, text_of(&r.units)))
                .collect(),
            start1: self.start1,
            start2: self.start2,
            length1: self.length1,
            length2: self.length2,
        }
    }
}

fn source_units(runs: &[Run]) -> Units {
    let mut out = Vec::new();
    for run in runs {
        if run.op != DiffOp::Insert {
            out.extend_from_slice(&run.units);
        }
    }
    out
}

fn target_units(runs: &[Run]) -> Units {
    let mut out = Vec::new();
    for run in runs {
        if run.op != DiffOp::Delete {
            out.extend_from_slice(&run.units);
        }
    }
    out
}

fn levenshtein_units(runs: &[Run]) -> usize {
    let mut distance = 0usize;
    let mut insertions = 0usize;
    let mut deletions = 0usize;
    for run in runs {
        match run.op {
            DiffOp::Insert => insertions += run.len(),
            DiffOp::Delete => deletions += run.len(),
            DiffOp::Equal => {
                distance += insertions.max(deletions);
                insertions = 0;
                deletions = 0;
            }
        }
    }
    distance + insertions.max(deletions)
}

fn x_index_units(runs: &[Run], loc: usize) -> usize {
    let mut chars1 = 0usize;
    let mut chars2 = 0usize;
    let mut last_chars1 = 0usize;
    let mut last_chars2 = 0usize;
    let mut hit: Option<&Run> = None;
    for run in runs {
        if run.op != DiffOp::Insert {
            chars1 += run.len();
        }
        if run.op != DiffOp::Delete {
            chars2 += run.len();
        }
        if chars1 > loc {
            hit = Some(run);
            break;
        }
        last_chars1 = chars1;
        last_chars2 = chars2;
    }
    if let Some(run) = hit {
        if run.op == DiffOp::Delete {
            return last_chars2;
        }
    }
    last_chars2 + (loc - last_chars1)
}

impl TextDiff {
    /// Computes a list of patches turning `text1` into `text2`.
    pub fn patch_make(&self, text1: &str, text2: &str) -> Vec<Patch> {
        let mut diffs = self.diff_main(text1, text2);
        if diffs.len() > 2 {
            self.cleanup_semantic(&mut diffs);
            self.cleanup_efficiency(&mut diffs);
        }
        self.patch_make_from_diffs(text1, &diffs)
    }

    /// Computes patches from a precomputed diff of `text1`.
    pub fn patch_make_from_diffs(&self, text1: &str, diffs: &[Diff]) -> Vec<Patch> {
        let upatches = self.make_upatches(&units_of(text1), &to_runs(diffs));
        upatches.into_iter().map(UPatch::into_patch).collect()
    }

    fn make_upatches(&self, text1: &[u16], runs: &[Run]) -> Vec<UPatch> {
        if runs.is_empty() {
            return Vec::new();
        }
        let margin = self.config.margin;
        let mut patches: Vec<UPatch> = Vec::new();
        let mut patch = UPatch::default();
        let mut char_count1 = 0usize;
        let mut char_count2 = 0usize;
        // Text representations as the patches would leave them; context is
        // computed against the partially-patched text.
        let mut prepatch_text: Units = text1.to_vec();
        let mut postpatch_text: Units = text1.to_vec();

        for (x, run) in runs.iter().enumerate() {
            if patch.diffs.is_empty() && run.op != DiffOp::Equal {
                patch.start1 = char_count1;
                patch.start2 = char_count2;
            }
            match run.op {
                DiffOp::Insert => {
                    patch.length2 += run.len();
                    patch.diffs.push(run.clone());
                    postpatch_text.splice(char_count2..char_count2, run.units.iter().copied());
                }
                DiffOp::Delete => {
                    patch.length1 += run.len();
                    patch.diffs.push(run.clone());
                    postpatch_text.drain(char_count2..char_count2 + run.len());
                }
                DiffOp::Equal => {
                    if run.len() <= 2 * margin && !patch.diffs.is_empty() && x != runs.len() - 1 {
                        // Small equality inside a patch.
                        patch.length1 += run.len();
                        patch.length2 += run.len();
                        patch.diffs.push(run.clone());
                    } else if run.len() >= 2 * margin && !patch.diffs.is_empty() {
                        // Time for a new patch.
                        self.add_context(&mut patch, &prepatch_text);
                        patches.push(std::mem::take(&mut patch));
                        // The next patch starts against the partially
                        // patched text, keeping start1 and start2 aligned.
                        prepatch_text = postpatch_text.clone();
                        char_count1 = char_count2;
                    }
                }
            }
            if run.op != DiffOp::Insert {
                char_count1 += run.len();
            }
            if run.op != DiffOp::Delete {
                char_count2 += run.len();
            }
        }
        if !patch.diffs.is_empty() {
            self.add_context(&mut patch, &prepatch_text);
            patches.push(patch);
        }
        patches
    }

    /// Grows patch context until the pattern is unique in `text` or the
    /// bitap width is reached.
    fn add_context(&self, patch: &mut UPatch, text: &[u16]) {
        if text.is_empty() {
            return;
        }
        let margin = self.config.margin;
        let mut pattern = text[patch.start2..(patch.start2 + patch.length1).min(text.len())].to_vec();
        let mut padding = 0usize;

        // An empty pattern (pure insertion) is never unique; grow it first.
        while (pattern.is_empty()
            || find_sub(text, &pattern) != rfind_sub_until(text, &pattern, text.len()))
            && pattern.len() < MAX_BITS - 2 * margin
            && pattern.len() < text.len()
        {
            padding += margin;
            let from = patch.start2.saturating_sub(padding);
            let to = (patch.start2 + patch.length1 + padding).min(text.len());
            pattern = text[from..to].to_vec();
        }
        // One margin of breathing room beyond the unique window.
        padding += margin;

        // Context boundaries must not land inside a surrogate pair.
        let mut prefix_from = patch.start2.saturating_sub(padding);
        if prefix_from > 0
            && prefix_from < text.len()
            && is_low_surrogate(text[prefix_from])
        {
            prefix_from -= 1;
        }
        let prefix = &text[prefix_from..patch.start2];
        if !prefix.is_empty() {
            patch.diffs.insert(0, Run::new(DiffOp::Equal, prefix.to_vec()));
        }
        let suffix_from = (patch.start2 + patch.length1).min(text.len());
        let mut suffix_to = (patch.start2 + patch.length1 + padding).min(text.len());
        if suffix_to > suffix_from
            && suffix_to < text.len()
            && is_high_surrogate(text[suffix_to - 1])
        {
            suffix_to += 1;
        }
        let suffix = &text[suffix_from..suffix_to];
        if !suffix.is_empty() {
            patch.diffs.push(Run::new(DiffOp::Equal, suffix.to_vec()));
        }

        patch.start1 -= prefix.len();
        patch.start2 -= prefix.len();
        patch.length1 += prefix.len() + suffix.len();
        patch.length2 += prefix.len() + suffix.len();
    }

    /// Splits patches so no single patch spans more than the bitap width.
    pub fn patch_split_max(&self, patches: &mut Vec<Patch>) {
        let mut upatches: Vec<UPatch> = patches.iter().map(UPatch::from_patch).collect();
        self.split_max_internal(&mut upatches);
        *patches = upatches.into_iter().map(UPatch::into_patch).collect();
    }

    fn split_max_internal(&self, patches: &mut Vec<UPatch>) {
        let patch_size = MAX_BITS;
        let margin = self.config.margin;
        let mut x = 0usize;
        while x < patches.len() {
            if patches[x].length1 <= patch_size {
                x += 1;
                continue;
            }
            let mut bigpatch = patches.remove(x);
            let mut insert_at = x;
            let mut start1 = bigpatch.start1;
            let mut start2 = bigpatch.start2;
            let mut precontext: Units = Vec::new();

            while !bigpatch.diffs.is_empty() {
                let mut patch = UPatch {
                    start1: start1 - precontext.len(),
                    start2: start2 - precontext.len(),
                    ..UPatch::default()
                };
                let mut empty = true;
                if !precontext.is_empty() {
                    patch.length1 = precontext.len();
                    patch.length2 = precontext.len();
                    patch.diffs.push(Run::new(DiffOp::Equal, precontext.clone()));
                }

                while !bigpatch.diffs.is_empty() && patch.length1 < patch_size - margin {
                    let op = bigpatch.diffs[0].op;
                    match op {
                        DiffOp::Insert => {
                            let run = bigpatch.diffs.remove(0);
                            patch.length2 += run.len();
                            start2 += run.len();
                            patch.diffs.push(run);
                            empty = false;
                        }
                        DiffOp::Delete
                            if patch.diffs.len() == 1
                                && patch.diffs[0].op == DiffOp::Equal
                                && bigpatch.diffs[0].len() > 2 * patch_size =>
                        {
                            // An oversized deletion travels whole rather
                            // than being shredded across patches.
                            let run = bigpatch.diffs.remove(0);
                            patch.length1 += run.len();
                            start1 += run.len();
                            patch.diffs.push(run);
                            empty = false;
                        }
                        _ => {
                            let available = patch_size - patch.length1 - margin;
                            let mut take = bigpatch.diffs[0].len().min(available);
                            // Never cut between the halves of a pair; one
                            // unit over the window is harmless.
                            if take < bigpatch.diffs[0].len()
                                && is_high_surrogate(bigpatch.diffs[0].units[take - 1])
                            {
                                take += 1;
                            }
                            let taken: Units = bigpatch.diffs[0].units[..take].to_vec();
                            patch.length1 += take;
                            start1 += take;
                            if op == DiffOp::Equal {
                                patch.length2 += take;
                                start2 += take;
                            } else {
                                empty = false;
                            }
                            if take == bigpatch.diffs[0].len() {
                                bigpatch.diffs.remove(0);
                            } else {
                                bigpatch.diffs[0].units.drain(..take);
                            }
                            patch.diffs.push(Run::new(op, taken));
                        }
                    }
                }

                // Roll the trailing target context into the next piece.
                precontext = target_units(&patch.diffs);
                if precontext.len() > margin {
                    precontext = precontext[precontext.len() - margin..].to_vec();
                }
                if precontext.first().copied().is_some_and(is_low_surrogate) {
                    precontext.remove(0);
                }

                let source1 = source_units(&bigpatch.diffs);
                let mut postcontext: Units = if source1.len() > margin {
                    source1[..margin].to_vec()
                } else {
                    source1
                };
                if postcontext.last().copied().is_some_and(is_high_surrogate) {
                    postcontext.pop();
                }
                if !postcontext.is_empty() {
                    patch.length1 += postcontext.len();
                    patch.length2 += postcontext.len();
                    match patch.diffs.last_mut() {
                        Some(last) if last.op == DiffOp::Equal => {
                            last.units.extend_from_slice(&postcontext)
                        }
                        _ => patch.diffs.push(Run::new(DiffOp::Equal, postcontext)),
                    }
                }

                if !empty {
                    patches.insert(insert_at, patch);
                    insert_at += 1;
                }
            }
            x = insert_at;
        }
    }

    /// Adds sentinel padding on both sides of every patch so that edits at
    /// the text boundaries have context to anchor on. Returns the padding
    /// string (code units 1..=margin).
    pub fn patch_add_padding(&self, patches: &mut Vec<Patch>) -> String {
        let mut upatches: Vec<UPatch> = patches.iter().map(UPatch::from_patch).collect();
        let padding = self.add_padding_internal(&mut upatches);
        *patches = upatches.into_iter().map(UPatch::into_patch).collect();
        text_of(&padding)
    }

    fn add_padding_internal(&self, patches: &mut Vec<UPatch>) -> Units {
        let padding_length = self.config.margin;
        let null_padding: Units = (1..=padding_length as u16).collect();

        for patch in patches.iter_mut() {
            patch.start1 += padding_length;
            patch.start2 += padding_length;
        }

        if let Some(patch) = patches.first_mut() {
            let needs_full = patch.diffs.first().map_or(true, |r| r.op != DiffOp::Equal);
            if needs_full {
                patch.diffs.insert(0, Run::new(DiffOp::Equal, null_padding.clone()));
                patch.start1 -= padding_length;
                patch.start2 -= padding_length;
                patch.length1 += padding_length;
                patch.length2 += padding_length;
            } else if padding_length > patch.diffs[0].len() {
                // Grow the first equality backwards into the padding.
                let extra = padding_length - patch.diffs[0].len();
                let mut units = null_padding[patch.diffs[0].len()..].to_vec();
                units.extend_from_slice(&patch.diffs[0].units);
                patch.diffs[0].units = units;
                patch.start1 -= extra;
                patch.start2 -= extra;
                patch.length1 += extra;
                patch.length2 += extra;
            }
        }

        if let Some(patch) = patches.last_mut() {
            let needs_full = patch.diffs.last().map_or(true, |r| r.op != DiffOp::Equal);
            if needs_full {
                patch.diffs.push(Run::new(DiffOp::Equal, null_padding.clone()));
                patch.length1 += padding_length;
                patch.length2 += padding_length;
            } else if padding_length > patch.diffs.last().map_or(0, Run::len) {
                // Grow the last equality forward into the padding.
                let last_len = patch.diffs.last().map_or(0, Run::len);
                let extra = padding_length - last_len;
                if let Some(last) = patch.diffs.last_mut() {
                    last.units.extend_from_slice(&null_padding[..extra]);
                }
                patch.length1 += extra;
                patch.length2 += extra;
            }
        }

        null_padding
    }

    /// Applies patches to `text`, relocating each patch fuzzily when the
    /// source has drifted. Returns the patched text and a per-patch
    /// success flag.
    pub fn patch_apply(&self, patches: &[Patch], text: &str) -> (String, Vec<bool>) {
        self.apply_internal(patches, text, None)
    }

    /// Like [`TextDiff::patch_apply`], additionally rewriting a list of
    /// UTF-16 cursor offsets through every splice the text undergoes.
    pub fn patch_apply_with_offsets(
        &self,
        patches: &[Patch],
        text: &str,
        offsets: &mut [usize],
    ) -> (String, Vec<bool>) {
        self.apply_internal(patches, text, Some(offsets))
    }

    fn apply_internal(
        &self,
        patches: &[Patch],
        text: &str,
        mut offsets: Option<&mut [usize]>,
    ) -> (String, Vec<bool>) {
        if patches.is_empty() {
            return (text.to_string(), Vec::new());
        }
        let mut patches: Vec<UPatch> = patches.iter().map(UPatch::from_patch).collect();
        let null_padding = self.add_padding_internal(&mut patches);
        let mut text: Units = {
            let mut t = null_padding.clone();
            t.extend(units_of(text));
            t.extend_from_slice(&null_padding);
            t
        };
        if let Some(offsets) = offsets.as_deref_mut() {
            for offset in offsets.iter_mut() {
                *offset += null_padding.len();
            }
        }
        self.split_max_internal(&mut patches);

        let mut results = vec![false; patches.len()];
        let mut delta: isize = 0;
        for (x, patch) in patches.iter().enumerate() {
            let expected_loc = (patch.start2 as isize + delta).max(0) as usize;
            let text1 = source_units(&patch.diffs);
            let mut start_loc: Option<usize>;
            let mut end_loc: Option<usize> = None;
            if text1.len() > MAX_BITS {
                // Oversized deletion: anchor on head and tail separately.
                start_loc = self.match_units(&text, &text1[..MAX_BITS], expected_loc);
                if let Some(sl) = start_loc {
                    end_loc = self.match_units(
                        &text,
                        &text1[text1.len() - MAX_BITS..],
                        expected_loc + text1.len() - MAX_BITS,
                    );
                    match end_loc {
                        Some(el) if sl < el => {}
                        _ => start_loc = None,
                    }
                }
            } else {
                start_loc = self.match_units(&text, &text1, expected_loc);
            }

            let Some(start_loc) = start_loc else {
                // No match: skip this patch, discounting its shift from
                // the running delta.
                results[x] = false;
                delta -= patch.length2 as isize - patch.length1 as isize;
                continue;
            };
            results[x] = true;
            delta = start_loc as isize - expected_loc as isize;
            // Bitap can report a start past the end of the text; slicing
            // clamps the same way the reference implementation does.
            let slice_start = start_loc.min(text.len());
            let end = match end_loc {
                Some(el) => (el + MAX_BITS).min(text.len()),
                None => (start_loc + text1.len()).min(text.len()),
            }
            .max(slice_start);
            let text2: Units = text[slice_start..end].to_vec();

            if text1 == text2 {
                // Perfect match: walk the patch's edits in place so any
                // tracked cursor offsets ride each splice individually.
                let mut position = start_loc;
                for run in &patch.diffs {
                    match run.op {
                        DiffOp::Equal => position += run.len(),
                        DiffOp::Insert => {
                            splice(&mut text, position, 0, &run.units, offsets.as_deref_mut());
                            position += run.len();
                        }
                        DiffOp::Delete => {
                            splice(&mut text, position, run.len(), &[], offsets.as_deref_mut());
                        }
                    }
                }
            } else {
                // Imperfect match: re-diff against what is actually there
                // and map each edit through the sub-diff.
                let mut sub = crate::diff::diff_units(&text1, &text2, false, self.deadline());
                let unacceptable = text1.len() > MAX_BITS
                    && levenshtein_units(&sub) as f64 / text1.len() as f64
                        > self.config.delete_threshold;
                if unacceptable {
                    results[x] = false;
                    continue;
                }
                cleanup::cleanup_semantic_lossless_runs(&mut sub);
                let mut index1 = 0usize;
                for run in &patch.diffs {
                    if run.op != DiffOp::Equal {
                        let index2 = x_index_units(&sub, index1);
                        match run.op {
                            DiffOp::Insert => {
                                splice(
                                    &mut text,
                                    start_loc + index2,
                                    0,
                                    &run.units,
                                    offsets.as_deref_mut(),
                                );
                            }
                            DiffOp::Delete => {
                                let del_end = x_index_units(&sub, index1 + run.len());
                                splice(
                                    &mut text,
                                    start_loc + index2,
                                    del_end - index2,
                                    &[],
                                    offsets.as_deref_mut(),
                                );
                            }
                            DiffOp::Equal => {}
                        }
                    }
                    if run.op != DiffOp::Delete {
                        index1 += run.len();
                    }
                }
            }
        }

        // Strip the padding.
        text.drain(..null_padding.len().min(text.len()));
        text.truncate(text.len().saturating_sub(null_padding.len()));
        if let Some(offsets) = offsets {
            for offset in offsets.iter_mut() {
                *offset = offset.saturating_sub(null_padding.len()).min(text.len());
            }
        }
        (text_of(&text), results)
    }

    /// Unit-level variant of [`TextDiff::match_main`] used by the apply
    /// pipeline (patterns here never exceed the bitap width).
    fn match_units(&self, text: &[u16], pattern: &[u16], loc: usize) -> Option<usize> {
        let loc = loc.min(text.len());
        if text == pattern {
            return Some(0);
        }
        if text.is_empty() {
            return None;
        }
        if text.len() >= loc + pattern.len() && text[loc..loc + pattern.len()] == pattern[..] {
            return Some(loc);
        }
        self.match_bitap(text, pattern, loc)
    }
}

/// Splices `insert` over `del_len` units at `at`, shifting any tracked
/// cursor offsets the same way the text moved.
fn splice(
    text: &mut Units,
    at: usize,
    del_len: usize,
    insert: &[u16],
    offsets: Option<&mut [usize]>,
) {
    let at = at.min(text.len());
    let del_len = del_len.min(text.len().saturating_sub(at));
    text.splice(at..at + del_len, insert.iter().copied());
    if let Some(offsets) = offsets {
        for offset in offsets.iter_mut() {
            if *offset > at {
                // Offsets inside the deleted span collapse to its start.
                *offset = at.max(offset.saturating_sub(del_len));
            }
            if *offset >= at && !insert.is_empty() {
                *offset += insert.len();
            }
        }
    }
}

/// Serializes patches in the GNU diff-style text format:
/// `@@ -start1,len1 +start2,len2 @@` headers (1-based; zero-length spans
/// emit `start,0`) followed by percent-encoded body lines.
pub fn patch_to_text(patches: &[Patch]) -> String {
    let mut out = String::new();
    for patch in patches {
        out.push_str(&patch_header(patch));
        for diff in &patch.diffs {
            match diff.op {
                DiffOp::Insert => out.push('+'),
                DiffOp::Delete => out.push('-'),
                DiffOp::Equal => out.push(' '),
            }
            out.push_str(&encode_uri(&diff.text));
            out.push('\n');
        }
    }
    out
}

fn patch_header(patch: &Patch) -> String {
    let coords1 = match patch.length1 {
        0 => format!("{},0", patch.start1),
        1 => format!("{}", patch.start1 + 1),
        len => format!("{},{}", patch.start1 + 1, len),
    };
    let coords2 = match patch.length2 {
        0 => format!("{},0", patch.start2),
        1 => format!("{}", patch.start2 + 1),
        len => format!("{},{}", patch.start2 + 1, len),
    };
    format!("@@ -{coords1} +{coords2} @@\n")
}

/// Parses the text format produced by [`patch_to_text`].
pub fn patch_from_text(text: &str) -> TextDiffResult<Vec<Patch>> {
    let mut patches = Vec::new();
    if text.is_empty() {
        return Ok(patches);
    }
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }
        let (start1, length1, start2, length2) = parse_header(line)?;
        let mut patch = Patch {
            start1,
            start2,
            length1,
            length2,
            diffs: Vec::new(),
        };
        while let Some(&body) = lines.peek() {
            if body.starts_with("@@") {
                break;
            }
            lines.next();
            if body.is_empty() {
                continue;
            }
            let sign = body.chars().next().unwrap_or('?');
            let decoded = decode_uri(&body[sign.len_utf8()..])?;
            match sign {
                '+' => patch.diffs.push(Diff::insert(decoded)),
                '-' => patch.diffs.push(Diff::delete(decoded)),
                ' ' => patch.diffs.push(Diff::equal(decoded)),
                _ => {
                    return Err(TextDiffError::invalid_patch(format!(
                        "unknown line sign {sign:?}"
                    )))
                }
            }
        }
        patches.push(patch);
    }
    Ok(patches)
}

fn parse_header(line: &str) -> TextDiffResult<(usize, usize, usize, usize)> {
    let inner = line
        .strip_prefix("@@ -")
        .and_then(|l| l.strip_suffix(" @@"))
        .ok_or_else(|| TextDiffError::invalid_patch(format!("bad header {line:?}")))?;
    let (coords1, coords2) = inner
        .split_once(" +")
        .ok_or_else(|| TextDiffError::invalid_patch(format!("bad header {line:?}")))?;
    let (start1, length1) = parse_coords(coords1, line)?;
    let (start2, length2) = parse_coords(coords2, line)?;
    Ok((start1, length1, start2, length2))
}

fn parse_coords(coords: &str, line: &str) -> TextDiffResult<(usize, usize)> {
    let bad = || TextDiffError::invalid_patch(format!("bad header {line:?}"));
    match coords.split_once(',') {
        None => {
            // A bare number means a length of one, 1-based.
            let start: usize = coords.parse().map_err(|_| bad())?;
            Ok((start.checked_sub(1).ok_or_else(bad)?, 1))
        }
        Some((start, len)) => {
            let start: usize = start.parse().map_err(|_| bad())?;
            let len: usize = len.parse().map_err(|_| bad())?;
            if len == 0 {
                Ok((start, 0))
            } else {
                Ok((start.checked_sub(1).ok_or_else(bad)?, len))
            }
        }
    }
}
