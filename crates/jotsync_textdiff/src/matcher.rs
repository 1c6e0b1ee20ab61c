//! Bitap fuzzy match.

use std::collections::HashMap;

use crate::config::MAX_BITS;
use crate::error::{TextDiffError, TextDiffResult};
use crate::units::{find_sub_from, rfind_sub_until, units_of};
use crate::TextDiff;

impl TextDiff {
    /// Locates the best instance of `pattern` in `text` near `loc`.
    ///
    /// Positions are UTF-16 code-unit offsets. Returns `None` when no match
    /// scores under the configured threshold.
    ///
    /// # Errors
    ///
    /// Returns [`TextDiffError::PatternTooLong`] when the pattern exceeds
    /// the 32-unit bitap width; callers must split longer patterns.
    pub fn match_main(&self, text: &str, pattern: &str, loc: usize) -> TextDiffResult<Option<usize>> {
        let text = units_of(text);
        let pattern = units_of(pattern);
        if pattern.len() > MAX_BITS {
            return Err(TextDiffError::PatternTooLong {
                len: pattern.len(),
                max: MAX_BITS,
            });
        }
        let loc = loc.min(text.len());
        if text == pattern {
            // Shortcut (potentially not guaranteed by the algorithm).
            return Ok(Some(0));
        }
        if text.is_empty() {
            return Ok(None);
        }
        if text.len() >= loc + pattern.len() && text[loc..loc + pattern.len()] == pattern[..] {
            // Perfect match at the perfect spot.
            return Ok(Some(loc));
        }
        Ok(self.match_bitap(&text, &pattern, loc))
    }

    /// Bitap search over code units: one pass per allowed error count,
    /// tracking reachable states in a bit-parallel array.
    pub(crate) fn match_bitap(&self, text: &[u16], pattern: &[u16], loc: usize) -> Option<usize> {
        debug_assert!(pattern.len() <= MAX_BITS);
        let alphabet = match_alphabet(pattern);

        let score = |errors: usize, x: usize| -> f64 {
            let accuracy = errors as f64 / pattern.len() as f64;
            let proximity = loc.abs_diff(x) as f64;
            if self.config.match_distance == 0 {
                if proximity > 0.0 {
                    return 1.0;
                }
                return accuracy;
            }
            accuracy + proximity / self.config.match_distance as f64
        };

        let mut score_threshold = self.config.match_threshold;
        // Exact matches on either side of `loc` tighten the threshold
        // before the expensive scan.
        if let Some(best) = find_sub_from(text, pattern, loc) {
            score_threshold = score(0, best).min(score_threshold);
            if let Some(best) = rfind_sub_until(text, pattern, loc + pattern.len()) {
                score_threshold = score(0, best).min(score_threshold);
            }
        }

        let match_mask: u64 = 1 << (pattern.len() - 1);
        let mut best_loc: Option<usize> = None;
        let mut bin_max = pattern.len() + text.len();
        let mut last_rd: Vec<u64> = Vec::new();

        for d in 0..pattern.len() {
            // Binary search for the widest window still able to beat the
            // current threshold at this error level.
            let mut bin_min = 0usize;
            let mut bin_mid = bin_max;
            while bin_min < bin_mid {
                if score(d, loc + bin_mid) <= score_threshold {
                    bin_min = bin_mid;
                } else {
                    bin_max = bin_mid;
                }
                bin_mid = (bin_max - bin_min) / 2 + bin_min;
            }
            bin_max = bin_mid;

            let mut start = (loc.saturating_sub(bin_mid) + 1).max(1);
            let finish = (loc + bin_mid).min(text.len()) + pattern.len();

            let mut rd = vec![0u64; finish + 2];
            rd[finish + 1] = (1 << d) - 1;
            let mut j = finish;
            while j >= start {
                let char_match = if text.len() < j {
                    0
                } else {
                    alphabet.get(&text[j - 1]).copied().unwrap_or(0)
                };
                let last_at = |i: usize| last_rd.get(i).copied().unwrap_or(0);
                rd[j] = if d == 0 {
                    // First pass: exact matches only.
                    ((rd[j + 1] << 1) | 1) & char_match
                } else {
                    // Subsequent passes: fuzzy matches permit
                    // substitutions, insertions and deletions.
                    (((rd[j + 1] << 1) | 1) & char_match)
                        | (((last_at(j + 1) | last_at(j)) << 1) | 1)
                        | last_at(j + 1)
                };
                if rd[j] & match_mask != 0 {
                    let candidate_score = score(d, j - 1);
                    // The match threshold only decreases, so ties resolve
                    // toward the earlier candidate.
                    if candidate_score <= score_threshold {
                        score_threshold = candidate_score;
                        best_loc = Some(j - 1);
                        if j - 1 > loc {
                            // Passed `loc`: keep scanning toward it.
                            start = (2 * loc).saturating_sub(j - 1).max(1);
                        } else {
                            // Already behind `loc`: no better score ahead.
                            break;
                        }
                    }
                }
                j -= 1;
            }
            // No hope of a better match at higher error counts.
            if score(d + 1, loc) > score_threshold {
                break;
            }
            last_rd = rd;
        }
        best_loc
    }
}

/// Per-unit bitmask: bit `len - i - 1` set for each position `i` the unit
/// occupies in the pattern.
fn match_alphabet(pattern: &[u16]) -> HashMap<u16, u64> {
    let mut alphabet: HashMap<u16, u64> = HashMap::new();
    for (i, &unit) in pattern.iter().enumerate() {
        *alphabet.entry(unit).or_insert(0) |= 1 << (pattern.len() - i - 1);
    }
    alphabet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextDiffConfig;

    fn engine() -> TextDiff {
        TextDiff::default()
    }

    #[test]
    fn alphabet_masks() {
        let alphabet = match_alphabet(&units_of("abc"));
        assert_eq!(alphabet[&(b'a' as u16)], 0b100);
        assert_eq!(alphabet[&(b'b' as u16)], 0b010);
        assert_eq!(alphabet[&(b'c' as u16)], 0b001);

        let alphabet = match_alphabet(&units_of("abcaba"));
        assert_eq!(alphabet[&(b'a' as u16)], 0b100101);
        assert_eq!(alphabet[&(b'b' as u16)], 0b010010);
        assert_eq!(alphabet[&(b'c' as u16)], 0b001000);
    }

    #[test]
    fn exact_matches() {
        let m = engine();
        assert_eq!(m.match_main("abcdef", "abcdef", 1000).unwrap(), Some(0));
        assert_eq!(m.match_main("", "abcdef", 1).unwrap(), None);
        assert_eq!(m.match_main("abcdef", "", 3).unwrap(), Some(3));
        assert_eq!(m.match_main("abcdef", "de", 3).unwrap(), Some(3));
        assert_eq!(m.match_main("abcdefghijk", "fgh", 5).unwrap(), Some(5));
        assert_eq!(m.match_main("abcdefghijk", "fgh", 0).unwrap(), Some(5));
    }

    #[test]
    fn fuzzy_matches() {
        let m = engine();
        assert_eq!(m.match_main("abcdefghijk", "efxhi", 0).unwrap(), Some(4));
        assert_eq!(m.match_main("abcdefghijk", "cdefxyhijk", 5).unwrap(), Some(2));
        assert_eq!(m.match_main("abcdefghijk", "bxy", 1).unwrap(), None);
        // Overflow robustness on a dense pattern.
        assert_eq!(m.match_main("123456789xx0", "3456789x0", 2).unwrap(), Some(2));
    }

    #[test]
    fn threshold_sensitivity() {
        let strict = TextDiff::with_config(TextDiffConfig::new().with_match_threshold(0.1));
        assert_eq!(
            strict.match_main("abcdefghijk", "efxyhi", 1).unwrap(),
            None
        );

        let loose = TextDiff::with_config(TextDiffConfig::new().with_match_threshold(0.7));
        assert_eq!(
            loose.match_main("abcdefghijk", "efxyhi", 1).unwrap(),
            Some(4)
        );
    }

    #[test]
    fn distance_sensitivity() {
        let near = TextDiff::with_config(TextDiffConfig::new().with_match_distance(10));
        assert_eq!(
            near.match_main("abcdefghijklmnopqrstuvwxyz", "abcdefg", 24)
                .unwrap(),
            None
        );
        assert_eq!(
            near.match_main("abcdefghijklmnopqrstuvwxyz", "abcdxxefg", 1)
                .unwrap(),
            Some(0)
        );
        let far = TextDiff::with_config(TextDiffConfig::new().with_match_distance(1000));
        assert_eq!(
            far.match_main("abcdefghijklmnopqrstuvwxyz", "abcdefg", 24)
                .unwrap(),
            Some(0)
        );
    }

    #[test]
    fn pattern_length_limit() {
        let m = engine();
        let long_pattern = "x".repeat(MAX_BITS + 1);
        let err = m.match_main("text", &long_pattern, 0).unwrap_err();
        assert!(matches!(err, TextDiffError::PatternTooLong { len: 33, max: 32 }));

        let max_pattern = "x".repeat(MAX_BITS);
        let text = format!("yy{max_pattern}");
        assert_eq!(m.match_main(&text, &max_pattern, 2).unwrap(), Some(2));
    }
}
