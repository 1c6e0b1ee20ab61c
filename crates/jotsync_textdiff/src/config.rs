//! Tunable constants for the diff, match and patch engines.

use std::time::Duration;

/// Maximum bitap pattern width in UTF-16 code units.
///
/// This is fixed at 32 for wire compatibility: patch splitting, padding and
/// context growth are all sized against this width, and peers on the same
/// bucket must agree on it.
pub const MAX_BITS: usize = 32;

/// Configuration for the text diff engine.
///
/// The defaults match the deployed protocol; changing `margin` or the match
/// thresholds on one peer only affects local fuzzy-apply behavior, not the
/// wire format.
#[derive(Debug, Clone)]
pub struct TextDiffConfig {
    /// Time budget for computing a diff. `None` removes the limit and
    /// disables the half-match speedup.
    pub timeout: Option<Duration>,
    /// Cost of an empty edit operation in terms of edit characters, used by
    /// the efficiency cleanup.
    pub edit_cost: usize,
    /// At what point is no match declared (0.0 = perfection, 1.0 = very
    /// loose).
    pub match_threshold: f64,
    /// How far to search for a match (0 = exact location, 1000+ = broad
    /// match), in code units.
    pub match_distance: usize,
    /// When deleting a large block of text (over ~64 units), how close do
    /// the contents have to be to match the expected contents.
    pub delete_threshold: f64,
    /// Chunk size for context length in patches.
    pub margin: usize,
}

impl TextDiffConfig {
    /// Creates a configuration with the protocol defaults.
    pub fn new() -> Self {
        Self {
            timeout: Some(Duration::from_secs(1)),
            edit_cost: 4,
            match_threshold: 0.5,
            match_distance: 1000,
            delete_threshold: 0.5,
            margin: 4,
        }
    }

    /// Sets the diff time budget.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the efficiency cleanup edit cost.
    pub fn with_edit_cost(mut self, edit_cost: usize) -> Self {
        self.edit_cost = edit_cost;
        self
    }

    /// Sets the match threshold.
    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Sets the match distance.
    pub fn with_match_distance(mut self, distance: usize) -> Self {
        self.match_distance = distance;
        self
    }

    /// Sets the patch delete threshold.
    pub fn with_delete_threshold(mut self, threshold: f64) -> Self {
        self.delete_threshold = threshold;
        self
    }

    /// Sets the patch context margin.
    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }
}

impl Default for TextDiffConfig {
    fn default() -> Self {
        Self::new()
    }
}
