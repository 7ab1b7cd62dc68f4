//! Summary of a batch run over the registry.

use std::fmt;

/// Counts of per-entry outcomes of a batch run.
///
/// The meaning of "succeeded" depends on the operation: refined (modified)
/// entries for refinement, consistent entries for consistency checks and
/// entries without violations for audits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Entries processed.
    pub processed: usize,
    /// Entries that succeeded.
    pub succeeded: usize,
    /// Entries skipped.
    pub skipped: usize,
    /// Entries that failed.
    pub failed: usize,
    label: &'static str,
}

impl BatchSummary {
    /// Empty summary, successes are reported under `label`.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    /// Records a success.
    pub fn success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// Records a skipped entry.
    pub fn skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    /// Records a failure.
    pub fn failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    /// Returns `true` if no entry failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.label.is_empty() {
            "succeeded"
        } else {
            self.label
        };

        write!(
            f,
            "processed {}, {} {}, skipped {}, failed {}",
            self.processed, label, self.succeeded, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_display() {
        let mut summary = BatchSummary::new("modified");
        summary.success();
        summary.skip();
        summary.failure();
        summary.success();

        assert_eq!(summary.processed, 4);
        assert!(!summary.is_clean());
        assert_eq!(
            summary.to_string(),
            "processed 4, modified 2, skipped 1, failed 1"
        );
    }
}
