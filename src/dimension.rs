//! Resolution of the working dimension of an entry.
//!
//! Fixed entries have exactly one dimension. Scalable entries use the
//! requested dimension, their default, or, for legacy entries without a
//! default, the first candidate dimension at which the recorded minimizer can
//! be materialized.

use log::debug;
use thiserror::Error;

use crate::core::{DimensionKind, FunctionEntry};

/// Candidate dimensions probed for legacy entries.
pub const DEFAULT_CANDIDATES: [usize; 2] = [2, 4];

/// Error when resolving the dimension of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    /// Requested dimension differs from the fixed dimension of the entry.
    #[error("entry `{name}` has fixed dimension {fixed}, requested {requested}")]
    DimensionMismatch {
        /// Entry name.
        name: String,
        /// The fixed dimension.
        fixed: usize,
        /// The requested dimension.
        requested: usize,
    },
    /// No candidate dimension works for a legacy scalable entry.
    #[error("no valid dimension found for entry `{name}` among candidates {candidates:?}")]
    NoValidDimension {
        /// Entry name.
        name: String,
        /// Probed candidates.
        candidates: Vec<usize>,
    },
    /// Zero dimension was requested.
    #[error("requested dimension must be positive")]
    Zero,
}

/// Dimension resolver.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionResolver {
    candidates: Vec<usize>,
}

impl Default for DimensionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATES.to_vec())
    }
}

impl DimensionResolver {
    /// Creates a resolver with custom probing candidates, tried in order.
    pub fn new(candidates: Vec<usize>) -> Self {
        Self { candidates }
    }

    /// Probing candidates.
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Resolves the dimension for the entry.
    pub fn resolve(
        &self,
        entry: &FunctionEntry,
        requested: Option<usize>,
    ) -> Result<usize, DimensionError> {
        if requested == Some(0) {
            return Err(DimensionError::Zero);
        }

        match (entry.dimension(), requested) {
            (DimensionKind::Fixed { n }, None) => Ok(n),
            (DimensionKind::Fixed { n }, Some(requested)) if requested == n => Ok(n),
            (DimensionKind::Fixed { n }, Some(requested)) => {
                Err(DimensionError::DimensionMismatch {
                    name: entry.name().to_string(),
                    fixed: n,
                    requested,
                })
            }
            (DimensionKind::Scalable { .. }, Some(requested)) => Ok(requested),
            (DimensionKind::Scalable { default_n: Some(n) }, None) => Ok(n),
            (DimensionKind::Scalable { default_n: None }, None) => {
                self.probe(entry).ok_or_else(|| DimensionError::NoValidDimension {
                    name: entry.name().to_string(),
                    candidates: self.candidates.clone(),
                })
            }
        }
    }

    /// Finds the first candidate dimension at which the minimizer of the entry
    /// can be materialized.
    pub fn probe(&self, entry: &FunctionEntry) -> Option<usize> {
        self.candidates.iter().copied().find(|&n| {
            let ok = n > 0 && entry.min_position(n).is_ok();
            debug!("probing `{}` at n = {}: {}", entry.name(), n, ok);
            ok
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Layout;
    use crate::testing::*;

    #[test]
    fn fixed_dimension() {
        let entry = build(fixed_paraboloid_record("flat", 2));
        let resolver = DimensionResolver::default();

        assert_eq!(resolver.resolve(&entry, None), Ok(2));
        assert_eq!(resolver.resolve(&entry, Some(2)), Ok(2));
        assert!(matches!(
            resolver.resolve(&entry, Some(3)),
            Err(DimensionError::DimensionMismatch {
                fixed: 2,
                requested: 3,
                ..
            })
        ));
    }

    #[test]
    fn scalable_dimension() {
        let entry = build(paraboloid_record("bowl"));
        let resolver = DimensionResolver::default();

        assert_eq!(resolver.resolve(&entry, None), Ok(2));
        assert_eq!(resolver.resolve(&entry, Some(10)), Ok(10));
        assert_eq!(resolver.resolve(&entry, Some(0)), Err(DimensionError::Zero));
    }

    #[test]
    fn legacy_entry_is_probed() {
        let entry = build(legacy_record("legacy"));
        let resolver = DimensionResolver::default();

        assert_eq!(resolver.probe(&entry), Some(4));
        assert_eq!(resolver.resolve(&entry, None), Ok(4));
    }

    #[test]
    fn legacy_entry_without_valid_candidate() {
        let record = legacy_record("legacy")
            .with_minimum(vec![Layout::Explicit(vec![0.0; 3])], 0.0);
        let entry = build(record);
        let resolver = DimensionResolver::default();

        assert!(matches!(
            resolver.resolve(&entry, None),
            Err(DimensionError::NoValidDimension { .. })
        ));
        assert_eq!(DimensionResolver::new(vec![3]).resolve(&entry, None), Ok(3));
    }
}
