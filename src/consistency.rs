//! Cross-check of the recorded minimum against the formula.
//!
//! For every recorded minimizer, the formula is evaluated and compared with
//! the recorded minimum value, and the analytic gradient is checked to vanish.
//! Findings are collected into a report; the checker never modifies entries.
//! Entries tagged `controversial` are flagged so that a disagreement can be
//! attributed to the literature rather than to the catalog.

use getset::{CopyGetters, Setters};
use log::{info, warn};
use nalgebra::DVector;
use thiserror::Error;

use crate::batch::BatchSummary;
use crate::core::{FunctionEntry, GradientError, MinimumError, MinimumSource, Property};
use crate::derivatives::norm;
use crate::dimension::{DimensionError, DimensionResolver};
use crate::registry::Registry;

/// Options for [`ConsistencyChecker`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct ConsistencyOptions {
    /// Value tolerance for literature minima. Default: `1e-9`.
    literature_tol: f64,
    /// Value tolerance for refined minima. Default: `1e-12`.
    refined_tol: f64,
    /// Gradient norm tolerance at minimizers. Default: `1e-6`.
    gradient_tol: f64,
}

impl Default for ConsistencyOptions {
    fn default() -> Self {
        Self {
            literature_tol: 1e-9,
            refined_tol: 1e-12,
            gradient_tol: 1e-6,
        }
    }
}

/// Gradient finding at a minimizer.
#[derive(Debug, Clone, PartialEq)]
pub enum GradientStatus {
    /// Euclidean norm of the analytic gradient.
    Checked(f64),
    /// The minimizer lies on a kink.
    NonDifferentiable(&'static str),
    /// Gradient could not be checked.
    NotApplicable,
}

/// Findings at one recorded minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerCheck {
    /// The minimizer.
    pub position: DVector<f64>,
    /// Formula value at the minimizer.
    pub value: f64,
    /// Absolute difference from the recorded minimum value.
    pub residual: f64,
    /// Gradient finding.
    pub gradient: GradientStatus,
}

/// Disagreement between the recorded minimum and the formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Discrepancy {
    /// The value at a minimizer differs from the recorded value.
    ValueMismatch {
        /// Index of the minimizer.
        index: usize,
        /// Absolute difference.
        residual: f64,
        /// Tolerance that was exceeded.
        tolerance: f64,
    },
    /// The gradient does not vanish at a minimizer.
    GradientNotVanishing {
        /// Index of the minimizer.
        index: usize,
        /// Gradient norm.
        norm: f64,
        /// Tolerance that was exceeded.
        tolerance: f64,
    },
    /// The formula is undefined or infinite at a minimizer.
    NonFinite {
        /// Index of the minimizer.
        index: usize,
    },
}

/// Result of a consistency check.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyReport {
    /// Entry name.
    pub name: String,
    /// Dimension the check was done in.
    pub n: usize,
    /// Recorded minimum value.
    pub recorded: f64,
    /// Whether the recorded minimum is from the literature or refined.
    pub source: MinimumSource,
    /// Per-minimizer findings.
    pub minimizers: Vec<MinimizerCheck>,
    /// All disagreements found.
    pub discrepancies: Vec<Discrepancy>,
    /// Whether the entry is tagged as controversial.
    pub controversial: bool,
}

impl ConsistencyReport {
    /// Returns `true` if no discrepancy was found.
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Largest value residual over all minimizers.
    pub fn max_residual(&self) -> f64 {
        self.minimizers
            .iter()
            .map(|m| m.residual)
            .fold(0.0, f64::max)
    }
}

/// Error when a check cannot be performed at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    /// Dimension could not be resolved.
    #[error("{0}")]
    Dimension(#[from] DimensionError),
    /// No minimum recorded for the dimension.
    #[error("{0}")]
    Minimum(#[from] MinimumError),
}

/// Consistency checker.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyChecker {
    options: ConsistencyOptions,
}

impl ConsistencyChecker {
    /// Initializes the checker with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the checker with given options.
    pub fn with_options(options: ConsistencyOptions) -> Self {
        Self { options }
    }

    /// Checks the recorded minimum of the entry at dimension `n`.
    pub fn check(
        &self,
        entry: &FunctionEntry,
        n: usize,
    ) -> Result<ConsistencyReport, ConsistencyError> {
        let minimum = entry.minimum(n)?;
        let tolerance = match minimum.source {
            MinimumSource::Literature => self.options.literature_tol,
            MinimumSource::Refined => self.options.refined_tol,
        };

        // Kinks and constraint boundaries may leave a non-zero gradient.
        let smooth = entry.has(Property::Differentiable) && !entry.has(Property::Constrained);

        let mut minimizers = Vec::with_capacity(minimum.positions.len());
        let mut discrepancies = Vec::new();

        for (index, position) in minimum.positions.into_iter().enumerate() {
            let value = entry.evaluate(&position).unwrap_or(f64::NAN);
            let residual = (value - minimum.value).abs();

            if !value.is_finite() {
                discrepancies.push(Discrepancy::NonFinite { index });
            } else if !(residual <= tolerance) {
                discrepancies.push(Discrepancy::ValueMismatch {
                    index,
                    residual,
                    tolerance,
                });
            }

            let gradient = match entry.gradient::<f64>(&position) {
                Ok(grad) => {
                    let grad_norm = norm(&grad);
                    if smooth && !(grad_norm <= self.options.gradient_tol) {
                        discrepancies.push(Discrepancy::GradientNotVanishing {
                            index,
                            norm: grad_norm,
                            tolerance: self.options.gradient_tol,
                        });
                    }
                    GradientStatus::Checked(grad_norm)
                }
                Err(GradientError::NonDifferentiable { reason }) => {
                    GradientStatus::NonDifferentiable(reason)
                }
                Err(GradientError::InvalidDimensionality { .. }) => GradientStatus::NotApplicable,
            };

            minimizers.push(MinimizerCheck {
                position,
                value,
                residual,
                gradient,
            });
        }

        let report = ConsistencyReport {
            name: entry.name().to_string(),
            n,
            recorded: minimum.value,
            source: minimum.source,
            minimizers,
            discrepancies,
            controversial: entry.has(Property::Controversial),
        };

        for discrepancy in &report.discrepancies {
            if report.controversial {
                warn!(
                    "{} (n = {}, controversial): {:?}",
                    report.name, n, discrepancy
                );
            } else {
                warn!("{} (n = {}): {:?}", report.name, n, discrepancy);
            }
        }

        Ok(report)
    }

    /// Checks the entry at the dimension chosen by the resolver.
    pub fn check_resolved(
        &self,
        entry: &FunctionEntry,
        resolver: &DimensionResolver,
        requested: Option<usize>,
    ) -> Result<ConsistencyReport, ConsistencyError> {
        let n = resolver.resolve(entry, requested)?;
        self.check(entry, n)
    }

    /// Checks all entries of the registry at their working dimension.
    ///
    /// Noisy entries are skipped because their value at the minimizer is not
    /// deterministic.
    pub fn check_all(
        &self,
        registry: &Registry,
    ) -> (
        Vec<(String, Result<ConsistencyReport, ConsistencyError>)>,
        BatchSummary,
    ) {
        let mut summary = BatchSummary::new("consistent");
        let mut results = Vec::new();

        for entry in registry.iter() {
            if entry.has(Property::HasNoise) {
                info!("{}: skipped (noisy)", entry.name());
                summary.skip();
                continue;
            }

            let result = self.check_resolved(&entry, registry.resolver(), None);
            match &result {
                Ok(report) if report.is_consistent() => summary.success(),
                Ok(_) => summary.failure(),
                Err(error) => {
                    warn!("{}: {}", entry.name(), error);
                    summary.failure();
                }
            }
            results.push((entry.name().to_string(), result));
        }

        info!("consistency check: {}", summary);
        (results, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Layout, RefinedMinimum};
    use crate::testing::*;

    #[test]
    fn consistent_entry() {
        let entry = build(paraboloid_record("bowl"));
        let report = ConsistencyChecker::new().check(&entry, 3).unwrap();

        assert!(report.is_consistent());
        assert_eq!(report.minimizers.len(), 1);
        assert_eq!(report.minimizers[0].gradient, GradientStatus::Checked(0.0));
        assert!(!report.controversial);
    }

    #[test]
    fn wrong_value_and_position_are_reported() {
        let record = paraboloid_record("bowl")
            .with_minimum(vec![Layout::Repeat(vec![0.0]), Layout::Repeat(vec![0.5])], 0.0)
            .with_properties(["scalable", "differentiable", "controversial"]);
        let entry = build(record);
        let report = ConsistencyChecker::new().check(&entry, 2).unwrap();

        assert!(!report.is_consistent());
        assert!(report.controversial);
        assert!(report
            .discrepancies
            .contains(&Discrepancy::ValueMismatch {
                index: 1,
                residual: 0.5,
                tolerance: 1e-9
            }));
        assert!(report
            .discrepancies
            .iter()
            .any(|d| matches!(d, Discrepancy::GradientNotVanishing { index: 1, .. })));
    }

    #[test]
    fn gradient_is_not_required_to_vanish_without_differentiable_tag() {
        let record = paraboloid_record("bowl")
            .with_minimum(vec![Layout::Repeat(vec![0.5])], 0.5)
            .with_properties(["scalable"]);
        let report = ConsistencyChecker::new().check(&build(record), 2).unwrap();

        assert!(report.is_consistent());
        assert!(matches!(
            report.minimizers[0].gradient,
            GradientStatus::Checked(norm) if norm > 1.0
        ));
    }

    #[test]
    fn refined_minimum_uses_tight_tolerance() {
        let entry = build(paraboloid_record("bowl")).with_refined(RefinedMinimum {
            n: 2,
            positions: vec![vec![0.0, 0.0]],
            value: 1e-10,
            extended: None,
        });

        let report = ConsistencyChecker::new().check(&entry, 2).unwrap();
        assert_eq!(report.source, MinimumSource::Refined);
        // 1e-10 residual passes the literature tolerance but not the refined one.
        assert!(matches!(
            report.discrepancies.as_slice(),
            [Discrepancy::ValueMismatch { index: 0, .. }]
        ));
    }

    #[test]
    fn value_tolerance_is_absolute() {
        let record = paraboloid_record("bowl")
            .with_minimum(vec![Layout::Repeat(vec![10.0, 0.0])], 100.000_000_05)
            .with_properties(["scalable"]);
        let report = ConsistencyChecker::new().check(&build(record), 2).unwrap();

        assert!(!report.is_consistent());
        assert!(matches!(
            report.discrepancies.as_slice(),
            [Discrepancy::ValueMismatch { index: 0, residual, tolerance }]
                if *residual > 4e-8 && *tolerance == 1e-9
        ));
    }

    #[test]
    fn missing_minimum_is_an_error() {
        let entry = build(legacy_record("legacy"));
        assert!(matches!(
            ConsistencyChecker::new().check(&entry, 3),
            Err(ConsistencyError::Minimum(_))
        ));
    }

    #[test]
    fn noisy_entries_are_skipped_in_batch() {
        let (registry, errors) = Registry::load(vec![paraboloid_def("bowl"), noisy_def("noisy")]);
        assert!(errors.is_empty());

        let (results, summary) = ConsistencyChecker::new().check_all(&registry);
        assert_eq!(results.len(), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 1);
    }
}
