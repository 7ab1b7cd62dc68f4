//! Refinement of recorded minima in extended precision.
//!
//! Every entry goes through the same sequence of steps, each of which may end
//! the processing of the entry:
//!
//! 1. *Filter.* Noisy and constrained entries are skipped, because refinement
//!    assumes a deterministic landscape on a box.
//! 2. *Resolve dimension.* The working dimension is chosen by the
//!    [`DimensionResolver`](crate::dimension::DimensionResolver) of the
//!    registry.
//! 3. *Optimize.* [`Bfgs`] is run in [`DoubleDouble`] precision from the
//!    standard starting point, within the bounds when there are some. Other
//!    recorded minimizers are polished by runs started at their own positions
//!    so that a set of symmetric minima stays a set.
//! 4. *Validate.* The formula is evaluated in double precision at the rounded
//!    refined positions. A residual above the validation tolerance is logged
//!    as a warning, but does not stop the refinement.
//! 5. *Replace.* The refined minimum is optionally persisted to a
//!    [`CatalogStore`], the registry entry is atomically replaced and a line
//!    is appended to the change log.
//!
//! Failures are isolated per entry (panics included). Only a failure to write
//! the change log aborts a batch.
//!
//! # References
//!
//! \[1\] [Library for Double-Double and Quad-Double
//! Arithmetic](https://www.davidhbailey.com/dhbpapers/qd.pdf)

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use getset::{CopyGetters, Setters};
use log::{error, info, warn};
use nalgebra::DVector;
use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;

use crate::algo::bfgs::{Bfgs, BfgsError, BfgsOptions};
use crate::batch::BatchSummary;
use crate::core::{
    lift, lower, DoubleDouble, FunctionEntry, LayoutError, Property, Real, RefinedMinimum,
};
use crate::derivatives::relative_difference;
use crate::dimension::{DimensionError, DimensionResolver};
use crate::registry::{Registry, RegistryError};
use crate::store::{CatalogStore, StoreError};

/// Options for [`PrecisionRefiner`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct RefineOptions {
    /// Projected gradient tolerance. Default: `1e-15`.
    gtol: f64,
    /// Relative function change tolerance. Default: `1e-28`.
    ftol: f64,
    /// Relative step size tolerance. Default: `1e-24`.
    xtol: f64,
    /// Projected gradient below which a stalled line search counts as
    /// converged. Default: `1e-10`.
    stall_gtol: f64,
    /// Iteration budget of one optimization run. Default: `2000`.
    max_iters: usize,
    /// Tolerance of the double precision validation. Default: `1e-12`.
    validation_tol: f64,
    /// How much worse than the recorded value the refined value may be before
    /// it is rejected. Default: `1e-9`.
    worse_tol: f64,
    /// Significant digits of the extended value in the change log and the
    /// stored record. Default: `32`.
    digits: usize,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            gtol: 1e-15,
            ftol: 1e-28,
            xtol: 1e-24,
            stall_gtol: 1e-10,
            max_iters: 2000,
            validation_tol: 1e-12,
            worse_tol: 1e-9,
            digits: 32,
        }
    }
}

impl RefineOptions {
    fn bfgs(&self) -> BfgsOptions {
        let mut options = BfgsOptions::default();
        options
            .set_gtol(self.gtol)
            .set_ftol(self.ftol)
            .set_xtol(self.xtol)
            .set_stall_gtol(self.stall_gtol)
            .set_max_iters(self.max_iters);
        options
    }
}

/// Why an entry was not refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The entry is tagged `has_noise`.
    Noisy,
    /// The entry is tagged `constrained`.
    Constrained,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Noisy => f.write_str("noisy function"),
            SkipReason::Constrained => f.write_str("constrained function"),
        }
    }
}

/// Cause of a failed refinement.
#[derive(Debug, Error)]
pub enum RefineError {
    /// Dimension could not be resolved.
    #[error("{0}")]
    Dimension(#[from] DimensionError),
    /// Start or bounds are not available in the working dimension.
    #[error("{0}")]
    Layout(#[from] LayoutError),
    /// The optimizer did not converge.
    #[error("optimization failed: {0}")]
    Optimizer(#[from] BfgsError),
    /// The optimizer ended in a worse minimum than the recorded one.
    #[error("refined value {refined:e} is worse than recorded value {recorded:e}")]
    WorseThanRecorded {
        /// Value found by the optimizer.
        refined: f64,
        /// Currently recorded value.
        recorded: f64,
    },
    /// Persisting the refined minimum failed.
    #[error("{0}")]
    Store(#[from] StoreError),
    /// Replacing the registry entry failed.
    #[error("{0}")]
    Registry(#[from] RegistryError),
    /// The refinement panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Terminal state of the refinement of one entry.
#[derive(Debug)]
pub enum RefineOutcome {
    /// The entry was replaced with one carrying the refined minimum.
    Refined(RefinedMinimum),
    /// The entry is not eligible for refinement and was left unchanged.
    Skipped(SkipReason),
    /// The refinement failed and the entry was left unchanged.
    Failed(RefineError),
}

impl RefineOutcome {
    /// Returns `true` for [`RefineOutcome::Refined`].
    pub fn is_refined(&self) -> bool {
        matches!(self, RefineOutcome::Refined(_))
    }
}

/// Error of the change log. Aborts a batch.
#[derive(Debug, Error)]
pub enum ChangeLogError {
    /// The log file cannot be opened.
    #[error("cannot open change log {}: {source}", path.display())]
    Open {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Appending to the log failed.
    #[error("cannot write change log: {0}")]
    Write(#[from] io::Error),
}

/// One line of the change log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Entry name.
    pub name: String,
    /// Dimension.
    pub n: usize,
    /// Refined positions in full precision.
    pub positions: Vec<Vec<String>>,
    /// Refined value in full precision.
    pub value: String,
    /// Largest double precision validation residual.
    pub residual: f64,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions = self
            .positions
            .iter()
            .map(|p| format!("[{}]", p.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        write!(
            f,
            "{} n={} position={} value={} residual={:.3e}",
            self.name, self.n, positions, self.value, self.residual
        )
    }
}

/// Append-only change log with serialized appends.
pub struct ChangeLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl ChangeLog {
    /// Wraps a writer.
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(writer)),
        }
    }

    /// Opens a log file for appending, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChangeLogError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ChangeLogError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file))
    }

    /// Log that discards everything.
    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// Appends one line.
    pub fn append(&self, record: &ChangeRecord) -> Result<(), ChangeLogError> {
        let mut sink = self.sink.lock();
        writeln!(sink, "{}", record)?;
        sink.flush()?;
        Ok(())
    }
}

impl fmt::Debug for ChangeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLog").finish_non_exhaustive()
    }
}

/// Precision refiner.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone, Default)]
pub struct PrecisionRefiner {
    options: RefineOptions,
    store: Option<CatalogStore>,
}

impl PrecisionRefiner {
    /// Initializes the refiner with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the refiner with given options.
    pub fn with_options(options: RefineOptions) -> Self {
        Self {
            options,
            store: None,
        }
    }

    /// Attaches a store to which refined minima are written back.
    pub fn with_store(mut self, store: CatalogStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Options of the refiner.
    pub fn options(&self) -> &RefineOptions {
        &self.options
    }

    /// Computes the refined minimum of the entry without replacing anything.
    pub fn refine_entry(
        &self,
        entry: &FunctionEntry,
        resolver: &DimensionResolver,
    ) -> Result<(RefinedMinimum, ChangeRecord), RefineError> {
        let n = resolver.resolve(entry, None)?;
        let domain = entry.domain(n)?.map(|d| d.cast::<DoubleDouble>());
        let bfgs = Bfgs::with_options(self.options.bfgs());

        let x0: DVector<DoubleDouble> = lift(&entry.start(n)?);
        let primary = bfgs.minimize(entry, x0, domain.as_ref())?;
        info!(
            "{}: converged in {} iterations ({:?})",
            entry.name(),
            primary.iterations,
            primary.termination
        );

        let recorded = entry.minimum(n).ok();
        let tolerance = |value: f64| self.options.worse_tol * value.abs().max(1.0);

        // Recorded minimizers are polished from their own positions. A polish
        // never replaces a recorded point by a higher one.
        let mut candidates: Vec<Candidate> = Vec::new();
        for position in recorded.iter().flat_map(|minimum| minimum.positions.iter()) {
            let x: DVector<DoubleDouble> = lift(position);
            let fx = entry.evaluate(&x).unwrap_or_else(|_| DoubleDouble::nan());

            let candidate = match bfgs.minimize(entry, x.clone(), domain.as_ref()) {
                Ok(report) if report.fx <= fx => Candidate {
                    x: report.x,
                    fx: report.fx,
                },
                Ok(_) => Candidate { x, fx },
                Err(error) => {
                    warn!(
                        "{}: minimizer {:?} could not be polished ({}), kept as recorded",
                        entry.name(),
                        position.as_slice(),
                        error
                    );
                    Candidate { x, fx }
                }
            };
            merge(&mut candidates, candidate);
        }

        let primary_fx = primary.fx;
        merge(
            &mut candidates,
            Candidate {
                x: primary.x,
                fx: primary.fx,
            },
        );

        let value = candidates
            .iter()
            .map(|candidate| candidate.fx)
            .filter(|fx| fx.is_finite())
            .fold(primary_fx, |best, fx| if fx < best { fx } else { best });

        if let Some(recorded) = &recorded {
            let refined = value.to_f64();
            if refined - recorded.value > tolerance(recorded.value) {
                return Err(RefineError::WorseThanRecorded {
                    refined,
                    recorded: recorded.value,
                });
            }
        }

        let positions: Vec<DVector<DoubleDouble>> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let fx = candidate.fx.to_f64();
                if fx - value.to_f64() <= tolerance(value.to_f64()) {
                    Some(candidate.x)
                } else {
                    warn!(
                        "{}: minimizer {:?} has a different value {:e}, dropped",
                        entry.name(),
                        lower(&candidate.x).as_slice(),
                        fx
                    );
                    None
                }
            })
            .collect();

        let value_f64 = value.to_f64();
        let residual = positions
            .iter()
            .map(|p| {
                let fx: f64 = entry.evaluate(&lower(p)).unwrap_or(f64::NAN);
                (fx - value_f64).abs()
            })
            .fold(0.0, |acc: f64, r| if r.is_nan() { r } else { acc.max(r) });

        if !(residual <= self.options.validation_tol) {
            warn!(
                "{}: double precision residual {:e} at the refined minimum",
                entry.name(),
                residual
            );
        }

        let digits = self.options.digits;
        let change = ChangeRecord {
            name: entry.name().to_string(),
            n,
            positions: positions
                .iter()
                .map(|p| p.iter().map(|v| v.to_scientific(digits)).collect())
                .collect(),
            value: value.to_scientific(digits),
            residual,
        };

        let refined = RefinedMinimum {
            n,
            value: value_f64,
            extended: Some(change.value.clone()),
            positions: positions
                .iter()
                .map(|p| p.iter().map(|v| v.to_f64()).collect())
                .collect(),
        };

        Ok((refined, change))
    }

    /// Refines one registered entry and replaces it in the registry.
    pub fn process(
        &self,
        registry: &Registry,
        entry: &FunctionEntry,
        log: &ChangeLog,
    ) -> Result<RefineOutcome, ChangeLogError> {
        let name = entry.name();

        if entry.has(Property::HasNoise) || entry.has(Property::Constrained) {
            let reason = if entry.has(Property::HasNoise) {
                SkipReason::Noisy
            } else {
                SkipReason::Constrained
            };
            info!("{}: skipped ({})", name, reason);
            return Ok(RefineOutcome::Skipped(reason));
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.refine_entry(entry, registry.resolver())
        }))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(RefineError::Panicked(message))
        });

        let replaced = result.and_then(|(refined, change)| {
            let replacement = entry.with_refined(refined.clone());
            if let Some(store) = &self.store {
                match store.replace_refined(name, &refined) {
                    // Built-in entries have no stored record yet.
                    Err(StoreError::NotFound(_)) => {
                        store.save(&replacement.to_record())?;
                    }
                    result => result?,
                }
            }
            registry.replace(name, replacement)?;
            Ok((refined, change))
        });

        match replaced {
            Ok((refined, change)) => {
                log.append(&change)?;
                info!("{}: refined to {}", name, change.value);
                Ok(RefineOutcome::Refined(refined))
            }
            Err(error) => {
                error!("{}: refinement failed: {}", name, error);
                Ok(RefineOutcome::Failed(error))
            }
        }
    }

    /// Refines all entries of the registry one by one.
    pub fn run(
        &self,
        registry: &Registry,
        log: &ChangeLog,
    ) -> Result<(Vec<(String, RefineOutcome)>, BatchSummary), ChangeLogError> {
        let outcomes = registry
            .iter()
            .map(|entry| {
                self.process(registry, &entry, log)
                    .map(|outcome| (entry.name().to_string(), outcome))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summarize(outcomes))
    }

    /// Refines all entries of the registry in parallel.
    pub fn run_parallel(
        &self,
        registry: &Registry,
        log: &ChangeLog,
    ) -> Result<(Vec<(String, RefineOutcome)>, BatchSummary), ChangeLogError> {
        let entries: Vec<_> = registry.iter().collect();

        let outcomes = entries
            .par_iter()
            .map(|entry| {
                self.process(registry, entry, log)
                    .map(|outcome| (entry.name().to_string(), outcome))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summarize(outcomes))
    }
}

/// Minimizers closer than this (relative) are the same minimizer.
const MERGE_RADIUS: f64 = 1e-3;

struct Candidate {
    x: DVector<DoubleDouble>,
    fx: DoubleDouble,
}

// Adds the candidate, or replaces a nearby one if the candidate is lower.
fn merge(candidates: &mut Vec<Candidate>, candidate: Candidate) {
    let near = candidates.iter_mut().find(|other| {
        relative_difference(&lower(&other.x), &lower(&candidate.x)) <= MERGE_RADIUS
    });

    match near {
        Some(other) => {
            if candidate.fx < other.fx {
                *other = candidate;
            }
        }
        None => candidates.push(candidate),
    }
}

fn summarize(
    outcomes: Vec<(String, RefineOutcome)>,
) -> (Vec<(String, RefineOutcome)>, BatchSummary) {
    let mut summary = BatchSummary::new("modified");

    for (_, outcome) in &outcomes {
        match outcome {
            RefineOutcome::Refined(_) => summary.success(),
            RefineOutcome::Skipped(_) => summary.skip(),
            RefineOutcome::Failed(_) => summary.failure(),
        }
    }

    info!("precision refinement: {}", summary);
    (outcomes, summary)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::consistency::ConsistencyChecker;
    use crate::core::{Layout, MinimumSource};
    use crate::testing::*;

    fn shifted_record(name: &str) -> crate::record::EntryRecord {
        // Recorded minimizer is off by 1e-6, refinement moves it to the origin.
        paraboloid_record(name)
            .with_start(Layout::Repeat(vec![0.75, -0.5]))
            .with_minimum(vec![Layout::Repeat(vec![1e-6])], 0.0)
    }

    #[test]
    fn refines_and_replaces() {
        let (registry, _) = Registry::load(vec![crate::record::EntryDef::new(
            Paraboloid,
            shifted_record("bowl"),
        )]);
        let buffer = SharedBuffer::new();
        let log = ChangeLog::new(buffer.clone());

        let (outcomes, summary) = PrecisionRefiner::new().run(&registry, &log).unwrap();

        assert_eq!(summary.succeeded, 1);
        assert!(outcomes[0].1.is_refined());

        let entry = registry.lookup("bowl").unwrap();
        let minimum = entry.minimum(2).unwrap();
        assert_eq!(minimum.source, MinimumSource::Refined);
        assert_abs_diff_eq!(minimum.positions[0][0], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(minimum.value, 0.0, epsilon = 1e-28);

        let report = ConsistencyChecker::new().check(&entry, 2).unwrap();
        assert!(report.is_consistent());

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bowl n=2 position=["));
    }

    #[test]
    fn refinement_is_idempotent() {
        let (registry, _) = Registry::load(vec![paraboloid_def("bowl")]);
        let refiner = PrecisionRefiner::new();
        let log = ChangeLog::discard();

        refiner.run(&registry, &log).unwrap();
        let first = registry.lookup("bowl").unwrap().minimum(2).unwrap();
        refiner.run(&registry, &log).unwrap();
        let second = registry.lookup("bowl").unwrap().minimum(2).unwrap();

        assert_abs_diff_eq!(first.value, second.value, epsilon = 1e-15);
        assert_abs_diff_eq!(
            first.positions[0],
            second.positions[0],
            epsilon = 1e-15
        );
    }

    #[test]
    fn exact_minimizer_is_kept() {
        let (registry, _) = Registry::load(vec![paraboloid_def("bowl")]);

        PrecisionRefiner::new()
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        let minimum = registry.lookup("bowl").unwrap().minimum(2).unwrap();
        assert_eq!(minimum.source, MinimumSource::Refined);
        assert_eq!(minimum.positions.len(), 1);
        assert!(minimum.positions[0].iter().all(|&x| x == 0.0));
        assert_eq!(minimum.value, 0.0);
    }

    #[test]
    fn noisy_entry_is_skipped_silently() {
        let (registry, _) = Registry::load(vec![noisy_def("noisy")]);
        let before = registry.lookup("noisy").unwrap();
        let buffer = SharedBuffer::new();

        let (outcomes, summary) = PrecisionRefiner::new()
            .run(&registry, &ChangeLog::new(buffer.clone()))
            .unwrap();

        assert!(matches!(
            outcomes[0].1,
            RefineOutcome::Skipped(SkipReason::Noisy)
        ));
        assert_eq!(summary.skipped, 1);
        assert!(buffer.contents().is_empty());
        assert!(std::sync::Arc::ptr_eq(
            &before,
            &registry.lookup("noisy").unwrap()
        ));
    }

    #[test]
    fn worse_value_is_rejected() {
        // Recorded value below the true minimum, no optimizer can reach it.
        let record = paraboloid_record("bowl").with_minimum(vec![Layout::Repeat(vec![0.0])], -1.0);
        let (registry, _) = Registry::load(vec![crate::record::EntryDef::new(Paraboloid, record)]);

        let (outcomes, summary) = PrecisionRefiner::new()
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        assert!(matches!(
            outcomes[0].1,
            RefineOutcome::Failed(RefineError::WorseThanRecorded { .. })
        ));
        assert_eq!(summary.failed, 1);
        assert_eq!(
            registry.lookup("bowl").unwrap().minimum(2).unwrap().source,
            MinimumSource::Literature
        );
    }

    #[test]
    fn budget_exhaustion_fails_only_that_entry() {
        let mut options = RefineOptions::default();
        options.set_max_iters(0);
        let refiner = PrecisionRefiner::with_options(options);

        let (registry, _) = Registry::load(vec![paraboloid_def("bowl"), noisy_def("noisy")]);
        let (outcomes, summary) = refiner.run(&registry, &ChangeLog::discard()).unwrap();

        assert!(matches!(
            outcomes[0].1,
            RefineOutcome::Failed(RefineError::Optimizer(BfgsError::NoConvergence { .. }))
        ));
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let defs = || {
            vec![
                paraboloid_def("a"),
                paraboloid_def("b"),
                noisy_def("c"),
                paraboloid_def("d"),
            ]
        };
        let (sequential, _) = Registry::load(defs());
        let (parallel, _) = Registry::load(defs());
        let buffer = SharedBuffer::new();
        let refiner = PrecisionRefiner::new();

        let (_, s1) = refiner.run(&sequential, &ChangeLog::discard()).unwrap();
        let (_, s2) = refiner
            .run_parallel(&parallel, &ChangeLog::new(buffer.clone()))
            .unwrap();

        assert_eq!(s1, s2);
        assert_eq!(buffer.lines().len(), 3);
    }

    #[test]
    fn refined_minimum_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();
        store.save(&paraboloid_record("bowl")).unwrap();

        let (registry, _) = Registry::load(vec![paraboloid_def("bowl")]);
        PrecisionRefiner::new()
            .with_store(store.clone())
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        let refined = store.load("bowl").unwrap().refined.unwrap();
        assert_eq!(refined.n, 2);
        assert_eq!(refined.positions.len(), 1);
    }

    #[test]
    fn refined_minimum_is_persisted_without_stored_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        let (registry, _) = Registry::load(vec![paraboloid_def("bowl")]);
        let (outcomes, summary) = PrecisionRefiner::new()
            .with_store(store.clone())
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        assert!(outcomes[0].1.is_refined());
        assert!(summary.is_clean());

        let record = store.load("bowl").unwrap();
        assert_eq!(record.name, "bowl");
        assert_eq!(record.refined.unwrap().n, 2);
    }

    #[test]
    fn change_log_format() {
        let record = ChangeRecord {
            name: "bowl".to_string(),
            n: 2,
            positions: vec![
                vec!["1.0e0".to_string(), "2.0e0".to_string()],
                vec!["3.0e0".to_string(), "4.0e0".to_string()],
            ],
            value: "5.0e0".to_string(),
            residual: 0.0,
        };

        assert_eq!(
            record.to_string(),
            "bowl n=2 position=[1.0e0, 2.0e0]; [3.0e0, 4.0e0] value=5.0e0 residual=0.000e0"
        );
    }
}
