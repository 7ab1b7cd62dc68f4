//! Benchmark function entries and their metadata.
//!
//! Vector-valued metadata (bounds, starting point, minimizers) of scalable
//! functions depends on the dimension. It is therefore stored as a [`Layout`]
//! and only materialized for a concrete `n`.

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::domain::Domain;
use super::kernel::{EvalError, GradientError, Kernel, Representation};
use super::property::{Property, PropertySet, UnknownProperty};
use crate::record::{BoundsRecord, EntryRecord};

/// Dimension-dependent vector metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// The exact vector, valid only for `n` equal to its length.
    Explicit(Vec<f64>),
    /// Pattern repeated cyclically up to length `n`.
    Repeat(Vec<f64>),
}

/// Error when materializing a [`Layout`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Explicit vector of another dimension.
    #[error("explicit vector of length {len} used for dimension {n}")]
    Length {
        /// Length of the explicit vector.
        len: usize,
        /// Requested dimension.
        n: usize,
    },
    /// No values at all.
    #[error("empty layout")]
    Empty,
    /// Zero-dimensional vectors are not supported.
    #[error("dimension must be positive")]
    ZeroDimension,
}

impl Layout {
    /// Materializes the layout for dimension `n`.
    pub fn resolve(&self, n: usize) -> Result<DVector<f64>, LayoutError> {
        if n == 0 {
            return Err(LayoutError::ZeroDimension);
        }

        match self {
            Layout::Explicit(values) if values.is_empty() => Err(LayoutError::Empty),
            Layout::Explicit(values) if values.len() != n => Err(LayoutError::Length {
                len: values.len(),
                n,
            }),
            Layout::Explicit(values) => Ok(DVector::from_vec(values.clone())),
            Layout::Repeat(pattern) if pattern.is_empty() => Err(LayoutError::Empty),
            Layout::Repeat(pattern) => Ok(DVector::from_iterator(
                n,
                pattern.iter().copied().cycle().take(n),
            )),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Layout::Explicit(values) | Layout::Repeat(values) => values.is_empty(),
        }
    }
}

/// How the recorded minimum value depends on the dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueScaling {
    /// Same value for every dimension.
    #[default]
    Constant,
    /// The value is multiplied by `n`.
    PerDimension,
}

impl ValueScaling {
    /// Value of the minimum at dimension `n`.
    pub fn apply(&self, value: f64, n: usize) -> f64 {
        match self {
            ValueScaling::Constant => value,
            ValueScaling::PerDimension => value * n as f64,
        }
    }
}

/// Dimensionality of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DimensionKind {
    /// Defined for exactly `n` variables.
    Fixed {
        /// Number of variables.
        n: usize,
    },
    /// Defined for any number of variables.
    Scalable {
        /// Dimension used when none is requested. Legacy entries may miss it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_n: Option<usize>,
    },
}

impl DimensionKind {
    /// Tests whether a point with `n` variables is accepted.
    pub fn admits(&self, n: usize) -> bool {
        match *self {
            DimensionKind::Fixed { n: k } => n == k,
            DimensionKind::Scalable { .. } => n >= 1,
        }
    }

    /// Dimension known without probing, if any.
    pub fn working(&self) -> Option<usize> {
        match *self {
            DimensionKind::Fixed { n } => Some(n),
            DimensionKind::Scalable { default_n } => default_n,
        }
    }

    /// Returns `true` for scalable functions.
    pub fn is_scalable(&self) -> bool {
        matches!(self, DimensionKind::Scalable { .. })
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionKind::Fixed { n } => write!(f, "fixed ({})", n),
            DimensionKind::Scalable { default_n: Some(n) } => write!(f, "scalable (default {})", n),
            DimensionKind::Scalable { default_n: None } => f.write_str("scalable"),
        }
    }
}

/// Global minimum as published in the literature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureMinimum {
    /// Minimum value (per dimension if `scaling` says so).
    pub value: f64,
    /// Dependence of the value on the dimension.
    #[serde(default)]
    pub scaling: ValueScaling,
    /// Known minimizers. Explicit layouts only apply at their own dimension.
    pub positions: Vec<Layout>,
}

/// Global minimum improved by the refinement pipeline at one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedMinimum {
    /// Dimension the refinement was done in.
    pub n: usize,
    /// Refined minimum value.
    pub value: f64,
    /// The value with all digits of the extended precision computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<String>,
    /// Refined minimizers, each of length `n`.
    pub positions: Vec<Vec<f64>>,
}

/// Where a reported minimum comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimumSource {
    /// Literature value.
    Literature,
    /// Refined value.
    Refined,
}

impl fmt::Display for MinimumSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinimumSource::Literature => f.write_str("literature"),
            MinimumSource::Refined => f.write_str("refined"),
        }
    }
}

/// Global minimum materialized for a concrete dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// All recorded minimizers (non-empty).
    pub positions: Vec<DVector<f64>>,
    /// Minimum value.
    pub value: f64,
    /// Source of the data.
    pub source: MinimumSource,
}

/// Error when asking for the minimum at a dimension.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MinimumError {
    /// No recorded minimizer applies to the dimension.
    #[error("no minimizer recorded for dimension {n}")]
    NotRecorded {
        /// Requested dimension.
        n: usize,
    },
}

/// Error when constructing an entry from its record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntryError {
    /// A tag is outside of the vocabulary.
    #[error("entry `{name}`: {source}")]
    InvalidProperty {
        /// Entry name.
        name: String,
        /// The unknown tag.
        #[source]
        source: UnknownProperty,
    },
    /// Structurally invalid entry.
    #[error("malformed entry `{name}`: {reason}")]
    Malformed {
        /// Entry name.
        name: String,
        /// What is wrong.
        reason: String,
    },
}

/// One benchmark function of the catalog.
///
/// Entries are immutable. Refinement produces a new entry with
/// [`FunctionEntry::with_refined`], which then replaces the old one in the
/// [registry](crate::registry::Registry).
#[derive(Clone)]
pub struct FunctionEntry {
    name: String,
    description: String,
    formula: String,
    reference: String,
    dimension: DimensionKind,
    properties: PropertySet,
    bounds: Option<(Layout, Layout)>,
    start: Layout,
    literature: LiteratureMinimum,
    refined: Option<RefinedMinimum>,
    kernel: Arc<dyn Kernel>,
}

impl FunctionEntry {
    /// Validates the record and creates the entry.
    ///
    /// The name is normalized to lowercase. Layouts are checked against the
    /// working dimension when the entry has one.
    pub fn new(kernel: Arc<dyn Kernel>, record: EntryRecord) -> Result<Self, EntryError> {
        let name = record.name.trim().to_lowercase();

        let malformed = |reason: String| EntryError::Malformed {
            name: name.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(malformed("empty name".to_string()));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(malformed("name contains whitespace".to_string()));
        }

        let properties =
            PropertySet::parse(&record.properties).map_err(|source| EntryError::InvalidProperty {
                name: name.clone(),
                source,
            })?;

        match record.dimension {
            DimensionKind::Fixed { n: 0 } | DimensionKind::Scalable { default_n: Some(0) } => {
                return Err(malformed("dimension must be positive".to_string()));
            }
            _ => {}
        }

        if properties.contains(Property::Scalable) != record.dimension.is_scalable() {
            return Err(malformed(format!(
                "`scalable` tag inconsistent with dimension kind {}",
                record.dimension
            )));
        }

        if properties.contains(Property::HasNoise) && record.refined.is_some() {
            return Err(malformed("noisy entry carries a refined minimum".to_string()));
        }

        if record.start.is_empty() {
            return Err(malformed("empty starting point".to_string()));
        }
        if record.minimum.positions.is_empty() {
            return Err(malformed("no minimizer recorded".to_string()));
        }
        if record.minimum.positions.iter().any(Layout::is_empty) {
            return Err(malformed("empty minimizer".to_string()));
        }
        if !record.minimum.value.is_finite() {
            return Err(malformed("minimum value is not finite".to_string()));
        }

        let bounds = match record.bounds {
            Some(BoundsRecord { lower, upper }) => {
                if lower.is_empty() || upper.is_empty() {
                    return Err(malformed("empty bounds".to_string()));
                }
                Some((lower, upper))
            }
            None => None,
        };

        if let Some(refined) = &record.refined {
            if !record.dimension.admits(refined.n) {
                return Err(malformed(format!(
                    "refined minimum for unsupported dimension {}",
                    refined.n
                )));
            }
            if refined.positions.is_empty()
                || refined.positions.iter().any(|p| p.len() != refined.n)
            {
                return Err(malformed(format!(
                    "refined minimizers do not have dimension {}",
                    refined.n
                )));
            }
        }

        let entry = Self {
            name,
            description: record.description,
            formula: record.formula,
            reference: record.reference,
            dimension: record.dimension,
            properties,
            bounds,
            start: record.start,
            literature: record.minimum,
            refined: record.refined,
            kernel,
        };

        if let Some(n) = entry.dimension.working() {
            entry
                .validate_at(n)
                .map_err(|reason| EntryError::Malformed {
                    name: entry.name.clone(),
                    reason,
                })?;
        }

        Ok(entry)
    }

    /// Checks that all metadata can be materialized at dimension `n`.
    pub fn validate_at(&self, n: usize) -> Result<(), String> {
        if let Some(domain) = self.domain(n).map_err(|e| format!("bounds: {}", e))? {
            if domain
                .lower()
                .iter()
                .zip(domain.upper().iter())
                .any(|(l, u)| !(l <= u))
            {
                return Err("lower bound exceeds upper bound".to_string());
            }
        }
        self.start(n).map_err(|e| format!("start: {}", e))?;
        self.minimum(n).map_err(|e| format!("minimum: {}", e))?;
        Ok(())
    }

    /// Lowercase unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Human-readable formula text.
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Bibliographic reference.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Dimensionality.
    pub fn dimension(&self) -> DimensionKind {
        self.dimension
    }

    /// Declared property tags.
    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    /// Tests whether the entry declares a tag.
    pub fn has(&self, property: Property) -> bool {
        self.properties.contains(property)
    }

    /// Evaluation kernel.
    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    /// Literature minimum as recorded.
    pub fn literature(&self) -> &LiteratureMinimum {
        &self.literature
    }

    /// Refined minimum, if any.
    pub fn refined(&self) -> Option<&RefinedMinimum> {
        self.refined.as_ref()
    }

    /// Tests whether a point with `n` variables is accepted.
    pub fn accepts_dimension(&self, n: usize) -> bool {
        self.dimension.admits(n)
    }

    /// Domain at dimension `n`, or `None` for unbounded functions.
    pub fn domain(&self, n: usize) -> Result<Option<Domain<f64>>, LayoutError> {
        match &self.bounds {
            Some((lower, upper)) => Ok(Some(Domain::rect(lower.resolve(n)?, upper.resolve(n)?))),
            None => Ok(None),
        }
    }

    /// Domain at dimension `n`, unconstrained for unbounded functions.
    pub fn domain_or_unconstrained(&self, n: usize) -> Result<Domain<f64>, LayoutError> {
        Ok(self
            .domain(n)?
            .unwrap_or_else(|| Domain::unconstrained(n.max(1))))
    }

    /// Starting point at dimension `n`.
    pub fn start(&self, n: usize) -> Result<DVector<f64>, LayoutError> {
        self.start.resolve(n)
    }

    /// Global minimum at dimension `n`. A refined minimum takes precedence at
    /// its own dimension.
    pub fn minimum(&self, n: usize) -> Result<Minimum, MinimumError> {
        if let Some(refined) = self.refined.as_ref().filter(|r| r.n == n) {
            return Ok(Minimum {
                positions: refined
                    .positions
                    .iter()
                    .map(|p| DVector::from_vec(p.clone()))
                    .collect(),
                value: refined.value,
                source: MinimumSource::Refined,
            });
        }

        if !self.dimension.admits(n) {
            return Err(MinimumError::NotRecorded { n });
        }

        let positions: Vec<_> = self
            .literature
            .positions
            .iter()
            .filter_map(|layout| layout.resolve(n).ok())
            .collect();

        if positions.is_empty() {
            return Err(MinimumError::NotRecorded { n });
        }

        Ok(Minimum {
            positions,
            value: self.literature.scaling.apply(self.literature.value, n),
            source: MinimumSource::Literature,
        })
    }

    /// All recorded minimizers at dimension `n`.
    pub fn min_position(&self, n: usize) -> Result<Vec<DVector<f64>>, MinimumError> {
        self.minimum(n).map(|m| m.positions)
    }

    /// Recorded minimum value at dimension `n`.
    pub fn min_value(&self, n: usize) -> Result<f64, MinimumError> {
        self.minimum(n).map(|m| m.value)
    }

    fn expected_dim(&self, got: usize) -> Option<usize> {
        if self.dimension.admits(got) {
            None
        } else {
            Some(self.dimension.working().unwrap_or(1))
        }
    }

    /// Evaluates the formula in any supported representation.
    pub fn evaluate<T: Representation>(&self, x: &DVector<T>) -> Result<T, EvalError> {
        if let Some(expected) = self.expected_dim(x.len()) {
            return Err(EvalError::InvalidDimensionality {
                expected,
                got: x.len(),
            });
        }

        Ok(T::eval_kernel(self.kernel(), x))
    }

    /// Evaluates the analytic gradient in any supported representation.
    pub fn gradient<T: Representation>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        if let Some(expected) = self.expected_dim(x.len()) {
            return Err(GradientError::InvalidDimensionality {
                expected,
                got: x.len(),
            });
        }

        T::gradient_kernel(self.kernel(), x)
    }

    /// Creates a copy of the entry carrying the refined minimum. The entry
    /// itself is left untouched.
    pub fn with_refined(&self, refined: RefinedMinimum) -> Self {
        Self {
            refined: Some(refined),
            ..self.clone()
        }
    }

    /// Converts the entry back into its persisted form.
    pub fn to_record(&self) -> EntryRecord {
        EntryRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            formula: self.formula.clone(),
            reference: self.reference.clone(),
            properties: self.properties.to_strings(),
            dimension: self.dimension,
            start: self.start.clone(),
            bounds: self.bounds.as_ref().map(|(lower, upper)| BoundsRecord {
                lower: lower.clone(),
                upper: upper.clone(),
            }),
            minimum: self.literature.clone(),
            refined: self.refined.clone(),
        }
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .field("properties", &self.properties)
            .field("refined", &self.refined)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use super::*;
    use crate::testing::*;

    #[test]
    fn layouts() {
        assert_eq!(
            Layout::Repeat(vec![1.0, 2.0]).resolve(5).unwrap(),
            dvector![1.0, 2.0, 1.0, 2.0, 1.0]
        );
        assert_eq!(
            Layout::Explicit(vec![1.0, 2.0]).resolve(3),
            Err(LayoutError::Length { len: 2, n: 3 })
        );
        assert_eq!(Layout::Repeat(vec![]).resolve(3), Err(LayoutError::Empty));
    }

    #[test]
    fn name_is_normalized() {
        let entry = FunctionEntry::new(paraboloid_kernel(), paraboloid_record("  Bowl ")).unwrap();
        assert_eq!(entry.name(), "bowl");
    }

    #[test]
    fn malformed_records_are_rejected() {
        let mut record = paraboloid_record("with space");
        assert!(matches!(
            FunctionEntry::new(paraboloid_kernel(), record.clone()),
            Err(EntryError::Malformed { .. })
        ));

        record.name = "bowl".to_string();
        record.dimension = DimensionKind::Fixed { n: 0 };
        assert!(matches!(
            FunctionEntry::new(paraboloid_kernel(), record.clone()),
            Err(EntryError::Malformed { .. })
        ));

        record.dimension = DimensionKind::Fixed { n: 3 };
        record.properties.retain(|p| p != "scalable");
        // Explicit minimizer of length 2 does not apply at n = 3.
        record.minimum.positions = vec![Layout::Explicit(vec![0.0, 0.0])];
        assert!(matches!(
            FunctionEntry::new(paraboloid_kernel(), record),
            Err(EntryError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_invalid_property() {
        let record = paraboloid_record("bowl").with_properties(["convex", "shiny"]);
        assert!(matches!(
            FunctionEntry::new(paraboloid_kernel(), record),
            Err(EntryError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn scalable_tag_must_match_dimension() {
        let mut record = paraboloid_record("bowl");
        record.properties.retain(|p| p != "scalable");
        assert!(matches!(
            FunctionEntry::new(paraboloid_kernel(), record),
            Err(EntryError::Malformed { .. })
        ));
    }

    #[test]
    fn refined_minimum_takes_precedence_at_its_dimension() {
        let entry = FunctionEntry::new(paraboloid_kernel(), paraboloid_record("bowl")).unwrap();
        let refined = entry.with_refined(RefinedMinimum {
            n: 3,
            positions: vec![vec![0.0; 3]],
            value: 1e-40,
            extended: None,
        });

        assert_eq!(entry.minimum(3).unwrap().source, MinimumSource::Literature);
        assert_eq!(refined.minimum(3).unwrap().source, MinimumSource::Refined);
        assert_eq!(refined.minimum(2).unwrap().source, MinimumSource::Literature);
        assert_abs_diff_eq!(refined.min_value(3).unwrap(), 1e-40);
    }

    #[test]
    fn dimension_is_checked_before_evaluation() {
        let record = paraboloid_record("bowl").with_dimension(DimensionKind::Fixed { n: 2 });
        let mut record = record;
        record.properties.retain(|p| p != "scalable");
        let entry = FunctionEntry::new(paraboloid_kernel(), record).unwrap();

        assert_eq!(entry.evaluate(&dvector![1.0, 1.0]), Ok(2.0));
        assert_eq!(
            entry.evaluate(&dvector![1.0, 1.0, 1.0]),
            Err(EvalError::InvalidDimensionality {
                expected: 2,
                got: 3
            })
        );
    }

    #[test]
    fn record_round_trip_preserves_entry() {
        let entry = FunctionEntry::new(paraboloid_kernel(), paraboloid_record("bowl")).unwrap();
        let again = FunctionEntry::new(paraboloid_kernel(), entry.to_record()).unwrap();
        assert_eq!(entry.to_record(), again.to_record());
    }
}
