//! Persisted form of catalog entries.
//!
//! An [`EntryRecord`] holds all metadata of an entry as plain data that can be
//! (de)serialized with `serde`. The formula itself is code and is attached to
//! a record by an [`EntryDef`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    DimensionKind, EntryError, Formula, FunctionEntry, Kernel, Layout, LiteratureMinimum,
    RefinedMinimum, ValueScaling,
};

/// Bound constraints of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsRecord {
    /// Lower bounds.
    pub lower: Layout,
    /// Upper bounds.
    pub upper: Layout,
}

/// Metadata of one entry.
///
/// Fields holding plain values come first so that the record serializes to
/// TOML with all tables at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Unique name (normalized to lowercase on registration).
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Formula as display text.
    #[serde(default)]
    pub formula: String,
    /// Bibliographic reference.
    #[serde(default)]
    pub reference: String,
    /// Property tags.
    #[serde(default)]
    pub properties: Vec<String>,
    /// Dimensionality.
    pub dimension: DimensionKind,
    /// Standard starting point.
    pub start: Layout,
    /// Bound constraints, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsRecord>,
    /// Literature minimum.
    pub minimum: LiteratureMinimum,
    /// Refined minimum, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined: Option<RefinedMinimum>,
}

impl EntryRecord {
    /// Creates a record with a single minimizer at the origin, value zero and
    /// starting point of all ones. Use the `with_*` methods to fill in the
    /// actual metadata.
    pub fn new(name: impl Into<String>, dimension: DimensionKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            formula: String::new(),
            reference: String::new(),
            properties: Vec::new(),
            dimension,
            start: Layout::Repeat(vec![1.0]),
            bounds: None,
            minimum: LiteratureMinimum {
                positions: vec![Layout::Repeat(vec![0.0])],
                value: 0.0,
                scaling: ValueScaling::Constant,
            },
            refined: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the formula text.
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    /// Sets the reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Sets the property tags.
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the dimensionality.
    pub fn with_dimension(mut self, dimension: DimensionKind) -> Self {
        self.dimension = dimension;
        self
    }

    /// Sets the bounds.
    pub fn with_bounds(mut self, lower: Layout, upper: Layout) -> Self {
        self.bounds = Some(BoundsRecord { lower, upper });
        self
    }

    /// Sets the starting point.
    pub fn with_start(mut self, start: Layout) -> Self {
        self.start = start;
        self
    }

    /// Sets the literature minimum with value independent of the dimension.
    pub fn with_minimum(mut self, positions: Vec<Layout>, value: f64) -> Self {
        self.minimum = LiteratureMinimum {
            positions,
            value,
            scaling: ValueScaling::Constant,
        };
        self
    }

    /// Sets the literature minimum with value proportional to the dimension.
    pub fn with_minimum_per_dimension(mut self, positions: Vec<Layout>, value: f64) -> Self {
        self.minimum = LiteratureMinimum {
            positions,
            value,
            scaling: ValueScaling::PerDimension,
        };
        self
    }

    /// Sets the refined minimum.
    pub fn with_refined(mut self, refined: RefinedMinimum) -> Self {
        self.refined = Some(refined);
        self
    }
}

/// Definition of an entry: formula code plus its metadata.
#[derive(Clone)]
pub struct EntryDef {
    /// Evaluation kernel.
    pub kernel: Arc<dyn Kernel>,
    /// Metadata.
    pub record: EntryRecord,
}

impl EntryDef {
    /// Attaches a formula to a record.
    pub fn new<F: Formula>(formula: F, record: EntryRecord) -> Self {
        Self {
            kernel: Arc::new(formula),
            record,
        }
    }

    /// Name as written in the record.
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Validates the definition into an entry.
    pub fn build(self) -> Result<FunctionEntry, EntryError> {
        FunctionEntry::new(self.kernel, self.record)
    }
}

impl fmt::Debug for EntryDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryDef")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn toml_round_trip() {
        let record = paraboloid_record("bowl")
            .with_bounds(Layout::Repeat(vec![-5.0]), Layout::Repeat(vec![5.0]))
            .with_refined(RefinedMinimum {
                n: 2,
                positions: vec![vec![0.0, 0.0]],
                value: 0.0,
                extended: Some("0.0e0".to_string()),
            });

        let text = toml::to_string(&record).unwrap();
        let back: EntryRecord = toml::from_str(&text).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn legacy_record_without_default_dimension() {
        let text = r#"
            name = "legacy"
            properties = ["scalable"]

            [dimension]
            kind = "scalable"

            [start]
            repeat = [1.0]

            [minimum]
            value = 0.0

            [[minimum.positions]]
            explicit = [0.0, 0.0, 0.0, 0.0]
        "#;

        let record: EntryRecord = toml::from_str(text).unwrap();
        assert_eq!(record.dimension, DimensionKind::Scalable { default_n: None });
        assert_eq!(record.minimum.scaling, ValueScaling::Constant);
        assert!(record.refined.is_none());
    }
}
