//! Fixed vocabulary of descriptive property tags.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Descriptive tag of a benchmark function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    /// The search domain is a finite box.
    Bounded,
    /// The formula is continuous.
    Continuous,
    /// The formula is differentiable everywhere in the domain.
    Differentiable,
    /// The formula is a sum of univariate terms.
    Separable,
    /// The formula is not separable.
    NonSeparable,
    /// Exactly one local minimum.
    Unimodal,
    /// Many local minima.
    Multimodal,
    /// The formula is convex.
    Convex,
    /// The formula is defined for any number of variables.
    Scalable,
    /// Evaluations are perturbed by random noise.
    HasNoise,
    /// The formula is undefined (NaN) outside of a feasible region.
    Constrained,
    /// The literature disagrees on the formula or its minimum.
    Controversial,
}

impl Property {
    /// All tags of the vocabulary.
    pub const ALL: [Property; 12] = [
        Property::Bounded,
        Property::Continuous,
        Property::Differentiable,
        Property::Separable,
        Property::NonSeparable,
        Property::Unimodal,
        Property::Multimodal,
        Property::Convex,
        Property::Scalable,
        Property::HasNoise,
        Property::Constrained,
        Property::Controversial,
    ];

    /// Canonical `snake_case` name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Bounded => "bounded",
            Property::Continuous => "continuous",
            Property::Differentiable => "differentiable",
            Property::Separable => "separable",
            Property::NonSeparable => "non_separable",
            Property::Unimodal => "unimodal",
            Property::Multimodal => "multimodal",
            Property::Convex => "convex",
            Property::Scalable => "scalable",
            Property::HasNoise => "has_noise",
            Property::Constrained => "constrained",
            Property::Controversial => "controversial",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag outside of the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown property `{0}`")]
pub struct UnknownProperty(pub String);

impl FromStr for Property {
    type Err = UnknownProperty;

    /// Parses a tag, ignoring case and `_`, `-` or space separators (so
    /// `HasNoise`, `has_noise` and `has-noise` are all accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Property::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().replace('_', "") == key)
            .ok_or_else(|| UnknownProperty(s.to_string()))
    }
}

/// Set of property tags of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet(BTreeSet<Property>);

impl PropertySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a list of tags, failing on the first unknown one.
    pub fn parse<I, S>(tags: I) -> Result<Self, UnknownProperty>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|tag| tag.as_ref().parse())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Tests whether the set contains the tag.
    pub fn contains(&self, property: Property) -> bool {
        self.0.contains(&property)
    }

    /// Adds a tag.
    pub fn insert(&mut self, property: Property) -> bool {
        self.0.insert(property)
    }

    /// Iterates over the tags in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = Property> + '_ {
        self.0.iter().copied()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical names of the tags.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl FromIterator<Property> for PropertySet {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_is_lenient_on_spelling() {
        assert_eq!("HasNoise".parse(), Ok(Property::HasNoise));
        assert_eq!("has_noise".parse(), Ok(Property::HasNoise));
        assert_eq!("non-separable".parse(), Ok(Property::NonSeparable));
        assert_eq!("Non Separable".parse(), Ok(Property::NonSeparable));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = PropertySet::parse(["convex", "smooth"]).unwrap_err();
        assert_eq!(err, UnknownProperty("smooth".to_string()));
    }

    #[test]
    fn canonical_names_round_trip() {
        for p in Property::ALL {
            assert_eq!(p.as_str().parse(), Ok(p));
        }
    }
}
