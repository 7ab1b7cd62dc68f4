//! Name-keyed, insertion-ordered collection of catalog entries.
//!
//! Registration validates every entry. After that, the set of names is fixed
//! and entries can only be swapped for refined versions of themselves with
//! [`Registry::replace`], which is atomic: concurrent readers observe either
//! the old or the new entry, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use log::warn;
use thiserror::Error;

use crate::core::{EntryError, FunctionEntry};
use crate::dimension::DimensionResolver;
use crate::record::EntryDef;

/// Error when registering or looking up entries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// An entry with the same (lowercase) name exists.
    #[error("duplicate entry name `{0}`")]
    DuplicateName(String),
    /// A property tag is outside of the vocabulary.
    #[error("entry `{name}` has unknown property `{tag}`")]
    InvalidProperty {
        /// Entry name.
        name: String,
        /// The unknown tag.
        tag: String,
    },
    /// Scalable entry without default dimension whose dimension cannot be
    /// probed.
    #[error("entry `{0}` has no default dimension and none could be probed")]
    MissingDimension(String),
    /// Structurally invalid entry.
    #[error("malformed entry `{name}`: {reason}")]
    MalformedEntry {
        /// Entry name.
        name: String,
        /// What is wrong.
        reason: String,
    },
    /// No entry of given name.
    #[error("entry `{0}` not found")]
    NotFound(String),
}

impl From<EntryError> for RegistryError {
    fn from(error: EntryError) -> Self {
        match error {
            EntryError::InvalidProperty { name, source } => RegistryError::InvalidProperty {
                name,
                tag: source.0,
            },
            EntryError::Malformed { name, reason } => {
                RegistryError::MalformedEntry { name, reason }
            }
        }
    }
}

/// Registry of catalog entries.
///
/// See [module](self) documentation for more details.
#[derive(Default)]
pub struct Registry {
    entries: IndexMap<String, ArcSwap<FunctionEntry>>,
    resolver: DimensionResolver,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry probing legacy entries with given resolver.
    pub fn with_resolver(resolver: DimensionResolver) -> Self {
        Self {
            entries: IndexMap::new(),
            resolver,
        }
    }

    /// Builds a registry from definitions.
    ///
    /// Invalid definitions are reported and skipped, the rest are registered.
    pub fn load<I>(defs: I) -> (Self, Vec<RegistryError>)
    where
        I: IntoIterator<Item = EntryDef>,
    {
        let mut registry = Self::new();
        let errors = defs
            .into_iter()
            .filter_map(|def| registry.register(def).err())
            .collect();
        (registry, errors)
    }

    /// Validates and registers an entry.
    pub fn register(&mut self, def: EntryDef) -> Result<Arc<FunctionEntry>, RegistryError> {
        let entry = def.build()?;

        if self.entries.contains_key(entry.name()) {
            return Err(RegistryError::DuplicateName(entry.name().to_string()));
        }

        if entry.dimension().working().is_none() {
            match self.resolver.probe(&entry) {
                Some(n) => {
                    warn!(
                        "entry `{}` has no default dimension, probed n = {} (consider recording it)",
                        entry.name(),
                        n
                    );
                    entry
                        .validate_at(n)
                        .map_err(|reason| RegistryError::MalformedEntry {
                            name: entry.name().to_string(),
                            reason,
                        })?;
                }
                None => return Err(RegistryError::MissingDimension(entry.name().to_string())),
            }
        }

        let entry = Arc::new(entry);
        self.entries.insert(
            entry.name().to_string(),
            ArcSwap::new(Arc::clone(&entry)),
        );
        Ok(entry)
    }

    /// Looks up an entry by name (case-insensitive).
    pub fn lookup(&self, name: &str) -> Result<Arc<FunctionEntry>, RegistryError> {
        self.entries
            .get(&name.trim().to_lowercase())
            .map(|slot| slot.load_full())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Atomically replaces an existing entry. The new entry must have the same
    /// name.
    pub fn replace(&self, name: &str, entry: FunctionEntry) -> Result<(), RegistryError> {
        let key = name.trim().to_lowercase();
        let slot = self
            .entries
            .get(&key)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if entry.name() != key {
            return Err(RegistryError::MalformedEntry {
                name: key,
                reason: format!("replacement is named `{}`", entry.name()),
            });
        }

        slot.store(Arc::new(entry));
        Ok(())
    }

    /// Snapshots of all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Arc<FunctionEntry>> + '_ {
        self.entries.values().map(|slot| slot.load_full())
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Tests whether an entry is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.trim().to_lowercase())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolver used for legacy entries.
    pub fn resolver(&self) -> &DimensionResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Layout, MinimumSource, RefinedMinimum};
    use crate::testing::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(paraboloid_def("Bowl")).unwrap();
        registry.register(paraboloid_def("cup")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("BOWL").unwrap().name(), "bowl");
        assert_eq!(registry.names().collect::<Vec<_>>(), ["bowl", "cup"]);
        assert_eq!(
            registry.lookup("plate").unwrap_err(),
            RegistryError::NotFound("plate".to_string())
        );
    }

    #[test]
    fn duplicate_names_differ_only_in_case() {
        let mut registry = Registry::new();
        registry.register(paraboloid_def("bowl")).unwrap();

        assert_eq!(
            registry.register(paraboloid_def("BOWL")).unwrap_err(),
            RegistryError::DuplicateName("bowl".to_string())
        );
    }

    #[test]
    fn unknown_property_is_rejected() {
        let mut registry = Registry::new();
        let mut def = paraboloid_def("bowl");
        def.record.properties.push("fancy".to_string());

        assert_eq!(
            registry.register(def).unwrap_err(),
            RegistryError::InvalidProperty {
                name: "bowl".to_string(),
                tag: "fancy".to_string()
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn legacy_entry_without_probe_is_missing_dimension() {
        let mut registry = Registry::new();
        let mut def = legacy_def("legacy");
        def.record.minimum.positions = vec![Layout::Explicit(vec![0.0; 5])];

        assert_eq!(
            registry.register(def).unwrap_err(),
            RegistryError::MissingDimension("legacy".to_string())
        );
    }

    #[test]
    fn legacy_entry_is_registered_after_probing() {
        let mut registry = Registry::new();
        registry.register(legacy_def("legacy")).unwrap();
        assert!(registry.contains("legacy"));
    }

    #[test]
    fn load_collects_errors() {
        let mut bad = paraboloid_def("bad");
        bad.record.properties.push("fancy".to_string());

        let (registry, errors) = Registry::load(vec![
            paraboloid_def("bowl"),
            bad,
            paraboloid_def("bowl"),
            paraboloid_def("cup"),
        ]);

        assert_eq!(registry.names().collect::<Vec<_>>(), ["bowl", "cup"]);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn replace_is_visible_to_new_lookups_only() {
        let mut registry = Registry::new();
        registry.register(paraboloid_def("bowl")).unwrap();

        let before = registry.lookup("bowl").unwrap();
        let refined = before.with_refined(RefinedMinimum {
            n: 2,
            positions: vec![vec![0.0, 0.0]],
            value: 0.0,
            extended: None,
        });
        registry.replace("bowl", refined).unwrap();

        let after = registry.lookup("bowl").unwrap();
        assert_eq!(before.minimum(2).unwrap().source, MinimumSource::Literature);
        assert_eq!(after.minimum(2).unwrap().source, MinimumSource::Refined);
    }

    #[test]
    fn replace_requires_existing_matching_name() {
        let mut registry = Registry::new();
        registry.register(paraboloid_def("bowl")).unwrap();
        let cup = build(paraboloid_record("cup"));

        assert!(matches!(
            registry.replace("plate", cup.clone()),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.replace("bowl", cup),
            Err(RegistryError::MalformedEntry { .. })
        ));
    }
}
