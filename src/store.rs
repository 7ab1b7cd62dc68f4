//! On-disk catalog store.
//!
//! Every entry is persisted as a self-contained TOML file named after the
//! lowercase entry name (`<name>.toml`) in a catalog directory. The formula is
//! code and is not part of the file; stored records are attached to the
//! formulas of the built-in catalog by [`CatalogStore::overlay`].
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a reader never sees a partially written record. A
//! refinement write deserializes the record, replaces the `refined` table and
//! serializes the record back; the rest of the record is preserved.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::core::{FunctionEntry, RefinedMinimum};
use crate::record::{EntryDef, EntryRecord};

/// Error of the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a file failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path of the file or directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A file is not a valid record.
    #[error("{}: {source}", path.display())]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// A record cannot be serialized.
    #[error("entry `{name}` cannot be serialized: {source}")]
    Serialize {
        /// Entry name.
        name: String,
        /// Underlying error.
        #[source]
        source: toml::ser::Error,
    },
    /// The record name does not match its file name.
    #[error("{} holds entry `{found}`", path.display())]
    NameMismatch {
        /// Path of the file.
        path: PathBuf,
        /// Name found in the record.
        found: String,
    },
    /// No record of the given name.
    #[error("no stored record `{0}`")]
    NotFound(String),
}

/// Directory of TOML entry records.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    dir: PathBuf,
}

impl CatalogStore {
    /// Opens the store in the directory, creating it if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record of the given entry.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.toml", name.trim().to_lowercase()))
    }

    /// Loads the record of the given entry.
    pub fn load(&self, name: &str) -> Result<EntryRecord, StoreError> {
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        read_record(&path)
    }

    /// Loads all records of the store, ordered by file name.
    pub fn load_all(&self) -> Result<Vec<EntryRecord>, StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut paths = Vec::new();
        for item in fs::read_dir(&self.dir).map_err(io_error)? {
            let path = item.map_err(io_error)?.path();
            if path.extension().map_or(false, |ext| ext == "toml") && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|path| read_record(path)).collect()
    }

    /// Saves the record, replacing a previous version. Returns the path of the
    /// written file.
    pub fn save(&self, record: &EntryRecord) -> Result<PathBuf, StoreError> {
        let content =
            toml::to_string_pretty(record).map_err(|source| StoreError::Serialize {
                name: record.name.clone(),
                source,
            })?;

        let path = self.path_of(&record.name);
        let tmp = path.with_extension("toml.tmp");

        fs::write(&tmp, content)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|source| {
                let _ = fs::remove_file(&tmp);
                StoreError::Io {
                    path: path.clone(),
                    source,
                }
            })?;

        debug!("saved {}", path.display());
        Ok(path)
    }

    /// Replaces the refined minimum in the stored record of the entry.
    pub fn replace_refined(&self, name: &str, refined: &RefinedMinimum) -> Result<(), StoreError> {
        let mut record = self.load(name)?;
        record.refined = Some(refined.clone());
        self.save(&record)?;
        Ok(())
    }

    /// Saves records of all given entries. Returns the number of written
    /// files.
    pub fn export<'a, I>(&self, entries: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a FunctionEntry>,
    {
        let mut count = 0;
        for entry in entries {
            self.save(&entry.to_record())?;
            count += 1;
        }
        Ok(count)
    }

    /// Replaces the records of the definitions with stored records of the
    /// same name.
    ///
    /// Definitions without a stored record are kept as they are. Stored
    /// records without a matching definition have no formula and are ignored
    /// with a warning.
    pub fn overlay(&self, mut defs: Vec<EntryDef>) -> Result<Vec<EntryDef>, StoreError> {
        for record in self.load_all()? {
            let name = record.name.trim().to_lowercase();
            match defs
                .iter_mut()
                .find(|def| def.name().trim().to_lowercase() == name)
            {
                Some(def) => def.record = record,
                None => warn!("stored record `{}` has no formula, ignored", name),
            }
        }
        Ok(defs)
    }
}

fn read_record(path: &Path) -> Result<EntryRecord, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let record: EntryRecord = toml::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let expected = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    if record.name.trim().to_lowercase() != expected {
        return Err(StoreError::NameMismatch {
            path: path.to_path_buf(),
            found: record.name,
        });
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        let record = paraboloid_record("bowl");
        let path = store.save(&record).unwrap();

        assert_eq!(path, dir.path().join("bowl.toml"));
        assert_eq!(store.load("BOWL").unwrap(), record);
        assert!(!dir.path().join("bowl.toml.tmp").exists());
    }

    #[test]
    fn missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        assert!(matches!(store.load("bowl"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn refined_write_preserves_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        let record = paraboloid_record("bowl").with_reference("Folklore");
        store.save(&record).unwrap();

        let refined = RefinedMinimum {
            n: 2,
            value: 0.0,
            extended: Some("0.0e0".to_string()),
            positions: vec![vec![0.0, 0.0]],
        };
        store.replace_refined("bowl", &refined).unwrap();

        let loaded = store.load("bowl").unwrap();
        assert_eq!(loaded.refined, Some(refined));
        assert_eq!(loaded.reference, "Folklore");
        assert_eq!(loaded.minimum, record.minimum);
    }

    #[test]
    fn name_must_match_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        let content = toml::to_string_pretty(&paraboloid_record("cup")).unwrap();
        fs::write(dir.path().join("bowl.toml"), content).unwrap();

        assert!(matches!(
            store.load("bowl"),
            Err(StoreError::NameMismatch { found, .. }) if found == "cup"
        ));
    }

    #[test]
    fn overlay_replaces_matching_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        store
            .save(&paraboloid_record("bowl").with_reference("Stored"))
            .unwrap();
        store.save(&paraboloid_record("orphan")).unwrap();

        let defs = store
            .overlay(vec![paraboloid_def("bowl"), paraboloid_def("cup")])
            .unwrap();

        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].record.reference, "Stored");
        assert_eq!(defs[1].record.reference, "");
    }

    #[test]
    fn export_writes_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();

        let entries = vec![build(paraboloid_record("bowl")), build(paraboloid_record("cup"))];
        assert_eq!(store.export(&entries).unwrap(), 2);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }
}
