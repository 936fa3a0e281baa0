//! Shared cache of compiled referenced schemas.
//!
//! This module provides the [`SchemaCache`] type that stores every record
//! compiled for a `dto` reference, keyed by the resolved reference path.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::record::Record;

/// Type alias for the cached record map.
type RecordMap = Arc<RwLock<HashMap<PathBuf, Record>>>;

/// A thread-safe, append-only cache of compiled records.
///
/// Entries are never invalidated. Every read hands out a deep copy, so two
/// records obtained for the same reference never share state.
///
/// # Thread Safety
///
/// The cache uses `Arc<RwLock<...>>`:
/// - Concurrent compilations can read the same entry at once
/// - Inserts are serialized, and the first insert for a path wins
///
/// Cloning a `SchemaCache` shares the underlying map.
///
/// # Example
///
/// ```rust
/// use dtobind::{Record, SchemaCache};
/// use std::path::Path;
///
/// let cache = SchemaCache::new();
/// cache.insert("schemas/address.yaml".into(), Record::new("address"));
///
/// let copy = cache.get(Path::new("schemas/address.yaml")).unwrap();
/// assert_eq!(copy.name(), "address");
/// assert!(cache.get(Path::new("schemas/other.yaml")).is_none());
/// ```
#[derive(Clone, Default)]
pub struct SchemaCache {
    records: RecordMap,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by factories that are not given one.
    pub fn global() -> &'static SchemaCache {
        static GLOBAL: OnceLock<SchemaCache> = OnceLock::new();
        GLOBAL.get_or_init(SchemaCache::new)
    }

    /// Returns an independent copy of the cached record for `path`.
    pub fn get(&self, path: &Path) -> Option<Record> {
        self.records
            .read()
            .get(&normalize(path))
            .map(Record::clone_subtree)
    }

    /// Stores `record` unless `path` is already cached, and returns a copy
    /// of whichever record the cache now holds.
    pub fn insert(&self, path: PathBuf, record: Record) -> Record {
        let mut records = self.records.write();
        records
            .entry(normalize(&path))
            .or_insert(record)
            .clone_subtree()
    }

    /// Returns true if `path` has been compiled.
    pub fn contains(&self, path: &Path) -> bool {
        self.records.read().contains_key(&normalize(path))
    }

    /// Returns the number of cached records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// Folds `.` and `dir/..` components lexically, without touching the
/// filesystem. Leading `..` components are kept.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("len", &self.len())
            .finish()
    }
}
