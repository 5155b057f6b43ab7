use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use tracing::info;

use crate::cf;
use crate::error::StoreError;
use crate::index::{CaptureFilter, Index};

/// Owns the RocksDB handle and every column family derived from it.
/// Per-collection [`Index`]es hold a non-owning `Arc` onto the same
/// handle, so they cannot outlive a `DataStore` that has gone away.
pub struct DataStore {
    db: Arc<DB>,
    #[allow(dead_code)]
    path: PathBuf,
    collections: RwLock<HashSet<String>>,
    capture_filter: Option<Arc<CaptureFilter>>,
}

impl DataStore {
    /// Opens (creating if absent) a directory containing one RocksDB
    /// database. Enumerates existing collections on startup from the
    /// column-family list. `capture_filter`, if given, is applied to every
    /// query result of every index for the lifetime of this `DataStore`
    /// (see the distilled spec's §4.6).
    pub fn open(path: impl AsRef<Path>, capture_filter: Option<Arc<CaptureFilter>>) -> Result<DataStore, StoreError> {
        let path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut existing_cfs = DB::list_cf(&opts, &path).unwrap_or_else(|_| vec!["default".to_owned()]);
        if !existing_cfs.iter().any(|n| n == "default") {
            existing_cfs.push("default".to_owned());
        }

        let descriptors: Vec<ColumnFamilyDescriptor> = existing_cfs
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, descriptors)?;
        let collections: HashSet<String> = cf::collection_names(&existing_cfs).into_iter().collect();

        info!(collections = collections.len(), path = %path.display(), "opened data store");

        Ok(DataStore {
            db: Arc::new(db),
            path,
            collections: RwLock::new(collections),
            capture_filter,
        })
    }

    /// Returns the named collection's index, creating its four column
    /// families (captures, aliases, access rules, access policies) if
    /// `create_if_missing` is set and the collection doesn't yet exist.
    /// Returns `Ok(None)` for an unknown collection when
    /// `create_if_missing` is false.
    pub fn get_index(&self, name: &str, create_if_missing: bool) -> Result<Option<Index>, StoreError> {
        let exists = self.collections.read().unwrap().contains(name);
        if !exists {
            if !create_if_missing {
                return Ok(None);
            }
            self.create_collection(name)?;
        }

        Ok(Some(Index::new(
            Arc::clone(&self.db),
            name.to_owned(),
            self.capture_filter.clone(),
        )))
    }

    fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let opts = Options::default();
        for cf_name in [
            cf::captures_cf(name),
            cf::alias_cf(name),
            cf::access_rules_cf(name),
            cf::access_policies_cf(name),
        ] {
            self.db.create_cf(&cf_name, &opts)?;
        }
        self.collections.write().unwrap().insert(name.to_owned());
        info!(collection = name, "created collection");
        Ok(())
    }

    /// The raw RocksDB handle, for components (like `cdx-access`) that
    /// manage their own column families within the same database.
    pub fn raw_db(&self) -> Arc<DB> {
        Arc::clone(&self.db)
    }

    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().unwrap().iter().cloned().collect();
        names.sort();
        names
    }

    /// Releases all handles. Rust's ownership model makes "called exactly
    /// once" a compile-time property: `self` is consumed, so there is no
    /// later call to no-op.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_collection_without_create_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        assert!(store.get_index("missing", false).unwrap().is_none());
    }

    #[test]
    fn collections_are_created_lazily_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        assert!(store.list_collections().is_empty());

        store.get_index("alpha", true).unwrap();
        store.get_index("beta", true).unwrap();

        assert_eq!(store.list_collections(), vec!["alpha".to_owned(), "beta".to_owned()]);
    }

    #[test]
    fn collections_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DataStore::open(dir.path(), None).unwrap();
            store.get_index("alpha", true).unwrap();
            store.close();
        }
        let store = DataStore::open(dir.path(), None).unwrap();
        assert_eq!(store.list_collections(), vec!["alpha".to_owned()]);
    }
}
