use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cdx_access::AccessStore;
use cdx_store::{access_policies_cf, access_rules_cf, DataStore, Index};

use crate::error::AppError;
use crate::oracle::OracleClient;

/// Shared application state: the data store and a lazily-populated cache of
/// per-collection access stores (each owns its own in-memory rule trie, so
/// we keep one live instance per collection rather than reopening on every
/// request).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DataStore>,
    pub oracle: Option<Arc<OracleClient>>,
    access_stores: Arc<RwLock<HashMap<String, AccessStore>>>,
}

impl AppState {
    pub fn new(store: Arc<DataStore>, oracle: Option<Arc<OracleClient>>) -> AppState {
        AppState {
            store,
            oracle,
            access_stores: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn index(&self, collection: &str, create_if_missing: bool) -> Result<Index, AppError> {
        self.store
            .get_index(collection, create_if_missing)?
            .ok_or_else(|| AppError::UnknownCollection(collection.to_owned()))
    }

    pub fn access_store(&self, collection: &str, create_if_missing: bool) -> Result<AccessStore, AppError> {
        if let Some(existing) = self.access_stores.read().unwrap().get(collection) {
            return Ok(existing.clone());
        }

        // Opening the index first guarantees the collection's column
        // families (including the two access ones) exist.
        self.index(collection, create_if_missing)?;

        let access = AccessStore::open(
            self.store.raw_db(),
            access_rules_cf(collection),
            access_policies_cf(collection),
        )?;
        self.access_stores.write().unwrap().insert(collection.to_owned(), access.clone());
        Ok(access)
    }
}
