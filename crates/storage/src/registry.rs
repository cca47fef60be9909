//! Process-wide store registry.
//!
//! At most one `Store` instance exists per id; concurrent resolves of the
//! same id return the same `Arc`. Mode and crypt key only apply when the
//! id is first opened — later resolves of an already-open id ignore them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use mapkv_core::{AccessMode, Result, StoreId};

use crate::store::Store;

/// Registry of open stores, keyed by id.
pub struct StoreRegistry {
    root: PathBuf,
    instances: Mutex<HashMap<StoreId, Arc<Store>>>,
}

impl StoreRegistry {
    /// Create a registry rooted at `root`. The directory is created
    /// lazily by the first store open.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "store registry created");
        StoreRegistry {
            root,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory holding all region files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the open store for `id`, opening it if necessary.
    ///
    /// `mode` and `crypt_key` take effect only on the first open of an
    /// id; a store that is already open is returned as-is. A store that
    /// was closed is reopened from its persisted region.
    pub fn resolve(
        &self,
        id: StoreId,
        mode: AccessMode,
        crypt_key: Option<&str>,
    ) -> Result<Arc<Store>> {
        // Check-then-insert under one lock so racing resolves of the
        // same id cannot open two instances.
        let mut instances = self.instances.lock();
        if let Some(store) = instances.get(&id) {
            if store.is_open() {
                return Ok(Arc::clone(store));
            }
            instances.remove(&id);
        }

        let store = Arc::new(Store::open(id.clone(), &self.root, mode, crypt_key)?);
        instances.insert(id, Arc::clone(&store));
        Ok(store)
    }

    /// Look up an already-open store without opening one.
    pub fn get(&self, id: &StoreId) -> Option<Arc<Store>> {
        let instances = self.instances.lock();
        instances.get(id).filter(|s| s.is_open()).map(Arc::clone)
    }

    /// Close the store for `id` and drop it from the registry. Unknown
    /// ids are a no-op.
    pub fn close(&self, id: &StoreId) -> Result<()> {
        let store = self.instances.lock().remove(id);
        if let Some(store) = store {
            store.close()?;
        }
        Ok(())
    }

    /// Close every open store. Called at shutdown.
    pub fn close_all(&self) -> Result<()> {
        let stores: Vec<Arc<Store>> = self.instances.lock().drain().map(|(_, s)| s).collect();
        for store in stores {
            store.close()?;
        }
        info!("all stores closed");
        Ok(())
    }

    /// Number of stores currently tracked by the registry.
    pub fn open_count(&self) -> usize {
        self.instances.lock().len()
    }
}
