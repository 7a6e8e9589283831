use super::model_state::SnapshotCell;
use super::partitioned::{LocalStateStore, PartitionedStateStore};
use super::types::{MODEL_STATE_KEY, ServingStats};
use crate::error::RoutingError;

use dashmap::DashMap;
use std::sync::Arc;

pub type ModelStore = LocalStateStore<u32, SnapshotCell>;

/// Named model stores hosted by this process.
///
/// Handles are passed explicitly to partition workers and to the query layer;
/// nothing looks a store up through ambient state.
#[derive(Default)]
pub struct StoreRegistry {
    stores: DashMap<String, Arc<ModelStore>>,
}

impl StoreRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the store registered under `name`, creating it on first use.
    pub fn register(&self, name: &str) -> Arc<ModelStore> {
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(LocalStateStore::new(name)))
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelStore>> {
        self.stores.get(name).map(|entry| entry.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Stats of the most recently promoted model across the local partitions
    /// of `name`.
    ///
    /// `Ok(None)` means the store is live here but no model has been promoted
    /// yet. A store that is unknown, or has no partition open on this
    /// instance, is `StoreUnavailable`.
    pub fn local_stats(&self, name: &str) -> Result<Option<ServingStats>, RoutingError> {
        let store = self
            .get(name)
            .ok_or_else(|| RoutingError::StoreUnavailable(name.to_string()))?;

        let partitions = store.partitions();
        if partitions.is_empty() {
            return Err(RoutingError::StoreUnavailable(name.to_string()));
        }

        let latest = partitions
            .into_iter()
            .filter_map(|p| store.get(p, &MODEL_STATE_KEY))
            .filter_map(|cell| cell.load().current.clone())
            .max_by_key(|stats| stats.since);

        Ok(latest)
    }
}
