//! Store metadata lookup.
//!
//! Answers "which instance hosts store S" and "which instance holds key K of
//! store S" from the current partition assignment. The answer is a pure
//! projection of the cluster view, cached per topology version: the first
//! lookup after a membership change rebuilds the table, later ones reuse it.
//!
//! While a member is suspected the assignment may be about to move; tables
//! built in that window are marked stale and returned anyway.

use super::partitioner::PartitionManager;
use crate::cluster::types::{Instance, InstanceId};
use crate::error::RoutingError;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStoreInfo {
    pub host: String,
    pub port: u16,
    pub store_names: Vec<String>,
}

impl HostStoreInfo {
    pub fn from_instance(instance: &Instance) -> Self {
        Self {
            host: instance.http_addr.ip().to_string(),
            port: instance.http_addr.port(),
            store_names: instance.stores.clone(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct HostEntry {
    pub id: InstanceId,
    pub info: HostStoreInfo,
    pub partitions: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    pub version: u64,
    pub stale: bool,
    pub hosts: Vec<HostEntry>,
}

/// A lookup result together with whether it came from a stale table.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<T> {
    pub value: T,
    pub stale: bool,
}

pub struct MetadataService {
    partitioner: Arc<PartitionManager>,
    table: ArcSwap<RoutingTable>,
}

impl MetadataService {
    pub fn new(partitioner: Arc<PartitionManager>) -> Arc<Self> {
        let table = Self::build(&partitioner);
        Arc::new(Self {
            partitioner,
            table: ArcSwap::from_pointee(table),
        })
    }

    fn build(partitioner: &PartitionManager) -> RoutingTable {
        let view = partitioner.view();
        let version = view.topology_version();
        let stale = !view.is_settled();

        let hosts = partitioner
            .assignment()
            .into_iter()
            .map(|(instance, partitions)| HostEntry {
                id: instance.id.clone(),
                info: HostStoreInfo::from_instance(&instance),
                partitions,
            })
            .collect();

        RoutingTable {
            version,
            stale,
            hosts,
        }
    }

    /// The routing table for the current topology version.
    pub fn refresh(&self) -> Arc<RoutingTable> {
        let cached = self.table.load_full();
        if cached.version == self.partitioner.view().topology_version() {
            return cached;
        }

        let table = Arc::new(Self::build(&self.partitioner));
        tracing::debug!(
            "Routing table rebuilt: version {} -> {}, {} host(s), stale={}",
            cached.version,
            table.version,
            table.hosts.len(),
            table.stale
        );
        self.table.store(table.clone());
        table
    }

    pub fn metadata_for_store(
        &self,
        store_name: &str,
    ) -> Result<Routed<Vec<HostStoreInfo>>, RoutingError> {
        let table = self.refresh();
        let hosts: Vec<HostStoreInfo> = table
            .hosts
            .iter()
            .filter(|h| h.info.store_names.iter().any(|s| s == store_name))
            .map(|h| h.info.clone())
            .collect();

        if hosts.is_empty() {
            return Err(RoutingError::NoLiveInstances(store_name.to_string()));
        }

        Ok(Routed {
            value: hosts,
            stale: table.stale,
        })
    }

    pub fn metadata_for_key(
        &self,
        store_name: &str,
        key: &str,
    ) -> Result<Routed<HostStoreInfo>, RoutingError> {
        let partition = self.partitioner.get_partition(key);
        let table = self.refresh();

        table
            .hosts
            .iter()
            .find(|h| h.partitions.contains(&partition))
            .filter(|h| h.info.store_names.iter().any(|s| s == store_name))
            .map(|h| Routed {
                value: h.info.clone(),
                stale: table.stale,
            })
            .ok_or_else(|| RoutingError::NoLiveInstances(store_name.to_string()))
    }

    /// Owner of `partition` according to the current table, if any.
    pub fn owner_of(&self, partition: u32) -> Option<HostStoreInfo> {
        self.refresh()
            .hosts
            .iter()
            .find(|h| h.partitions.contains(&partition))
            .map(|h| h.info.clone())
    }
}
