//! The cluster view consumed by routing.
//!
//! Routing never talks to the gossip layer directly; it only needs the set of
//! live instances and a version number that changes whenever that set (or the
//! health of a member) changes. Anything that can answer these questions can
//! drive partition assignment: the gossip [`MembershipService`] in production,
//! [`StaticClusterView`] for single-node runs and tests.
//!
//! [`MembershipService`]: super::service::MembershipService

use super::types::{Instance, InstanceId, InstanceState};

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait ClusterView: Send + Sync {
    /// Identity of the instance this process runs as.
    fn local_id(&self) -> InstanceId;

    /// Every member currently considered alive, the local one included.
    fn live_instances(&self) -> Vec<Instance>;

    /// Bumped on every membership or health change.
    fn topology_version(&self) -> u64;

    /// `false` while some member is suspected, i.e. a rebalance may be underway.
    fn is_settled(&self) -> bool;
}

/// A fixed, manually driven view.
///
/// Reassignment is simulated by calling [`StaticClusterView::set_instances`],
/// which bumps the topology version exactly like a gossip update would.
pub struct StaticClusterView {
    local: InstanceId,
    instances: RwLock<Vec<Instance>>,
    version: AtomicU64,
    settled: RwLock<bool>,
}

impl StaticClusterView {
    pub fn new(local: InstanceId, instances: Vec<Instance>) -> Self {
        Self {
            local,
            instances: RwLock::new(instances),
            version: AtomicU64::new(1),
            settled: RwLock::new(true),
        }
    }

    /// A view holding only the given instance.
    pub fn single(instance: Instance) -> Self {
        Self::new(instance.id.clone(), vec![instance])
    }

    pub fn set_instances(&self, instances: Vec<Instance>) {
        if let Ok(mut guard) = self.instances.write() {
            *guard = instances;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_settled(&self, settled: bool) {
        if let Ok(mut guard) = self.settled.write() {
            *guard = settled;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl ClusterView for StaticClusterView {
    fn local_id(&self) -> InstanceId {
        self.local.clone()
    }

    fn live_instances(&self) -> Vec<Instance> {
        self.instances
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|i| i.state == InstanceState::Alive)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn topology_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn is_settled(&self) -> bool {
        self.settled.read().map(|g| *g).unwrap_or(false)
    }
}
