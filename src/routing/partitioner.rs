use crate::cluster::types::{Instance, InstanceId};
use crate::cluster::view::ClusterView;

use std::sync::Arc;

/// Maps keys to partitions and partitions to live instances.
///
/// Partition `p` belongs to the `p mod n`-th live instance, instances ordered
/// by id, so every instance derives the same assignment from the same view.
pub struct PartitionManager {
    num_partitions: u32,
    view: Arc<dyn ClusterView>,
}

impl PartitionManager {
    pub fn new(view: Arc<dyn ClusterView>, num_partitions: u32) -> Arc<Self> {
        Arc::new(Self {
            num_partitions: num_partitions.max(1),
            view,
        })
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    pub fn view(&self) -> &Arc<dyn ClusterView> {
        &self.view
    }

    /// CRC-32 of the key bytes, so every instance and build agrees.
    pub fn get_partition(&self, key: &str) -> u32 {
        crc32fast::hash(key.as_bytes()) % self.num_partitions
    }

    fn ordered_instances(&self) -> Vec<Instance> {
        let mut instances = self.view.live_instances();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        instances
    }

    pub fn get_owner(&self, partition: u32) -> Option<Instance> {
        let instances = self.ordered_instances();
        if instances.is_empty() {
            return None;
        }
        let idx = (partition as usize) % instances.len();
        instances.into_iter().nth(idx)
    }

    /// Every live instance with the partitions it owns. Instances that own
    /// nothing (more instances than partitions) are left out.
    pub fn assignment(&self) -> Vec<(Instance, Vec<u32>)> {
        let instances = self.ordered_instances();
        if instances.is_empty() {
            return vec![];
        }

        let mut owned: Vec<Vec<u32>> = vec![Vec::new(); instances.len()];
        for partition in 0..self.num_partitions {
            owned[(partition as usize) % instances.len()].push(partition);
        }

        instances
            .into_iter()
            .zip(owned)
            .filter(|(_, partitions)| !partitions.is_empty())
            .collect()
    }

    pub fn partitions_of(&self, id: &InstanceId) -> Vec<u32> {
        self.assignment()
            .into_iter()
            .find(|(instance, _)| &instance.id == id)
            .map(|(_, partitions)| partitions)
            .unwrap_or_default()
    }

    pub fn my_partitions(&self) -> Vec<u32> {
        self.partitions_of(&self.view.local_id())
    }
}
