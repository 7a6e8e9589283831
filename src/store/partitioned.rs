use dashmap::DashMap;
use std::hash::Hash;

/// A key-value store sharded by partition id.
///
/// This is the only thing the serving core asks of the storage substrate:
/// per-partition get/put/remove plus a way to walk a partition and to list
/// which partitions are held locally.
pub trait PartitionedStateStore<K, V>: Send + Sync {
    fn get(&self, partition: u32, key: &K) -> Option<V>;
    fn put(&self, partition: u32, key: K, value: V);
    fn remove(&self, partition: u32, key: &K) -> Option<V>;
    fn iterate(&self, partition: u32) -> Vec<(K, V)>;
    fn partitions(&self) -> Vec<u32>;
}

/// In-process implementation backed by nested `DashMap`s.
pub struct LocalStateStore<K, V> {
    name: String,
    local_data: DashMap<u32, DashMap<K, V>>,
}

impl<K, V> LocalStateStore<K, V>
where
    K: Clone + Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            local_data: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

}

impl<K, V> PartitionedStateStore<K, V> for LocalStateStore<K, V>
where
    K: Clone + Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, partition: u32, key: &K) -> Option<V> {
        self.local_data
            .get(&partition)
            .and_then(|partition_map| partition_map.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, partition: u32, key: K, value: V) {
        let partition_map = self.local_data.entry(partition).or_default();
        partition_map.insert(key, value);
    }

    fn remove(&self, partition: u32, key: &K) -> Option<V> {
        let removed = self
            .local_data
            .get(&partition)
            .and_then(|partition_map| partition_map.remove(key).map(|(_, v)| v));

        // The inner guard is released above; only now is it safe to touch the outer map.
        self.local_data.remove_if(&partition, |_, map| map.is_empty());
        removed
    }

    fn iterate(&self, partition: u32) -> Vec<(K, V)> {
        let mut entries = Vec::new();
        if let Some(partition_map) = self.local_data.get(&partition) {
            for entry in partition_map.iter() {
                entries.push((entry.key().clone(), entry.value().clone()));
            }
        }
        entries
    }

    fn partitions(&self) -> Vec<u32> {
        let mut partitions: Vec<u32> = self.local_data.iter().map(|e| *e.key()).collect();
        partitions.sort_unstable();
        partitions
    }
}
