//! Local serving pipeline.
//!
//! Keeps one `PartitionWorker` per partition this instance owns and feeds it
//! the records and model updates routed here. Workers follow the partition
//! assignment: when the topology changes, newly owned partitions are opened
//! (and handed the latest model update) and revoked ones are closed.

use super::model::ModelRegistry;
use super::transformer::PartitionContext;
use super::types::{DataRecord, ModelUpdate, PartitionEvent, ScoredRecord};
use super::worker::PartitionWorker;
use crate::error::{RoutingError, ServingError};
use crate::routing::metadata::MetadataService;
use crate::routing::partitioner::PartitionManager;
use crate::store::model_state::SnapshotCell;
use crate::store::registry::ModelStore;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub struct ServingPipeline {
    partitioner: Arc<PartitionManager>,
    metadata: Arc<MetadataService>,
    store: Arc<ModelStore>,
    models: Arc<ModelRegistry>,
    workers: DashMap<u32, PartitionWorker>,
    latest_model: ArcSwapOption<ModelUpdate>,
    output: mpsc::UnboundedSender<ScoredRecord>,
    capacity: usize,
    applied_version: AtomicU64,
    rebalance_lock: Mutex<()>,
}

impl ServingPipeline {
    pub fn new(
        partitioner: Arc<PartitionManager>,
        metadata: Arc<MetadataService>,
        store: Arc<ModelStore>,
        models: Arc<ModelRegistry>,
        output: mpsc::UnboundedSender<ScoredRecord>,
    ) -> Arc<Self> {
        Self::with_capacity(
            partitioner,
            metadata,
            store,
            models,
            output,
            DEFAULT_CHANNEL_CAPACITY,
        )
    }

    pub fn with_capacity(
        partitioner: Arc<PartitionManager>,
        metadata: Arc<MetadataService>,
        store: Arc<ModelStore>,
        models: Arc<ModelRegistry>,
        output: mpsc::UnboundedSender<ScoredRecord>,
        capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            partitioner,
            metadata,
            store,
            models,
            workers: DashMap::new(),
            latest_model: ArcSwapOption::empty(),
            output,
            capacity,
            applied_version: AtomicU64::new(0),
            rebalance_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Partitions with a running worker, ascending.
    pub fn local_partitions(&self) -> Vec<u32> {
        let mut partitions: Vec<u32> = self.workers.iter().map(|w| *w.key()).collect();
        partitions.sort_unstable();
        partitions
    }

    pub fn reader(&self, partition: u32) -> Option<SnapshotCell> {
        self.workers.get(&partition).map(|w| w.reader())
    }

    pub fn latest_model(&self) -> Option<Arc<ModelUpdate>> {
        self.latest_model.load_full()
    }

    /// Brings the local workers in line with the current assignment.
    ///
    /// Returns the partitions that were opened and the ones that were closed.
    pub async fn rebalance(&self) -> (Vec<u32>, Vec<u32>) {
        let _guard = self.rebalance_lock.lock().await;

        let version = self.partitioner.view().topology_version();
        let wanted: BTreeSet<u32> = self.partitioner.my_partitions().into_iter().collect();

        let revoked: Vec<u32> = self
            .local_partitions()
            .into_iter()
            .filter(|p| !wanted.contains(p))
            .collect();

        for partition in &revoked {
            if let Some((_, worker)) = self.workers.remove(partition) {
                worker.stop().await;
            }
        }

        // Workers whose thread died are reopened below.
        for partition in self.dead_partitions() {
            if let Some((_, worker)) = self.workers.remove(&partition) {
                tracing::warn!("Worker for partition {} exited; reopening", partition);
                worker.stop().await;
            }
        }

        let latest = self.latest_model.load_full();
        let mut opened = Vec::new();
        for partition in wanted {
            if self.workers.contains_key(&partition) {
                continue;
            }

            let worker = PartitionWorker::spawn(
                PartitionContext {
                    partition,
                    store: self.store.clone(),
                    models: self.models.clone(),
                },
                self.output.clone(),
                self.capacity,
            );

            if let Some(update) = &latest {
                let replay = PartitionEvent::Model(update.as_ref().clone());
                if worker.sender().send(replay).await.is_err() {
                    tracing::warn!("Partition {}: could not replay latest model", partition);
                }
            }

            self.workers.insert(partition, worker);
            opened.push(partition);
        }

        self.applied_version.store(version, Ordering::SeqCst);

        if !opened.is_empty() || !revoked.is_empty() {
            tracing::info!(
                "Rebalanced at topology version {}: opened {:?}, closed {:?}",
                version,
                opened,
                revoked
            );
        }

        (opened, revoked)
    }

    /// Routes a record to the worker of its partition.
    ///
    /// Keys whose partition is not processed here fail with `NotLocal`. The
    /// owner is filled in only when another instance is known to hold it.
    pub async fn submit_record(
        &self,
        key: String,
        record: Option<DataRecord>,
    ) -> Result<u32, RoutingError> {
        let partition = self.partitioner.get_partition(&key);

        let Some(tx) = self.workers.get(&partition).map(|w| w.sender()) else {
            return Err(self.not_local(partition));
        };

        tx.send(PartitionEvent::Record { key, record })
            .await
            .map_err(|_| RoutingError::NotLocal {
                partition,
                owner: None,
            })?;

        Ok(partition)
    }

    /// Remembers `update` and broadcasts it to every local partition.
    ///
    /// Each partition builds its own scorer from the update. Returns how many
    /// partitions were notified.
    pub async fn submit_model(&self, update: ModelUpdate) -> Result<usize, ServingError> {
        if !self.models.has_type(&update.model_type) {
            return Err(ServingError::UnknownModelType(update.model_type));
        }

        // Serialized with rebalance: a worker opened concurrently gets this
        // update either as its replay or through the broadcast below.
        let _guard = self.rebalance_lock.lock().await;

        tracing::info!(
            "Model update '{}' ({}) received",
            update.name,
            update.model_type
        );
        self.latest_model.store(Some(Arc::new(update.clone())));

        let senders: Vec<(u32, mpsc::Sender<PartitionEvent>)> = self
            .workers
            .iter()
            .map(|w| (*w.key(), w.sender()))
            .collect();

        let mut notified = 0;
        for (partition, tx) in senders {
            match tx.send(PartitionEvent::Model(update.clone())).await {
                Ok(()) => notified += 1,
                Err(_) => tracing::warn!("Partition {} closed before model update", partition),
            }
        }

        Ok(notified)
    }

    /// Stops every worker. Queued events are discarded.
    pub async fn shutdown(&self) {
        let _guard = self.rebalance_lock.lock().await;

        let partitions = self.local_partitions();
        tracing::info!("Shutting down {} partition worker(s)", partitions.len());

        for partition in partitions {
            if let Some((_, worker)) = self.workers.remove(&partition) {
                worker.stop().await;
            }
        }
    }

    /// Rebalances whenever the topology version moves.
    pub async fn watch_topology(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;

            let current = self.partitioner.view().topology_version();
            if current != self.applied_version.load(Ordering::SeqCst) {
                tracing::debug!("Topology version changed to {}", current);
                self.rebalance().await;
            } else if !self.dead_partitions().is_empty() {
                self.rebalance().await;
            }
        }
    }

    fn dead_partitions(&self) -> Vec<u32> {
        self.workers
            .iter()
            .filter(|w| w.is_finished())
            .map(|w| *w.key())
            .collect()
    }

    fn not_local(&self, partition: u32) -> RoutingError {
        let local = self.partitioner.view().local_id();
        let owner = match self.partitioner.get_owner(partition) {
            Some(instance) if instance.id != local => self.metadata.owner_of(partition),
            _ => None,
        };

        RoutingError::NotLocal { partition, owner }
    }
}
