//! Per-partition model slots and their publication to readers.
//!
//! A `ModelStateStore` is owned by exactly one partition worker. It keeps the
//! models themselves private and, after every mutation, publishes an immutable
//! [`SlotSnapshot`] by swapping a single pointer in an `ArcSwap` cell. Readers
//! (the query endpoint) load that pointer and therefore observe either the
//! state before a mutation or after it, never a mix, and never wait on the
//! writer.

use super::partitioned::PartitionedStateStore;
use super::types::{MODEL_STATE_KEY, ServingStats, SlotSnapshot, now_ms};
use crate::serving::model::Scorer;

use arc_swap::ArcSwap;
use std::sync::Arc;

pub type SnapshotCell = Arc<ArcSwap<SlotSnapshot>>;

/// A model together with its stats. Keeping them in one value makes a
/// half-filled slot unrepresentable.
struct Slot {
    model: Box<dyn Scorer>,
    stats: ServingStats,
}

pub struct ModelStateStore {
    partition: u32,
    current: Option<Slot>,
    pending: Option<Slot>,
    generation: u64,
    cell: SnapshotCell,
    backing: Arc<dyn PartitionedStateStore<u32, SnapshotCell>>,
}

impl ModelStateStore {
    /// Creates empty slots for `partition` and registers their cell in `backing`.
    pub fn open(partition: u32, backing: Arc<dyn PartitionedStateStore<u32, SnapshotCell>>) -> Self {
        let cell: SnapshotCell = Arc::new(ArcSwap::from_pointee(SlotSnapshot::default()));
        backing.put(partition, MODEL_STATE_KEY, cell.clone());

        tracing::debug!("Opened model state for partition {}", partition);

        Self {
            partition,
            current: None,
            pending: None,
            generation: 0,
            cell,
            backing,
        }
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Stages a model for activation. Last write wins: a previously staged
    /// model that never became current is dropped without `cleanup()`.
    pub fn set_pending_model(&mut self, model: Box<dyn Scorer>, stats: ServingStats) {
        let name = stats.name.clone();
        if let Some(discarded) = self.pending.replace(Slot { model, stats }) {
            tracing::debug!(
                "Partition {}: pending model '{}' replaced by '{}' before promotion",
                self.partition,
                discarded.stats.name,
                name
            );
        }
        self.publish();
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_model(&self) -> bool {
        self.current.is_some()
    }

    /// Moves the pending model into the current slot.
    ///
    /// The displaced model is cleaned up before the new one is published. A
    /// failing cleanup is logged and does not stop the promotion. Returns
    /// `false` when nothing was pending.
    pub fn promote_pending(&mut self) -> bool {
        let Some(next) = self.pending.take() else {
            return false;
        };

        if let Some(mut old) = self.current.take() {
            if let Err(e) = old.model.cleanup() {
                tracing::warn!(
                    "Partition {}: cleanup of model '{}' failed: {}",
                    self.partition,
                    old.stats.name,
                    e
                );
            }
        }

        let stats = next.stats.activated(now_ms());
        tracing::info!(
            "Partition {}: model '{}' is now active",
            self.partition,
            stats.name
        );
        self.current = Some(Slot {
            model: next.model,
            stats,
        });
        self.publish();
        true
    }

    pub fn current_model_mut(&mut self) -> Option<&mut (dyn Scorer + 'static)> {
        self.current.as_mut().map(|slot| slot.model.as_mut())
    }

    pub fn current_stats(&self) -> Option<&ServingStats> {
        self.current.as_ref().map(|slot| &slot.stats)
    }

    /// Accounts one successful score against the current model.
    pub fn record_invocation(&mut self, duration_ms: f64) {
        if let Some(slot) = self.current.as_mut() {
            slot.stats.update(duration_ms);
            self.publish();
        }
    }

    pub fn snapshot(&self) -> Arc<SlotSnapshot> {
        self.cell.load_full()
    }

    /// A read handle sharing this store's published state.
    pub fn reader(&self) -> SnapshotCell {
        self.cell.clone()
    }

    /// Tears the slots down: cleans up the resident current model and
    /// unregisters the partition from the backing store. Dropping the store
    /// has the same effect.
    pub fn close(self) {
        tracing::debug!("Closing model state for partition {}", self.partition);
    }

    fn teardown(&mut self) {
        self.pending = None;
        if let Some(mut slot) = self.current.take() {
            if let Err(e) = slot.model.cleanup() {
                tracing::warn!(
                    "Partition {}: cleanup of model '{}' on close failed: {}",
                    self.partition,
                    slot.stats.name,
                    e
                );
            }
            self.publish();
        }
        // A newer store may already have taken over this partition.
        let registered = self.backing.get(self.partition, &MODEL_STATE_KEY);
        if registered.is_some_and(|cell| Arc::ptr_eq(&cell, &self.cell)) {
            self.backing.remove(self.partition, &MODEL_STATE_KEY);
        }
    }

    fn publish(&mut self) {
        self.generation += 1;
        self.cell.store(Arc::new(SlotSnapshot {
            current: self.current.as_ref().map(|s| s.stats.clone()),
            pending: self.pending.as_ref().map(|s| s.stats.clone()),
            generation: self.generation,
        }));
    }
}

impl Drop for ModelStateStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
