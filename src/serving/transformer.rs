use super::model::{ModelRegistry, Scorer};
use super::types::{DataRecord, ModelUpdate, ServingResult};
use crate::error::ServingError;
use crate::store::model_state::{ModelStateStore, SnapshotCell};
use crate::store::partitioned::PartitionedStateStore;
use crate::store::types::ServingStats;

use std::sync::Arc;
use std::time::Instant;

/// Everything a transformer needs to start serving one partition.
#[derive(Clone)]
pub struct PartitionContext {
    pub partition: u32,
    pub store: Arc<dyn PartitionedStateStore<u32, SnapshotCell>>,
    pub models: Arc<ModelRegistry>,
}

/// Per-partition scoring step.
///
/// Every call to [`transform`](Self::transform) first activates a staged
/// model, so a record that arrives after a model update is always scored by
/// that update.
pub struct ScoringTransformer {
    state: ModelStateStore,
    models: Arc<ModelRegistry>,
}

impl ScoringTransformer {
    pub fn open(ctx: PartitionContext) -> Self {
        tracing::info!("Opening scoring transformer for partition {}", ctx.partition);
        Self {
            state: ModelStateStore::open(ctx.partition, ctx.store),
            models: ctx.models,
        }
    }

    pub fn partition(&self) -> u32 {
        self.state.partition()
    }

    pub fn state(&self) -> &ModelStateStore {
        &self.state
    }

    pub fn set_pending_model(&mut self, model: Box<dyn Scorer>, stats: ServingStats) {
        self.state.set_pending_model(model, stats);
    }

    /// Builds a scorer from a model-update event and stages it.
    ///
    /// On failure the slots are left as they were.
    pub fn apply_update(&mut self, update: &ModelUpdate) -> Result<(), ServingError> {
        let model = self.models.build(update)?;
        self.set_pending_model(model, ServingStats::new(&update.name, &update.description));
        tracing::debug!(
            "Partition {}: model '{}' staged",
            self.partition(),
            update.name
        );
        Ok(())
    }

    pub fn transform(
        &mut self,
        key: String,
        record: Option<&DataRecord>,
    ) -> Result<(String, ServingResult), ServingError> {
        if self.state.has_pending() {
            self.state.promote_pending();
        }

        let Some(model) = self.state.current_model_mut() else {
            return Ok((key, ServingResult::NoModel));
        };
        let Some(record) = record else {
            return Err(ServingError::MissingRecord(key));
        };

        let start = Instant::now();
        let score = model.score(record).map_err(ServingError::Scorer)?;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        self.state.record_invocation(duration_ms);

        Ok((key, ServingResult::Scored { score, duration_ms }))
    }

    pub fn close(self) {
        tracing::info!("Closing scoring transformer for partition {}", self.partition());
        self.state.close();
    }
}
