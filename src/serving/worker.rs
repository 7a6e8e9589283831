//! Partition Worker
//!
//! One worker per partition, running on its own blocking thread. It is the
//! only writer of that partition's model state and consumes the partition's
//! events strictly in arrival order. A slow scorer stalls its own partition
//! and nothing else.

use super::transformer::{PartitionContext, ScoringTransformer};
use super::types::{Outcome, PartitionEvent, ScoredRecord};
use crate::store::model_state::SnapshotCell;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct PartitionWorker {
    partition: u32,
    tx: mpsc::Sender<PartitionEvent>,
    stop: Arc<AtomicBool>,
    reader: SnapshotCell,
    handle: JoinHandle<()>,
}

impl PartitionWorker {
    pub fn spawn(
        ctx: PartitionContext,
        output: mpsc::UnboundedSender<ScoredRecord>,
        capacity: usize,
    ) -> Self {
        let partition = ctx.partition;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));

        let transformer = ScoringTransformer::open(ctx);
        let reader = transformer.state().reader();

        let handle = {
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || run(transformer, rx, stop, output))
        };

        Self {
            partition,
            tx,
            stop,
            reader,
            handle,
        }
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn sender(&self) -> mpsc::Sender<PartitionEvent> {
        self.tx.clone()
    }

    /// `true` once the worker thread has exited, e.g. after a scorer panic.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Published state of this partition's model slots.
    pub fn reader(&self) -> SnapshotCell {
        self.reader.clone()
    }

    /// Finishes the record in progress, discards anything still queued, and
    /// cleans up the active model.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.join().await;
    }

    async fn join(self) {
        let PartitionWorker {
            partition,
            tx,
            handle,
            ..
        } = self;
        drop(tx);
        if let Err(e) = handle.await {
            tracing::error!("Worker for partition {} terminated abnormally: {}", partition, e);
        }
    }
}

fn run(
    mut transformer: ScoringTransformer,
    mut rx: mpsc::Receiver<PartitionEvent>,
    stop: Arc<AtomicBool>,
    output: mpsc::UnboundedSender<ScoredRecord>,
) {
    let partition = transformer.partition();
    tracing::debug!("Worker for partition {} started", partition);

    while let Some(event) = rx.blocking_recv() {
        if stop.load(Ordering::SeqCst) {
            tracing::debug!("Worker for partition {} stopping, discarding queued events", partition);
            break;
        }

        match event {
            PartitionEvent::Model(update) => {
                if let Err(e) = transformer.apply_update(&update) {
                    tracing::warn!(
                        "Partition {}: ignoring model update '{}': {}",
                        partition,
                        update.name,
                        e
                    );
                }
            }
            PartitionEvent::Record { key, record } => {
                let outcome = match transformer.transform(key.clone(), record.as_ref()) {
                    Ok((_, result)) => Outcome::Served(result),
                    Err(e) => {
                        tracing::error!("Partition {}: scoring key '{}' failed: {}", partition, key, e);
                        Outcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };

                let scored = ScoredRecord {
                    partition,
                    key,
                    outcome,
                };
                if output.send(scored).is_err() {
                    tracing::trace!("Output channel closed; result for partition {} dropped", partition);
                }
            }
        }
    }

    transformer.close();
    tracing::debug!("Worker for partition {} stopped", partition);
}
