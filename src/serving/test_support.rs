//! Scorer doubles shared by the unit tests.

use super::model::Scorer;
use super::types::DataRecord;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters observed from outside a `FixedScorer` after it has been moved
/// into a store.
#[derive(Clone, Default)]
pub struct Counters {
    scores: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

impl Counters {
    pub fn scores(&self) -> usize {
        self.scores.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

/// Returns the same score for every record.
pub struct FixedScorer {
    output: f64,
    fail_score: bool,
    fail_cleanup: bool,
    panic_on: Option<String>,
    counters: Counters,
}

impl FixedScorer {
    pub fn new(output: f64) -> (Box<dyn Scorer>, Counters) {
        Self::build(output, false, false)
    }

    pub fn failing_score() -> (Box<dyn Scorer>, Counters) {
        Self::build(0.0, true, false)
    }

    pub fn failing_cleanup(output: f64) -> (Box<dyn Scorer>, Counters) {
        Self::build(output, false, true)
    }

    /// Panics while scoring any record that carries `feature`.
    pub fn panicking_on(feature: &str, output: f64) -> (Box<dyn Scorer>, Counters) {
        let counters = Counters::default();
        let scorer = FixedScorer {
            output,
            fail_score: false,
            fail_cleanup: false,
            panic_on: Some(feature.to_string()),
            counters: counters.clone(),
        };
        (Box::new(scorer), counters)
    }

    fn build(output: f64, fail_score: bool, fail_cleanup: bool) -> (Box<dyn Scorer>, Counters) {
        let counters = Counters::default();
        let scorer = FixedScorer {
            output,
            fail_score,
            fail_cleanup,
            panic_on: None,
            counters: counters.clone(),
        };
        (Box::new(scorer), counters)
    }
}

impl Scorer for FixedScorer {
    fn score(&mut self, record: &DataRecord) -> anyhow::Result<f64> {
        self.counters.scores.fetch_add(1, Ordering::SeqCst);
        if let Some(feature) = &self.panic_on
            && record.feature(feature).is_some()
        {
            panic!("scorer panicked on feature '{}'", feature);
        }
        if self.fail_score {
            anyhow::bail!("scorer exploded");
        }
        Ok(self.output)
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        self.counters.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            anyhow::bail!("cleanup exploded");
        }
        Ok(())
    }
}
