use serde::{Deserialize, Serialize};

/// Key under which every partition publishes its model slots.
pub const MODEL_STATE_KEY: u32 = 42;

/// Serving metadata for one model.
///
/// Created alongside a pending model with `since == 0`; stamped with the
/// activation time on promotion and updated after every successful score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingStats {
    pub name: String,
    pub description: String,
    /// Wall-clock milliseconds at promotion.
    pub since: u64,
    pub invocations: u64,
    pub total_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl ServingStats {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            since: 0,
            invocations: 0,
            total_duration_ms: 0.0,
            min_duration_ms: 0.0,
            max_duration_ms: 0.0,
        }
    }

    /// Fresh counters, stamped with the activation time.
    pub fn activated(&self, since: u64) -> Self {
        let mut stats = Self::new(&self.name, &self.description);
        stats.since = since;
        stats
    }

    pub fn update(&mut self, duration_ms: f64) {
        let duration_ms = duration_ms.max(0.0);
        if self.invocations == 0 {
            self.min_duration_ms = duration_ms;
            self.max_duration_ms = duration_ms;
        } else {
            self.min_duration_ms = self.min_duration_ms.min(duration_ms);
            self.max_duration_ms = self.max_duration_ms.max(duration_ms);
        }
        self.invocations += 1;
        self.total_duration_ms += duration_ms;
    }

    pub fn average_duration_ms(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_duration_ms / self.invocations as f64
        }
    }
}

/// Immutable view of one partition's four slots, as published to readers.
///
/// The models themselves never leave the writer; readers only see their stats.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SlotSnapshot {
    pub current: Option<ServingStats>,
    pub pending: Option<ServingStats>,
    /// Incremented by the writer on every publication.
    pub generation: u64,
}

impl SlotSnapshot {
    pub fn has_model(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
