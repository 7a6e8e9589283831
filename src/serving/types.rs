use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One input record to be scored: named numeric features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub features: BTreeMap<String, f64>,
}

impl DataRecord {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            features: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

/// A model-update event.
///
/// `model_type` selects the factory in the `ModelRegistry`; `definition` is
/// handed to that factory untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdate {
    pub name: String,
    pub description: String,
    pub model_type: String,
    pub definition: serde_json::Value,
}

/// Outcome of scoring one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServingResult {
    /// No model has been promoted on this partition yet.
    NoModel,
    Scored { score: f64, duration_ms: f64 },
}

impl ServingResult {
    pub fn score(&self) -> Option<f64> {
        match self {
            ServingResult::Scored { score, .. } => Some(*score),
            ServingResult::NoModel => None,
        }
    }
}

/// Events carried by a partition's ordered input stream.
#[derive(Debug, Clone)]
pub enum PartitionEvent {
    Model(ModelUpdate),
    Record {
        key: String,
        record: Option<DataRecord>,
    },
}

/// What a partition worker emits for every record event.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub partition: u32,
    pub key: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Served(ServingResult),
    Failed { error: String },
}
