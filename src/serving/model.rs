//! Scorer capability and the model-type registry.
//!
//! The serving core treats a model as an opaque [`Scorer`]. Concrete scorers
//! are produced from [`ModelUpdate`] events by factories registered under a
//! model-type name, so new model kinds can be plugged in without touching the
//! transformer or the state store.

use super::types::{DataRecord, ModelUpdate};
use crate::error::ServingError;

use anyhow::Result;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait Scorer: Send {
    fn score(&mut self, record: &DataRecord) -> Result<f64>;

    /// Releases whatever the model holds. Called once, when the model stops
    /// being the active one.
    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

pub type ModelFactoryFn =
    Arc<dyn Fn(&ModelUpdate) -> Result<Box<dyn Scorer>, ServingError> + Send + Sync>;

pub struct ModelRegistry {
    factories: DashMap<String, ModelFactoryFn>,
}

impl ModelRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            factories: DashMap::new(),
        })
    }

    /// Registry preloaded with the model types this crate ships.
    pub fn with_builtin() -> Arc<Self> {
        let registry = Self::new();
        registry.register(LINEAR_MODEL_TYPE, |update| {
            LinearModel::from_update(update).map(|m| Box::new(m) as Box<dyn Scorer>)
        });
        registry
    }

    pub fn register<F>(&self, model_type: &str, factory: F)
    where
        F: Fn(&ModelUpdate) -> Result<Box<dyn Scorer>, ServingError> + Send + Sync + 'static,
    {
        self.factories
            .insert(model_type.to_string(), Arc::new(factory));

        tracing::info!("Registered model type: {}", model_type);
    }

    pub fn build(&self, update: &ModelUpdate) -> Result<Box<dyn Scorer>, ServingError> {
        let factory = self
            .factories
            .get(&update.model_type)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServingError::UnknownModelType(update.model_type.clone()))?;

        tracing::debug!("Building model '{}' of type '{}'", update.name, update.model_type);
        factory(update)
    }

    /// Registered model types, sorted.
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.iter().map(|entry| entry.key().clone()).collect();
        types.sort();
        types
    }

    pub fn has_type(&self, model_type: &str) -> bool {
        self.factories.contains_key(model_type)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }
}

pub const LINEAR_MODEL_TYPE: &str = "linear";

#[derive(Debug, Deserialize)]
struct LinearDefinition {
    #[serde(default)]
    intercept: f64,
    weights: BTreeMap<String, f64>,
}

/// `intercept + sum(weight * feature)`; features absent from the record count as zero.
#[derive(Debug, Clone)]
pub struct LinearModel {
    intercept: f64,
    weights: BTreeMap<String, f64>,
}

impl LinearModel {
    pub fn new(intercept: f64, weights: BTreeMap<String, f64>) -> Self {
        Self { intercept, weights }
    }

    pub fn from_update(update: &ModelUpdate) -> Result<Self, ServingError> {
        let def: LinearDefinition = serde_json::from_value(update.definition.clone()).map_err(|e| {
            ServingError::InvalidModel {
                name: update.name.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some((feature, _)) = def.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ServingError::InvalidModel {
                name: update.name.clone(),
                reason: format!("weight for '{}' is not finite", feature),
            });
        }

        Ok(Self::new(def.intercept, def.weights))
    }
}

impl Scorer for LinearModel {
    fn score(&mut self, record: &DataRecord) -> Result<f64> {
        let mut total = self.intercept;
        for (feature, weight) in self.weights.iter() {
            let value = record.feature(feature).unwrap_or(0.0);
            if !value.is_finite() {
                anyhow::bail!("feature '{}' is not a finite number", feature);
            }
            total += weight * value;
        }
        Ok(total)
    }
}
