//! Error types for model serving and state routing.
//!
//! Two families are kept apart because they propagate differently:
//!
//! - [`ServingError`] comes out of the scoring path and is handed to whoever
//!   called `transform`. The core never retries.
//! - [`RoutingError`] comes out of store and metadata lookups. The query layer
//!   maps it to a plain not-found or unavailable response and never leaks the
//!   message to the client.
//!
//! Cleanup failures of a displaced model are not represented here: they are
//! logged where they happen and never surface.

use crate::routing::metadata::HostStoreInfo;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServingError {
    #[error("scorer failed: {0}")]
    Scorer(anyhow::Error),

    #[error("record for key '{0}' is missing or could not be decoded")]
    MissingRecord(String),

    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    #[error("invalid model definition for '{name}': {reason}")]
    InvalidModel { name: String, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum RoutingError {
    #[error("store '{0}' has no local representative")]
    StoreUnavailable(String),

    #[error("no live instance is hosting store '{0}'")]
    NoLiveInstances(String),

    #[error("partition {partition} is not processed on this instance")]
    NotLocal {
        partition: u32,
        owner: Option<HostStoreInfo>,
    },
}

impl RoutingError {
    /// Errors that are expected to clear up on their own once the cluster settles.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RoutingError::NoLiveInstances(_) | RoutingError::NotLocal { owner: None, .. }
        )
    }
}
