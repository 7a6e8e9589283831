//! Model State Storage Module
//!
//! Holds the serving state of every partition processed on this instance.
//!
//! ## Core Concepts
//! - **Partitioned substrate**: `PartitionedStateStore` is a plain per-partition
//!   key-value interface; `LocalStateStore` implements it in memory.
//! - **Model slots**: `ModelStateStore` holds the current and pending model of
//!   one partition and is written only by that partition's worker.
//! - **Publication**: slots are exposed to readers as immutable snapshots behind
//!   an atomically swapped pointer, registered under a fixed key.
//! - **Registry**: `StoreRegistry` maps store names to their local handles.

pub mod model_state;
pub mod partitioned;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;
