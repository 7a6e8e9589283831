//! Streaming Model Server Library
//!
//! Serves machine-learning models inside a partitioned record stream and lets
//! the active model be swapped while records keep flowing. The binary
//! (`main.rs`) wires these modules into a cluster node.
//!
//! ## Architecture Modules
//! - **`cluster`**: UDP gossip membership and the `ClusterView` trait that the
//!   rest of the system reads topology through.
//! - **`routing`**: key-to-partition hashing, partition-to-instance assignment,
//!   and the store metadata service built on top of it.
//! - **`store`**: the partitioned state substrate and the per-partition model
//!   slots (current and pending model, each with its stats).
//! - **`serving`**: the scoring transformer, per-partition workers, the local
//!   pipeline, and the model-type registry.
//! - **`query`**: read-only HTTP routes over serving state and routing.
//! - **`config`** / **`error`**: command-line configuration and domain errors.

pub mod cluster;
pub mod config;
pub mod error;
pub mod query;
pub mod routing;
pub mod serving;
pub mod store;
