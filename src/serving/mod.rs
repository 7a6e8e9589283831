//! Model Serving Module
//!
//! Scores records against the model that is active on their partition and
//! swaps models in without stopping the stream.
//!
//! ## Core Components
//! - **`model`**: the `Scorer` capability, the model-type registry, and the
//!   built-in linear scorer.
//! - **`transformer`**: the per-partition scoring step. Promotes a staged model
//!   before every record, so a record that follows a model update is always
//!   scored by it.
//! - **`worker`**: one blocking thread per partition, fed by a bounded channel
//!   in arrival order.
//! - **`pipeline`**: keeps workers in line with the partition assignment and
//!   routes incoming records and model updates to them.
//! - **`handlers`** / **`protocol`**: the HTTP ingest adapter.

pub mod handlers;
pub mod model;
pub mod pipeline;
pub mod protocol;
pub mod transformer;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;
