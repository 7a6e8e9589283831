//! Partition Routing Module
//!
//! Decides where a key lives.
//!
//! - **`partitioner`**: hashes keys onto a fixed number of partitions and
//!   assigns partitions to live instances.
//! - **`metadata`**: projects that assignment into `HostStoreInfo` answers for
//!   the query endpoint, cached per topology version.

pub mod metadata;
pub mod partitioner;

#[cfg(test)]
mod tests;
