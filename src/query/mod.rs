//! Interactive Query Module
//!
//! Read-only HTTP view of the serving state. Handlers only load published
//! snapshots and routing tables, so a query never waits on a partition worker
//! and never changes anything.
//!
//! - `/state/value`: stats of the model active on this instance, or an empty sentinel.
//! - `/state/instances`: which instances host the model store.
//! - `/state/instances/:store`, `/state/instance/:store/:key`: scoped lookups.
//! - `/state/cluster/value`: `/state/value` gathered from every hosting instance.

pub mod client;
pub mod handlers;
pub mod protocol;
