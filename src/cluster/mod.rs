//! Cluster Membership Module
//!
//! Keeps track of which model-server instances are alive and what they host.
//! Instances gossip over UDP (SWIM-style) and converge on a shared member list;
//! the routing layer reads that list through the [`view::ClusterView`] trait.
//!
//! ## Core Mechanisms
//! - **Gossip**: periodic ping/ack with a random peer; acks carry the sender's full member list.
//! - **Failure Detection**: "Alive" -> "Suspect" -> "Dead" on contact timeouts.
//! - **Incarnation Numbers**: an instance refutes a suspicion by bumping its own incarnation.
//! - **Topology Version**: every membership or health change bumps a counter so
//!   readers can tell when the partition assignment needs recomputing.

pub mod service;
pub mod types;
pub mod view;
