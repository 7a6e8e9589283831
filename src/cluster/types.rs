use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InstanceState {
    Alive,
    Suspect,
    Dead,
}

/// One model-server process as seen by the cluster.
///
/// Besides the gossip address used for membership traffic, every instance
/// advertises the address of its query endpoint and the names of the state
/// stores it hosts. That is all the routing layer needs to answer
/// "which instance holds key K of store S".
///
/// `incarnation` is a logical clock owned by the instance itself; a higher
/// value always wins when two views disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub gossip_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub stores: Vec<String>,
    pub state: InstanceState,
    pub incarnation: u64,

    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

/// Membership messages exchanged over UDP.
///
/// - `Ping/Ack`: liveness check; the ack piggybacks the full member list.
/// - `Join`: first contact of a new instance with a seed.
/// - `Suspect/Alive`: health changes, ordered by incarnation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    Ping {
        sender: Instance,
    },

    Ack {
        from: InstanceId,
        incarnation: u64,
        members: Vec<Instance>,
    },

    Join {
        instance: Instance,
    },

    Suspect {
        id: InstanceId,
        incarnation: u64,
    },

    Alive {
        id: InstanceId,
        incarnation: u64,
    },
}
