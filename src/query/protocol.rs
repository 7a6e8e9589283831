//! Query Protocol Definitions
//!
//! Read-only routes exposing the serving state and the routing table, plus the
//! JSON shapes they return. Field names are camelCase on the wire.

use crate::routing::metadata::HostStoreInfo;
use crate::store::types::ServingStats;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_STATE_INSTANCES: &str = "/state/instances";
pub const ENDPOINT_STATE_INSTANCES_FOR_STORE: &str = "/state/instances/:store";
pub const ENDPOINT_STATE_INSTANCE_FOR_KEY: &str = "/state/instance/:store/:key";
pub const ENDPOINT_STATE_VALUE: &str = "/state/value";
pub const ENDPOINT_STATE_CLUSTER_VALUE: &str = "/state/cluster/value";

/// Set to `true` on answers built from a routing table that may be mid-rebalance.
pub const HEADER_ROUTING_STALE: &str = "x-routing-stale";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub name: String,
    pub description: String,
    pub since: u64,
    pub count: u64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl StatsResponse {
    /// Answer given while no model has been promoted.
    pub fn empty() -> Self {
        Self {
            name: "None".to_string(),
            description: "None".to_string(),
            since: 0,
            count: 0,
            avg_duration_ms: 0.0,
            min_duration_ms: 0.0,
            max_duration_ms: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.since == 0 && self.count == 0
    }
}

impl From<&ServingStats> for StatsResponse {
    fn from(stats: &ServingStats) -> Self {
        Self {
            name: stats.name.clone(),
            description: stats.description.clone(),
            since: stats.since,
            count: stats.invocations,
            avg_duration_ms: stats.average_duration_ms(),
            min_duration_ms: stats.min_duration_ms,
            max_duration_ms: stats.max_duration_ms,
        }
    }
}

/// One instance's answer within a cluster-wide fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceValue {
    pub instance: HostStoreInfo,
    pub value: Option<StatsResponse>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterValueResponse {
    pub stale: bool,
    pub instances: Vec<InstanceValue>,
}
