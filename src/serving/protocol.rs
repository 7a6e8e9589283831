//! Pipeline Adapter Protocol
//!
//! DTOs for the ingest routes that stand in for the streaming substrate:
//! records and model updates are posted here and routed to partition workers.

use super::types::DataRecord;
use crate::routing::metadata::HostStoreInfo;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_PIPELINE_RECORD: &str = "/pipeline/record";
pub const ENDPOINT_PIPELINE_MODEL: &str = "/pipeline/model";

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRecordRequest {
    pub key: String,
    #[serde(default)]
    pub record: Option<DataRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRecordResponse {
    pub accepted: bool,
    pub partition: u32,
    /// Instance to retry against when the partition is processed elsewhere.
    pub owner: Option<HostStoreInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitModelResponse {
    pub accepted: bool,
    pub partitions: usize,
    pub error: Option<String>,
}
