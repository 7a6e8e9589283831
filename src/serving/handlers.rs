use super::pipeline::ServingPipeline;
use super::protocol::*;
use super::types::ModelUpdate;
use crate::error::RoutingError;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_submit_record(
    Extension(pipeline): Extension<Arc<ServingPipeline>>,
    Json(req): Json<SubmitRecordRequest>,
) -> (StatusCode, Json<SubmitRecordResponse>) {
    match pipeline.submit_record(req.key.clone(), req.record).await {
        Ok(partition) => {
            tracing::debug!("Record '{}' queued on partition {}", req.key, partition);
            (
                StatusCode::ACCEPTED,
                Json(SubmitRecordResponse {
                    accepted: true,
                    partition,
                    owner: None,
                }),
            )
        }
        Err(RoutingError::NotLocal {
            partition,
            owner: Some(owner),
        }) => {
            tracing::debug!(
                "Record '{}' belongs to partition {} on {}",
                req.key,
                partition,
                owner.base_url()
            );
            (
                StatusCode::MISDIRECTED_REQUEST,
                Json(SubmitRecordResponse {
                    accepted: false,
                    partition,
                    owner: Some(owner),
                }),
            )
        }
        Err(e) => {
            tracing::warn!("Record '{}' rejected: {}", req.key, e);
            let status = if e.is_transient() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::NOT_FOUND
            };
            let partition = match e {
                RoutingError::NotLocal { partition, .. } => partition,
                _ => 0,
            };
            (
                status,
                Json(SubmitRecordResponse {
                    accepted: false,
                    partition,
                    owner: None,
                }),
            )
        }
    }
}

pub async fn handle_submit_model(
    Extension(pipeline): Extension<Arc<ServingPipeline>>,
    Json(update): Json<ModelUpdate>,
) -> (StatusCode, Json<SubmitModelResponse>) {
    match pipeline.submit_model(update).await {
        Ok(partitions) => (
            StatusCode::ACCEPTED,
            Json(SubmitModelResponse {
                accepted: true,
                partitions,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Model update rejected: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(SubmitModelResponse {
                    accepted: false,
                    partitions: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
