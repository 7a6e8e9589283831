use super::client::RemoteStateClient;
use super::protocol::*;
use crate::error::RoutingError;
use crate::routing::metadata::{HostStoreInfo, MetadataService};
use crate::store::registry::StoreRegistry;

use axum::{
    Extension, Json,
    extract::Path,
    http::{HeaderMap, HeaderValue, StatusCode},
};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Shared state of the query routes. Nothing here is ever written by a handler.
pub struct QueryState {
    pub stores: Arc<StoreRegistry>,
    pub metadata: Arc<MetadataService>,
    /// Store reported by `/state/value` and `/state/instances`.
    pub store_name: String,
    pub client: RemoteStateClient,
}

impl QueryState {
    pub fn new(
        stores: Arc<StoreRegistry>,
        metadata: Arc<MetadataService>,
        store_name: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            stores,
            metadata,
            store_name: store_name.to_string(),
            client: RemoteStateClient::default(),
        })
    }
}

fn stale_headers(stale: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if stale {
        headers.insert(HEADER_ROUTING_STALE, HeaderValue::from_static("true"));
    }
    headers
}

fn routing_status(err: &RoutingError) -> StatusCode {
    match err {
        RoutingError::StoreUnavailable(_) => StatusCode::NOT_FOUND,
        RoutingError::NoLiveInstances(_) => StatusCode::NOT_FOUND,
        RoutingError::NotLocal { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn handle_get_instances(
    Extension(state): Extension<Arc<QueryState>>,
) -> (StatusCode, HeaderMap, Json<Vec<HostStoreInfo>>) {
    match state.metadata.metadata_for_store(&state.store_name) {
        Ok(routed) => (StatusCode::OK, stale_headers(routed.stale), Json(routed.value)),
        Err(e) => {
            // Nobody owns a partition yet.
            tracing::debug!("Instances query: {}", e);
            (StatusCode::OK, HeaderMap::new(), Json(vec![]))
        }
    }
}

pub async fn handle_get_instances_for_store(
    Extension(state): Extension<Arc<QueryState>>,
    Path(store): Path<String>,
) -> (StatusCode, HeaderMap, Json<Vec<HostStoreInfo>>) {
    match state.metadata.metadata_for_store(&store) {
        Ok(routed) => (StatusCode::OK, stale_headers(routed.stale), Json(routed.value)),
        Err(e) => {
            tracing::debug!("Instances query for store '{}': {}", store, e);
            (routing_status(&e), HeaderMap::new(), Json(vec![]))
        }
    }
}

pub async fn handle_get_instance_for_key(
    Extension(state): Extension<Arc<QueryState>>,
    Path((store, key)): Path<(String, String)>,
) -> (StatusCode, HeaderMap, Json<Option<HostStoreInfo>>) {
    match state.metadata.metadata_for_key(&store, &key) {
        Ok(routed) => (
            StatusCode::OK,
            stale_headers(routed.stale),
            Json(Some(routed.value)),
        ),
        Err(e) => {
            tracing::debug!("Instance query for '{}' in '{}': {}", key, store, e);
            (routing_status(&e), HeaderMap::new(), Json(None))
        }
    }
}

pub async fn handle_get_value(
    Extension(state): Extension<Arc<QueryState>>,
) -> (StatusCode, Json<Option<StatsResponse>>) {
    match state.stores.local_stats(&state.store_name) {
        Ok(Some(stats)) => (StatusCode::OK, Json(Some(StatsResponse::from(&stats)))),
        Ok(None) => (StatusCode::OK, Json(Some(StatsResponse::empty()))),
        Err(e) => {
            tracing::debug!("Value query: {}", e);
            (routing_status(&e), Json(None))
        }
    }
}

/// `/state/value` of every instance hosting the store.
pub async fn handle_get_cluster_value(
    Extension(state): Extension<Arc<QueryState>>,
) -> (StatusCode, HeaderMap, Json<ClusterValueResponse>) {
    let routed = match state.metadata.metadata_for_store(&state.store_name) {
        Ok(routed) => routed,
        Err(e) => {
            tracing::debug!("Cluster value query: {}", e);
            return (
                routing_status(&e),
                HeaderMap::new(),
                Json(ClusterValueResponse {
                    stale: true,
                    instances: vec![],
                }),
            );
        }
    };

    let mut requests = JoinSet::new();
    for (idx, host) in routed.value.into_iter().enumerate() {
        let client = state.client.clone();
        requests.spawn(async move {
            let result = client.fetch_value(&host).await;
            (idx, host, result)
        });
    }

    let mut instances = Vec::new();
    while let Some(joined) = requests.join_next().await {
        let Ok((idx, instance, result)) = joined else {
            continue;
        };
        let entry = match result {
            Ok(value) => InstanceValue {
                instance,
                value,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Could not reach {}: {}", instance.base_url(), e);
                InstanceValue {
                    instance,
                    value: None,
                    error: Some("unreachable".to_string()),
                }
            }
        };
        instances.push((idx, entry));
    }
    instances.sort_by_key(|(idx, _)| *idx);

    (
        StatusCode::OK,
        stale_headers(routed.stale),
        Json(ClusterValueResponse {
            stale: routed.stale,
            instances: instances.into_iter().map(|(_, entry)| entry).collect(),
        }),
    )
}
