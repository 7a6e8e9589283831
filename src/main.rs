use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use model_server::cluster::service::MembershipService;
use model_server::config::ServerConfig;
use model_server::query::handlers::*;
use model_server::query::protocol::*;
use model_server::routing::metadata::MetadataService;
use model_server::routing::partitioner::PartitionManager;
use model_server::serving::handlers::{handle_submit_model, handle_submit_record};
use model_server::serving::model::ModelRegistry;
use model_server::serving::pipeline::ServingPipeline;
use model_server::serving::protocol::{ENDPOINT_PIPELINE_MODEL, ENDPOINT_PIPELINE_RECORD};
use model_server::serving::types::{Outcome, ServingResult};
use model_server::store::registry::StoreRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("model-server");

    let config = match ServerConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", ServerConfig::usage(program));
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    for arg in &config.ignored {
        tracing::warn!("Ignoring unknown argument: {}", arg);
    }
    tracing::info!("Starting node on {}", config.bind_addr);
    if !config.seeds.is_empty() {
        tracing::info!("Seed nodes: {:?}", config.seeds);
    } else {
        tracing::info!("Starting as seed node (founder)");
    }

    // 1. Membership (UDP gossip):
    let membership = MembershipService::new(
        config.bind_addr,
        config.http_addr,
        vec![config.store_name.clone()],
        config.seeds.clone(),
    )
    .await?;
    tracing::info!("Instance ID: {:?}", membership.local.id);

    // 2. Routing:
    let partitioner = PartitionManager::new(membership.clone(), config.partitions);
    let metadata = MetadataService::new(partitioner.clone());

    // 3. Serving:
    let stores = StoreRegistry::new();
    let store = stores.register(&config.store_name);
    let models = ModelRegistry::with_builtin();
    tracing::info!("Model types: {:?}", models.list_types());

    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let pipeline = ServingPipeline::new(
        partitioner.clone(),
        metadata.clone(),
        store,
        models,
        results_tx,
    );

    let query = QueryState::new(stores.clone(), metadata.clone(), &config.store_name);

    // 4. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_STATE_INSTANCES, get(handle_get_instances))
        .route(ENDPOINT_STATE_INSTANCES_FOR_STORE, get(handle_get_instances_for_store))
        .route(ENDPOINT_STATE_INSTANCE_FOR_KEY, get(handle_get_instance_for_key))
        .route(ENDPOINT_STATE_VALUE, get(handle_get_value))
        .route(ENDPOINT_STATE_CLUSTER_VALUE, get(handle_get_cluster_value))
        .route(ENDPOINT_PIPELINE_RECORD, post(handle_submit_record))
        .route(ENDPOINT_PIPELINE_MODEL, post(handle_submit_model))
        .layer(Extension(query))
        .layer(Extension(pipeline.clone()));

    // 5. Spawn membership service:
    let service_clone = membership.clone();
    tokio::spawn(async move {
        service_clone.start().await;
    });

    // 6. Open owned partitions and follow the topology:
    pipeline.rebalance().await;
    let watcher = tokio::spawn(pipeline.clone().watch_topology(config.rebalance_interval));

    // 7. Scored-record sink:
    tokio::spawn(async move {
        while let Some(scored) = results_rx.recv().await {
            match scored.outcome {
                Outcome::Served(ServingResult::Scored { score, duration_ms }) => tracing::info!(
                    "[p{}] {} -> {:.4} ({:.3} ms)",
                    scored.partition,
                    scored.key,
                    score,
                    duration_ms
                ),
                Outcome::Served(ServingResult::NoModel) => {
                    tracing::debug!("[p{}] {} -> no model", scored.partition, scored.key)
                }
                Outcome::Failed { error } => {
                    tracing::warn!("[p{}] {} failed: {}", scored.partition, scored.key, error)
                }
            }
        }
    });

    // 8. Spawn stats reporter:
    let stats_service = membership.clone();
    let stats_pipeline = pipeline.clone();
    let stats_stores = stores.clone();
    let store_name = config.store_name.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let alive = stats_service.get_alive_members();
            tracing::info!(
                "Cluster stats: {} alive instances, local partitions {:?}",
                alive.len(),
                stats_pipeline.local_partitions()
            );
            for instance in alive {
                tracing::info!(
                    "  - {:?} gossip={} http={} (inc={})",
                    instance.id,
                    instance.gossip_addr,
                    instance.http_addr,
                    instance.incarnation
                );
            }
            if let Ok(Some(stats)) = stats_stores.local_stats(&store_name) {
                tracing::info!(
                    "Serving '{}': {} invocations, avg {:.3} ms",
                    stats.name,
                    stats.invocations,
                    stats.average_duration_ms()
                );
            }
        }
    });

    // 9. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    watcher.abort();
    pipeline.shutdown().await;
    tracing::info!("Stopped");

    Ok(())
}
