//! Server setup and initialization
//!
//! Wires storage, registry and replicator into the axum router.

use crate::{
    api::{create_router, AppState},
    config::Config,
    layout::LayoutEngine,
    replication::{GraphReplicator, Neo4jReplicator, ProcessLocks},
    store::{CanvasRegistry, CanvasStorage},
};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build application state around an already opened storage
pub async fn create_state(config: &Config, storage: CanvasStorage) -> Result<AppState> {
    tracing::info!("📊 Initializing canvas registry");
    let registry = Arc::new(CanvasRegistry::new(storage.clone()));
    registry
        .init_from_storage()
        .await
        .context("Failed to load canvases from storage")?;

    let replicator: Option<Arc<dyn GraphReplicator>> = if config.sync.enabled {
        tracing::info!(
            "🕸️ Replicating to Neo4j at {} (database '{}')",
            config.sync.neo4j.url,
            config.sync.neo4j.database
        );
        Some(Arc::new(Neo4jReplicator::new(config.sync.neo4j.clone())?))
    } else {
        tracing::info!("🕸️ Secondary store replication disabled");
        None
    };

    Ok(AppState {
        storage,
        registry,
        replicator,
        replication_locks: Arc::new(ProcessLocks::new()),
        layout: Arc::new(LayoutEngine::new(config.layout.clone())),
        reject_stale_writes: config.storage.reject_stale_writes,
        embed_sync_result: config.sync.embed_result,
    })
}

/// Create the main Axum application with all routes
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.database.data_dir);
    std::fs::create_dir_all(&config.database.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

    let db_path = config.database.path();
    tracing::info!("📋 Opening canvas storage at {}", db_path.display());
    let storage = CanvasStorage::open(&db_path).await?;

    let state = create_state(&config, storage).await?;

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = create_router(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting canvasflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
