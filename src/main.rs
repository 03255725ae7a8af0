//! canvasflow server entry point
//!
//! Serves:
//! - canvas load/save at /canvas/{process_id}
//! - layout preview at /canvas/preview
//! - sync status at /health/get_sync_status
//! - health check at /healthz

use canvasflow::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Defaults to 0.0.0.0:3004 and data/canvasflow.db, overridable via CANVASFLOW_* vars
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
