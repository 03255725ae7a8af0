//! Canvas REST endpoints
//!
//! Loading reads the registry; saving validates the full graph, replaces the
//! stored copy and then replicates it to the secondary store.

use crate::{
    api::error::ApiError,
    graph::{CanvasSnapshot, SavedCanvas},
    layout::{LayoutEngine, LayoutResult},
    replication::{GraphReplicator, ProcessLocks},
    store::{CanvasMetadata, CanvasRegistry, CanvasStorage, PersistOutcome},
    sync::{HealthSyncStatus, SyncResult, SyncState},
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Primary SQLite store
    pub storage: CanvasStorage,
    /// Lock-free cache of persisted canvases
    pub registry: Arc<CanvasRegistry>,
    /// Secondary store; `None` disables replication
    pub replicator: Option<Arc<dyn GraphReplicator>>,
    /// Serializes replication runs per process
    pub replication_locks: Arc<ProcessLocks>,
    /// Layout used by `POST /canvas/preview`
    pub layout: Arc<LayoutEngine>,
    /// Answer 409 for saves built from an older revision
    pub reject_stale_writes: bool,
    /// Replicate before answering a save (otherwise in the background)
    pub embed_sync_result: bool,
}

pub fn create_canvas_routes() -> Router<AppState> {
    Router::new()
        .route("/canvas", get(list_canvases))
        .route("/canvas/preview", post(preview_layout))
        .route("/canvas/{process_id}", get(get_canvas).put(put_canvas))
}

/// GET /canvas
async fn list_canvases(State(state): State<AppState>) -> Result<Json<Vec<CanvasMetadata>>, ApiError> {
    let canvases = state.storage.list_canvases().await?;
    Ok(Json(canvases))
}

/// GET /canvas/{process_id}
async fn get_canvas(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
) -> Result<Json<CanvasSnapshot>, ApiError> {
    if let Some(snapshot) = state.registry.get_canvas(&process_id) {
        return Ok(Json((*snapshot).clone()));
    }

    match state.storage.get_canvas(&process_id).await? {
        Some(snapshot) => {
            state.registry.publish(snapshot.clone());
            Ok(Json(snapshot))
        }
        None => {
            tracing::debug!("🔍 Canvas not found: {}", process_id);
            Err(ApiError::not_found(&format!("canvas '{}'", process_id)))
        }
    }
}

/// PUT /canvas/{process_id}
///
/// Body: the full desired graph. The path id wins over the body's process id.
async fn put_canvas(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
    Json(mut snapshot): Json<CanvasSnapshot>,
) -> Result<Json<SavedCanvas>, ApiError> {
    snapshot.process.process_id = process_id.clone();

    if let Err(e) = snapshot.validate() {
        tracing::warn!("🚫 Rejected canvas '{}': {}", process_id, e);
        return Err(e.into());
    }

    let saved = match state
        .storage
        .save_canvas(&snapshot, state.reject_stale_writes)
        .await
    {
        Ok(PersistOutcome::Saved(saved)) => saved,
        Ok(PersistOutcome::Stale { current }) => return Err(ApiError::stale(current)),
        Err(e) => {
            tracing::error!("❌ Failed to save canvas '{}': {}", process_id, e);
            return Err(e.into());
        }
    };

    state.registry.publish(saved.clone());
    tracing::info!(
        "💾 Saved canvas '{}' at revision {:?} ({} nodes, {} edges)",
        process_id,
        saved.revision,
        saved.node_count(),
        saved.edge_count()
    );

    let Some(replicator) = state.replicator.clone() else {
        return Ok(Json(SavedCanvas {
            snapshot: saved,
            sync_result: None,
        }));
    };

    mark_syncing(&state.storage, &process_id).await;

    if state.embed_sync_result {
        let result = replicate_and_record(
            &state.storage,
            replicator.as_ref(),
            &state.replication_locks,
            &saved,
        )
        .await;
        Ok(Json(SavedCanvas {
            snapshot: saved,
            sync_result: Some(result),
        }))
    } else {
        let storage = state.storage.clone();
        let locks = Arc::clone(&state.replication_locks);
        let snapshot = saved.clone();
        tokio::spawn(async move {
            replicate_and_record(&storage, replicator.as_ref(), &locks, &snapshot).await;
        });
        Ok(Json(SavedCanvas {
            snapshot: saved,
            sync_result: None,
        }))
    }
}

/// POST /canvas/preview
///
/// Lays out a snapshot (e.g. a generated skeleton) without persisting it.
async fn preview_layout(
    State(state): State<AppState>,
    Json(snapshot): Json<CanvasSnapshot>,
) -> Json<LayoutResult> {
    tracing::debug!(
        "🖼️ Preview layout for '{}' ({} nodes)",
        snapshot.process_id(),
        snapshot.node_count()
    );
    Json(state.layout.layout(&snapshot))
}

async fn mark_syncing(storage: &CanvasStorage, process_id: &str) {
    let mut status = match storage.get_sync_status(process_id).await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!("⚠️ Could not read sync status for '{}': {}", process_id, e);
            HealthSyncStatus::never_synced(process_id)
        }
    };
    status.neo4j_status = SyncState::Syncing;
    status.sync_error = None;
    status.error_type = None;
    if let Err(e) = storage.set_sync_status(&status).await {
        tracing::warn!("⚠️ Could not record sync status for '{}': {}", process_id, e);
    }
}

/// Push the process of `snapshot` to the secondary store and persist the outcome
///
/// Runs for one process are serialized, and each run replicates the newest
/// stored revision, so a slow run for an older save can never leave the graph
/// store behind the primary. A failed sync keeps the last successful sync time.
pub async fn replicate_and_record(
    storage: &CanvasStorage,
    replicator: &dyn GraphReplicator,
    locks: &ProcessLocks,
    snapshot: &CanvasSnapshot,
) -> SyncResult {
    let process_id = snapshot.process_id();
    let _guard = locks.acquire(process_id).await;

    let newer = match storage.get_canvas(process_id).await {
        Ok(Some(stored)) if stored.revision > snapshot.revision => {
            tracing::debug!(
                "⏩ Replicating '{}' at stored revision {:?} instead of {:?}",
                process_id,
                stored.revision,
                snapshot.revision
            );
            Some(stored)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("⚠️ Could not read stored canvas '{}': {}", process_id, e);
            None
        }
    };
    let snapshot = newer.as_ref().unwrap_or(snapshot);

    let previous_sync_at = match storage.get_sync_status(process_id).await {
        Ok(status) => status.last_sync_at,
        Err(e) => {
            tracing::warn!("⚠️ Could not read sync status for '{}': {}", process_id, e);
            None
        }
    };

    let (result, status) = match replicator.replicate(snapshot).await {
        Ok(stats) => {
            let result = SyncResult::succeeded(stats);
            tracing::info!("🔄 Replicated canvas '{}': {}", process_id, result.message);
            let status = HealthSyncStatus {
                process_id: process_id.to_string(),
                neo4j_status: SyncState::Synced,
                last_sync_at: result.synced_at.or_else(|| Some(Utc::now())),
                sync_error: None,
                error_type: None,
            };
            (result, status)
        }
        Err(e) => {
            tracing::error!(
                "❌ Replication of canvas '{}' failed ({}): {}",
                process_id,
                e.error_type.as_str(),
                e.message
            );
            let status = HealthSyncStatus {
                process_id: process_id.to_string(),
                neo4j_status: SyncState::Failed,
                last_sync_at: previous_sync_at,
                sync_error: Some(e.message.clone()),
                error_type: Some(e.error_type),
            };
            (SyncResult::failed(e.error_type, e.message), status)
        }
    };

    if let Err(e) = storage.set_sync_status(&status).await {
        tracing::error!("❌ Failed to record sync status for '{}': {}", process_id, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;
    use crate::replication::ReplicationError;
    use crate::sync::SyncStats;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the revisions it was handed and how many runs overlapped
    #[derive(Default)]
    struct RecordingReplicator {
        revisions: Mutex<Vec<Option<i64>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl GraphReplicator for RecordingReplicator {
        async fn replicate(&self, snapshot: &CanvasSnapshot) -> Result<SyncStats, ReplicationError> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.revisions.lock().unwrap().push(snapshot.revision);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SyncStats::default())
        }
    }

    async fn saved(storage: &CanvasStorage) -> CanvasSnapshot {
        match storage.save_canvas(&fixtures::chain(), false).await.unwrap() {
            PersistOutcome::Saved(saved) => saved,
            PersistOutcome::Stale { .. } => panic!("expected a saved canvas"),
        }
    }

    #[tokio::test]
    async fn late_run_for_an_old_revision_replicates_the_newest() {
        let storage = CanvasStorage::in_memory().await.unwrap();
        let first = saved(&storage).await;
        saved(&storage).await;

        let replicator = RecordingReplicator::default();
        let locks = ProcessLocks::new();
        let result = replicate_and_record(&storage, &replicator, &locks, &first).await;

        assert!(result.success);
        assert_eq!(*replicator.revisions.lock().unwrap(), vec![Some(2)]);
        let status = storage.get_sync_status("p-chain").await.unwrap();
        assert_eq!(status.neo4j_status, SyncState::Synced);
    }

    #[tokio::test]
    async fn runs_for_one_process_never_overlap() {
        let storage = CanvasStorage::in_memory().await.unwrap();
        let first = saved(&storage).await;
        let second = saved(&storage).await;

        let replicator = RecordingReplicator::default();
        let locks = ProcessLocks::new();
        tokio::join!(
            replicate_and_record(&storage, &replicator, &locks, &second),
            replicate_and_record(&storage, &replicator, &locks, &first),
        );

        assert_eq!(replicator.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(*replicator.revisions.lock().unwrap(), vec![Some(2), Some(2)]);
    }
}
