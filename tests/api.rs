//! HTTP API behavior, exercised in-process

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use canvasflow::api::{create_router, ErrorBody};
use canvasflow::graph::{CanvasSnapshot, ProcessEdge, SavedCanvas, StepImplLink};
use canvasflow::layout::LayoutResult;
use canvasflow::replication::GraphReplicator;
use canvasflow::store::CanvasMetadata;
use canvasflow::sync::{HealthSyncStatus, SyncErrorType, SyncState};
use common::{chain_canvas, claims_canvas, test_state, ScriptedReplicator};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn send<T: DeserializeOwned>(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<&CanvasSnapshot>,
) -> (StatusCode, T) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(snapshot) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(snapshot).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("bad body for {} ({}): {}", uri, status, e));
    (status, value)
}

async fn app_with(replicator: Arc<ScriptedReplicator>, reject_stale: bool) -> Router {
    let replicator: Arc<dyn GraphReplicator> = replicator;
    create_router(test_state(Some(replicator), reject_stale, true).await)
}

#[tokio::test]
async fn missing_canvas_is_404() {
    let app = app_with(ScriptedReplicator::new(), false).await;
    let (status, body): (_, ErrorBody) = send(&app, Method::GET, "/canvas/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.error.contains("nope"));
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let app = app_with(ScriptedReplicator::new(), false).await;
    let canvas = claims_canvas("p-claims");

    let (status, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-claims", Some(&canvas)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved.snapshot.revision, Some(1));
    assert_eq!(saved.snapshot.step_impl_links[0].id, Some(1));
    assert_eq!(saved.snapshot.step_impl_links[1].id, Some(2));
    let sync = saved.sync_result.unwrap();
    assert!(sync.success);
    assert_eq!(sync.stats.unwrap().nodes, 6);

    let (status, loaded): (_, CanvasSnapshot) =
        send(&app, Method::GET, "/canvas/p-claims", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded, saved.snapshot);

    let (_, listed): (_, Vec<CanvasMetadata>) = send(&app, Method::GET, "/canvas", None).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].process_id, "p-claims");
    assert_eq!(listed[0].name, "Claims");
}

#[tokio::test]
async fn path_id_overrides_payload_id() {
    let app = app_with(ScriptedReplicator::new(), false).await;
    let (status, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-real", Some(&chain_canvas("p-other"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved.snapshot.process_id(), "p-real");
}

#[tokio::test]
async fn invalid_graph_is_422_with_every_violation() {
    let replicator = ScriptedReplicator::new();
    let app = app_with(replicator.clone(), false).await;

    let mut canvas = chain_canvas("p-bad");
    canvas.edges.push(ProcessEdge::new("c", "ghost"));
    canvas.step_impl_links.push(StepImplLink::new("a", "missing-impl"));

    let (status, body): (_, ErrorBody) =
        send(&app, Method::PUT, "/canvas/p-bad", Some(&canvas)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.violations.len(), 2);
    assert!(replicator.calls().is_empty());

    let (status, _): (_, ErrorBody) = send(&app, Method::GET, "/canvas/p-bad", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replication_failure_still_persists() {
    let replicator = ScriptedReplicator::new();
    replicator.fail_next(SyncErrorType::ConnectionError, "Connection refused (os error 111)");
    let app = app_with(replicator.clone(), false).await;

    let (status, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&chain_canvas("p-chain"))).await;
    assert_eq!(status, StatusCode::OK);
    let sync = saved.sync_result.unwrap();
    assert!(!sync.success);
    assert_eq!(sync.error_type, Some(SyncErrorType::ConnectionError));

    let (_, loaded): (_, CanvasSnapshot) = send(&app, Method::GET, "/canvas/p-chain", None).await;
    assert_eq!(loaded.steps.len(), 3);

    let (_, health): (_, HealthSyncStatus) = send(
        &app,
        Method::GET,
        "/health/get_sync_status?process_id=p-chain",
        None,
    )
    .await;
    assert_eq!(health.neo4j_status, SyncState::Failed);
    assert_eq!(health.error_type, Some(SyncErrorType::ConnectionError));
    assert!(health.sync_error.unwrap().contains("refused"));

    // next save succeeds and clears the error
    let (_, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&loaded)).await;
    assert!(saved.sync_result.unwrap().success);
    let (_, health): (_, HealthSyncStatus) = send(
        &app,
        Method::GET,
        "/health/get_sync_status?process_id=p-chain",
        None,
    )
    .await;
    assert_eq!(health.neo4j_status, SyncState::Synced);
    assert!(health.last_sync_at.is_some());
    assert_eq!(health.sync_error, None);
}

#[tokio::test]
async fn unknown_process_has_never_synced() {
    let app = app_with(ScriptedReplicator::new(), false).await;
    let (status, health): (_, HealthSyncStatus) = send(
        &app,
        Method::GET,
        "/health/get_sync_status?process_id=p-new",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.neo4j_status, SyncState::NeverSynced);
    assert_eq!(health.last_sync_at, None);
}

#[tokio::test]
async fn stale_write_is_409_when_enabled() {
    let app = app_with(ScriptedReplicator::new(), true).await;
    let canvas = chain_canvas("p-chain");

    let (_, first): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&canvas)).await;
    let (status, _): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&first.snapshot)).await;
    assert_eq!(status, StatusCode::OK);

    // built from revision 1, but revision 2 is stored now
    let (status, body): (_, ErrorBody) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&first.snapshot)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.current_revision, Some(2));
}

#[tokio::test]
async fn last_writer_wins_by_default() {
    let app = app_with(ScriptedReplicator::new(), false).await;
    let canvas = chain_canvas("p-chain");
    send::<SavedCanvas>(&app, Method::PUT, "/canvas/p-chain", Some(&canvas)).await;
    let (status, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&canvas)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved.snapshot.revision, Some(2));
}

#[tokio::test]
async fn background_replication_is_polled() {
    let replicator = ScriptedReplicator::new();
    let dyn_replicator: Arc<dyn GraphReplicator> = replicator.clone();
    let app = create_router(test_state(Some(dyn_replicator), false, false).await);

    let (status, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-bg", Some(&chain_canvas("p-bg"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved.sync_result, None);

    let mut state = SyncState::Syncing;
    for _ in 0..50 {
        let (_, health): (_, HealthSyncStatus) = send(
            &app,
            Method::GET,
            "/health/get_sync_status?process_id=p-bg",
            None,
        )
        .await;
        state = health.neo4j_status;
        if state != SyncState::Syncing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state, SyncState::Synced);
    assert_eq!(replicator.calls(), vec!["p-bg"]);
}

#[tokio::test]
async fn disabled_replication_leaves_status_untouched() {
    let app = create_router(test_state(None, false, true).await);
    let (_, saved): (_, SavedCanvas) =
        send(&app, Method::PUT, "/canvas/p-chain", Some(&chain_canvas("p-chain"))).await;
    assert_eq!(saved.sync_result, None);

    let (_, health): (_, HealthSyncStatus) = send(
        &app,
        Method::GET,
        "/health/get_sync_status?process_id=p-chain",
        None,
    )
    .await;
    assert_eq!(health.neo4j_status, SyncState::NeverSynced);
}

#[tokio::test]
async fn preview_lays_out_without_saving() {
    let app = app_with(ScriptedReplicator::new(), false).await;
    let (status, layout): (_, LayoutResult) =
        send(&app, Method::POST, "/canvas/preview", Some(&claims_canvas("p-draft"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(layout.positions.len(), 5);
    assert_eq!(layout.step_order, vec!["submit", "assess"]);

    let (status, _): (_, ErrorBody) = send(&app, Method::GET, "/canvas/p-draft", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
