//! Shared fixtures for integration tests

use async_trait::async_trait;
use canvasflow::api::{create_router, AppState};
use canvasflow::graph::{
    CanvasSnapshot, DataResource, ImplDataLink, ImplLink, Implementation, Process, ProcessEdge,
    Step, StepImplLink,
};
use canvasflow::layout::LayoutEngine;
use canvasflow::replication::{GraphReplicator, ProcessLocks, ReplicationError};
use canvasflow::store::{CanvasRegistry, CanvasStorage};
use canvasflow::sync::{SyncErrorType, SyncStats};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Steps a → b → c without implementations
#[allow(dead_code)]
pub fn chain_canvas(process_id: &str) -> CanvasSnapshot {
    let mut snapshot = CanvasSnapshot::new(Process::new(process_id, "Loan application"));
    snapshot.steps = vec![
        Step::new("a", "Apply"),
        Step::new("b", "Score"),
        Step::new("c", "Decide"),
    ];
    snapshot.edges = vec![ProcessEdge::new("a", "b"), ProcessEdge::new("b", "c")];
    snapshot
}

/// Two steps sharing one implementation that reads and writes data
#[allow(dead_code)]
pub fn claims_canvas(process_id: &str) -> CanvasSnapshot {
    let mut snapshot = CanvasSnapshot::new(Process::new(process_id, "Claims"));
    snapshot.steps = vec![
        Step::new("submit", "Submit claim"),
        Step::new("assess", "Assess claim"),
    ];
    snapshot.edges = vec![ProcessEdge::new("submit", "assess")];
    snapshot.implementations = vec![
        Implementation {
            impl_type: Some("service".to_string()),
            ..Implementation::new("claims", "Claims service")
        },
        Implementation::new("fraud", "Fraud model"),
    ];
    snapshot.step_impl_links = vec![
        StepImplLink::new("submit", "claims"),
        StepImplLink::new("assess", "claims"),
    ];
    snapshot.impl_links = vec![ImplLink::new("claims", "fraud")];
    snapshot.data_resources = vec![DataResource::new("claims_db", "claims")];
    snapshot.impl_data_links = vec![ImplDataLink {
        access_type: Some("write".to_string()),
        ..ImplDataLink::new("claims", "claims_db")
    }];
    snapshot
}

/// Replicator that plays back queued outcomes, succeeding once the queue is empty
#[derive(Default)]
pub struct ScriptedReplicator {
    outcomes: Mutex<VecDeque<Result<SyncStats, ReplicationError>>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedReplicator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, error_type: SyncErrorType, message: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(ReplicationError::new(error_type, message)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphReplicator for ScriptedReplicator {
    async fn replicate(&self, snapshot: &CanvasSnapshot) -> Result<SyncStats, ReplicationError> {
        self.calls
            .lock()
            .unwrap()
            .push(snapshot.process_id().to_string());
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(SyncStats {
                nodes: snapshot.node_count() + 1,
                relationships: snapshot.edge_count(),
            })
        })
    }
}

/// Application state over a fresh in-memory database
#[allow(dead_code)]
pub async fn test_state(
    replicator: Option<Arc<dyn GraphReplicator>>,
    reject_stale_writes: bool,
    embed_sync_result: bool,
) -> AppState {
    let storage = CanvasStorage::in_memory().await.unwrap();
    let registry = Arc::new(CanvasRegistry::new(storage.clone()));
    registry.init_from_storage().await.unwrap();
    AppState {
        storage,
        registry,
        replicator,
        replication_locks: Arc::new(ProcessLocks::new()),
        layout: Arc::new(LayoutEngine::default()),
        reject_stale_writes,
        embed_sync_result,
    }
}

/// Serve `state` on an ephemeral local port; returns the base URL
#[allow(dead_code)]
pub async fn spawn_server(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}
