//! Secondary graph store replication
//!
//! After the primary save succeeds the persisted snapshot is pushed to the
//! graph database. A failure here never undoes the primary save; it is
//! classified and recorded as sync status.

use crate::graph::CanvasSnapshot;
use crate::sync::{SyncErrorType, SyncStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

// Neo4j HTTP transactional endpoint
pub mod neo4j;

pub use neo4j::{Neo4jReplicator, Neo4jSettings};

/// A classified replication failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ReplicationError {
    pub error_type: SyncErrorType,
    pub message: String,
}

impl ReplicationError {
    pub fn new(error_type: SyncErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait GraphReplicator: Send + Sync {
    /// Replace the process subgraph in the secondary store
    async fn replicate(&self, snapshot: &CanvasSnapshot) -> Result<SyncStats, ReplicationError>;
}

/// One async lock per process id
///
/// Each replication replaces the whole process subgraph, so two runs for the
/// same process must not interleave.
#[derive(Debug, Default)]
pub struct ProcessLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder is working on `process_id`
    pub async fn acquire(&self, process_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(process_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
