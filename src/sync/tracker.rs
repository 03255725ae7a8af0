//! Per-process replication state machine
//!
//! never_synced → syncing on save submission, syncing → synced or failed once
//! the save reports back, any state → syncing on the next save.

use crate::sync::types::{HealthSyncStatus, SyncErrorType, SyncResult, SyncState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Replication status as the editor shows it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    /// Current replication state
    pub state: SyncState,
    /// Last successful replication; survives later failures
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Classification of the most recent failure
    pub error_type: Option<SyncErrorType>,
}

impl SyncStatus {
    /// Remediation hint for the current failure, if any
    pub fn hint(&self) -> Option<&'static str> {
        match self.state {
            SyncState::Failed => Some(self.error_type.unwrap_or(SyncErrorType::UnknownError).hint()),
            _ => None,
        }
    }
}

static NEVER_SYNCED: SyncStatus = SyncStatus {
    state: SyncState::NeverSynced,
    last_synced_at: None,
    last_error: None,
    error_type: None,
};

/// Sync status of every process the editor has touched
///
/// Keyed by process id, so a save that completes after the editor switched
/// canvases still lands on its own process.
#[derive(Debug, Clone, Default)]
pub struct SyncStatusTracker {
    statuses: HashMap<String, SyncStatus>,
}

impl SyncStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of `process_id`; `never_synced` when nothing is known yet
    pub fn status(&self, process_id: &str) -> &SyncStatus {
        self.statuses.get(process_id).unwrap_or(&NEVER_SYNCED)
    }

    pub fn state(&self, process_id: &str) -> SyncState {
        self.status(process_id).state
    }

    fn entry(&mut self, process_id: &str) -> &mut SyncStatus {
        self.statuses.entry(process_id.to_string()).or_default()
    }

    /// Enter `syncing` for a new save; returns what was there before
    pub fn mark_syncing(&mut self, process_id: &str) -> SyncStatus {
        let status = self.entry(process_id);
        let previous = status.clone();
        status.state = SyncState::Syncing;
        status.last_error = None;
        status.error_type = None;
        previous
    }

    /// Put back a status captured by `mark_syncing` (primary save failed)
    pub fn restore(&mut self, process_id: &str, previous: SyncStatus) {
        *self.entry(process_id) = previous;
    }

    /// Apply the replication outcome embedded in a save response
    pub fn apply_save_result(&mut self, process_id: &str, result: &SyncResult) {
        let status = self.entry(process_id);
        if result.success {
            status.state = SyncState::Synced;
            status.last_synced_at = result.synced_at.or_else(|| Some(Utc::now()));
            status.last_error = None;
            status.error_type = None;
        } else {
            status.state = SyncState::Failed;
            status.last_error = Some(result.message.clone());
            status.error_type = Some(result.error_type.unwrap_or(SyncErrorType::UnknownError));
        }
    }

    /// Apply a polled health status to the process it reports on
    ///
    /// A failure report keeps the last successful sync time when the server
    /// does not send one.
    pub fn apply_health(&mut self, health: &HealthSyncStatus) {
        let status = self.entry(&health.process_id);
        status.state = health.neo4j_status;
        if health.last_sync_at.is_some() {
            status.last_synced_at = health.last_sync_at;
        }
        match health.neo4j_status {
            SyncState::Failed => {
                status.last_error = health.sync_error.clone();
                status.error_type = Some(health.error_type.unwrap_or(SyncErrorType::UnknownError));
            }
            _ => {
                status.last_error = None;
                status.error_type = None;
            }
        }
    }
}
