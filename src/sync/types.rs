//! Secondary-store sync records as they appear on the wire

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replication state of one process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    NeverSynced,
    Syncing,
    Synced,
    Failed,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::NeverSynced => "never_synced",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "never_synced" => Some(SyncState::NeverSynced),
            "syncing" => Some(SyncState::Syncing),
            "synced" => Some(SyncState::Synced),
            "failed" => Some(SyncState::Failed),
            _ => None,
        }
    }
}

/// Classification of a replication failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorType {
    ConnectionError,
    AuthError,
    QueryError,
    UnknownError,
}

impl SyncErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncErrorType::ConnectionError => "connection_error",
            SyncErrorType::AuthError => "auth_error",
            SyncErrorType::QueryError => "query_error",
            SyncErrorType::UnknownError => "unknown_error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "connection_error" => Some(SyncErrorType::ConnectionError),
            "auth_error" => Some(SyncErrorType::AuthError),
            "query_error" => Some(SyncErrorType::QueryError),
            "unknown_error" => Some(SyncErrorType::UnknownError),
            _ => None,
        }
    }

    /// What an operator can do about it
    pub fn hint(self) -> &'static str {
        match self {
            SyncErrorType::ConnectionError => {
                "The graph database is unreachable. Check that it is running and that the sync URL is correct, then save again."
            }
            SyncErrorType::AuthError => {
                "The graph database rejected the credentials. Check the sync user and password."
            }
            SyncErrorType::QueryError => {
                "The graph database rejected the replication query. The canvas data may contain values it cannot store."
            }
            SyncErrorType::UnknownError => {
                "Replication failed for an unknown reason. Check the server logs and try saving again."
            }
        }
    }
}

/// Node and relationship counts written to the secondary store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub nodes: usize,
    pub relationships: usize,
}

/// Outcome of one replication attempt, embedded in the save response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<SyncErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SyncStats>,
}

impl SyncResult {
    pub fn succeeded(stats: SyncStats) -> Self {
        Self {
            success: true,
            message: format!(
                "Synced {} nodes and {} relationships",
                stats.nodes, stats.relationships
            ),
            synced_at: Some(Utc::now()),
            error_type: None,
            stats: Some(stats),
        }
    }

    pub fn failed(error_type: SyncErrorType, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            synced_at: None,
            error_type: Some(error_type),
            stats: None,
        }
    }
}

/// `GET /health/get_sync_status` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSyncStatus {
    pub process_id: String,
    pub neo4j_status: SyncState,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub error_type: Option<SyncErrorType>,
}

impl HealthSyncStatus {
    pub fn never_synced(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            neo4j_status: SyncState::NeverSynced,
            last_sync_at: None,
            sync_error: None,
            error_type: None,
        }
    }
}
