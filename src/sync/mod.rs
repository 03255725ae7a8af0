//! Secondary-store sync status

// Wire records: state, error classification, save result, health status
pub mod types;

// Client-side state machine refreshed after each save
pub mod tracker;

pub use tracker::{SyncStatus, SyncStatusTracker};
pub use types::{HealthSyncStatus, SyncErrorType, SyncResult, SyncState, SyncStats};
