//! Primary store
//!
//! SQLite persistence plus the in-memory registry that serves reads.

// SQLite tables for canvases and sync status
pub mod storage;

// ArcSwap cache of persisted canvases
pub mod registry;

pub use registry::CanvasRegistry;
pub use storage::{assign_edge_ids, CanvasMetadata, CanvasStorage, PersistOutcome};
