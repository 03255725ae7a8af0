//! canvasflow: visual process canvas with auto-layout, edit reconciliation
//! and dual-store synchronization
//!
//! The pure core (graph model, layout, edit session, reconciliation, sync
//! state) is usable on its own; the editor drives it against a remote canvas
//! service, and the server side implements that service over SQLite with
//! Neo4j replication.

// Core configuration and setup
pub mod config;

// Typed domain errors
pub mod error;

// Graph data model and validation
pub mod graph;

// Deterministic auto-layout
pub mod layout;

// Mutable canvas state with dirty tracking
pub mod session;

// Session + baseline -> save payload
pub mod reconcile;

// Secondary-store sync status
pub mod sync;

// Client-side load/save controller
pub mod editor;

// Primary store: SQLite + ArcSwap registry
pub mod store;

// Secondary store replication
pub mod replication;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

pub use editor::{CanvasBackend, CanvasEditor, HttpCanvasBackend};
pub use error::{EditorError, LoadError, SaveError, SessionError, ValidationError};
pub use graph::{CanvasSnapshot, EdgeKind, NodeKind, NodeRef};
pub use layout::{LayoutEngine, LayoutResult};
pub use reconcile::ReconciliationEngine;
pub use server::start_server;
pub use session::{EditCommand, EditOutcome, EditSession};
pub use sync::{SyncState, SyncStatusTracker};
