//! Client-side canvas editor
//!
//! Drives load → edit → save for one canvas at a time against a remote
//! canvas service.

// Async seam to the canvas service, with the reqwest implementation
pub mod backend;

// Load/save sequencing, stale-response suppression and sync tracking
pub mod controller;

pub use backend::{CanvasBackend, HttpCanvasBackend};
pub use controller::{CanvasEditor, LoadTicket, SaveReport, SaveTicket};
