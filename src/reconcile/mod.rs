//! Edit reconciliation
//!
//! Turns an edit session plus the baseline it was loaded from back into the
//! canonical, whole-graph save payload.

// Session + baseline -> canonical snapshot
pub mod engine;

pub use engine::ReconciliationEngine;
