//! Canvas auto-layout
//!
//! Pure functions from a snapshot to node positions. The same engine lays out
//! loaded canvases and AI-generated previews, so both render identically.

// Kahn ordering of steps over a petgraph view of process edges
pub mod order;

// Tier placement with collision sweep
pub mod engine;

pub use engine::{LayoutConfig, LayoutEngine, LayoutResult, Position, WidthRange};
pub use order::{order_steps, StepOrder};
