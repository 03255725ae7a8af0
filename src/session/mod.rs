//! Edit session
//!
//! The mutable, single-writer canvas: nodes and edges as rendered, the dirty
//! flag and the operation log. Presentation state is kept apart.

// Canvas mutations, dirty tracking and the replayable command log
pub mod edit;

// Selection and highlight, read-only over the session
pub mod presentation;

pub use edit::{
    CanvasEdge, CanvasNode, ChangeClass, EditCommand, EditOutcome, EditSession, EdgeAttributes,
    NodeAttributes, Rejection,
};
pub use presentation::Presentation;
