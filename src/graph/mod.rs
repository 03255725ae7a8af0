//! Canvas graph model
//!
//! Typed entities (Step, Implementation, DataResource, with the Process as
//! root), the four relation kinds, the endpoint validity table and graph
//! validation. Pure data: nothing in here performs I/O.

// Tagged node references, edge kinds and handles
pub mod node_ref;

// Wire-level entity and relation records
pub mod types;

// Invariant checks collecting every violation
pub mod validate;

#[cfg(test)]
pub(crate) mod fixtures;

pub use node_ref::{EdgeKind, Handle, NodeKind, NodeRef};
pub use types::{
    CanvasSnapshot, DataResource, ImplDataLink, ImplLink, Implementation, Process, ProcessEdge,
    SavedCanvas, Step, StepImplLink,
};
pub use validate::{validate, EdgeEndpoints, Violation};
