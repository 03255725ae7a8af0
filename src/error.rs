//! Error types for the canvas core
//!
//! Infrastructure code (storage, server wiring, replication transport) uses
//! `anyhow`; the editing core reports these typed errors so callers can tell a
//! rejected graph from a failed fetch or a failed save.

use crate::graph::validate::Violation;
use thiserror::Error;

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The graph breaks one or more invariants; every violation is listed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("graph has {} invariant violation(s): {}", .violations.len(), join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// `Ok` when the list is empty, otherwise an error carrying all of it
    pub fn check(violations: Vec<Violation>) -> Result<(), ValidationError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// Fetching a canvas snapshot failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("no canvas exists for process '{0}'")]
    NotFound(String),

    #[error("failed to fetch canvas: {0}")]
    Transport(String),

    #[error("failed to decode canvas payload: {0}")]
    Decode(String),

    /// The open canvas was edited while the fetch was outstanding
    #[error("canvas '{0}' was edited while '{1}' was loading")]
    EditedDuringLoad(String, String),
}

/// Saving a canvas failed before or during primary persistence
///
/// A secondary-store replication failure is not a `SaveError`: the primary
/// copy is persisted and the failure surfaces through sync status instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no canvas is loaded")]
    NoActiveCanvas,

    #[error("canvas changed on the server since it was loaded (loaded revision {expected:?}, current {actual:?})")]
    StaleWrite {
        expected: Option<i64>,
        actual: Option<i64>,
    },

    #[error("primary save failed: {0}")]
    Primary(String),
}

/// An editor action was refused because of session state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("canvas for process '{process_id}' has unsaved changes; confirm to discard them")]
    UnsavedChanges { process_id: String },

    #[error("no canvas is loaded")]
    NoActiveCanvas,
}

/// Any failure surfaced by the editing controller's awaited operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Save(#[from] SaveError),
}
