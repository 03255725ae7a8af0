//! Canvas entity and relation records
//!
//! These are the wire-level records exchanged with `GET/PUT /canvas/{process_id}`
//! and stored as the JSON definition of a canvas. A `CanvasSnapshot` is always
//! the complete graph of one process.

use crate::graph::node_ref::{EdgeKind, Handle, NodeRef};
use crate::graph::validate::EdgeEndpoints;
use crate::sync::SyncResult;
use serde::{Deserialize, Serialize};

/// Root record of a canvas (one per canvas, never an edge endpoint)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Process identifier (e.g., "proc-onboarding")
    pub process_id: String,
    /// Human-readable process name
    pub name: String,
    /// Business channel the process serves (e.g., "web", "branch")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entry points into the process (step ids or external triggers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoints: Option<Vec<String>>,
}

impl Process {
    pub fn new(process_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            name: name.into(),
            channel: None,
            description: None,
            entrypoints: None,
        }
    }
}

/// A business step (top tier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form step classification (e.g., "manual", "automated", "decision")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
}

impl Step {
    pub fn new(step_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            name: name.into(),
            description: None,
            step_type: None,
        }
    }
}

/// A technical implementation of one or more steps (middle tier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub impl_id: String,
    pub name: String,
    /// Implementation type (e.g., "api", "job", "ui")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub impl_type: Option<String>,
    /// Owning system tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Pointer into source code (path, symbol or URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<String>,
}

impl Implementation {
    pub fn new(impl_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            impl_id: impl_id.into(),
            name: name.into(),
            impl_type: None,
            system: None,
            code_ref: None,
        }
    }
}

/// A data resource (bottom tier, always a sink)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResource {
    pub resource_id: String,
    pub name: String,
    /// Resource type (e.g., "table", "topic", "bucket")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DataResource {
    pub fn new(resource_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            name: name.into(),
            resource_type: None,
            system: None,
            description: None,
        }
    }
}

/// Step → Step control flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEdge {
    /// Persisted identifier, `None` until first saved
    #[serde(default)]
    pub id: Option<i64>,
    pub from_step_id: String,
    pub to_step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<Handle>,
}

impl ProcessEdge {
    pub fn new(from_step_id: impl Into<String>, to_step_id: impl Into<String>) -> Self {
        Self {
            id: None,
            from_step_id: from_step_id.into(),
            to_step_id: to_step_id.into(),
            edge_type: None,
            condition: None,
            label: None,
            source_handle: None,
            target_handle: None,
        }
    }
}

/// Step ↔ Implementation, stored as a fixed step/impl pair
///
/// Handles are stored per side (step side, implementation side), never per
/// edge direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepImplLink {
    #[serde(default)]
    pub id: Option<i64>,
    pub step_id: String,
    pub impl_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_handle: Option<Handle>,
}

impl StepImplLink {
    pub fn new(step_id: impl Into<String>, impl_id: impl Into<String>) -> Self {
        Self {
            id: None,
            step_id: step_id.into(),
            impl_id: impl_id.into(),
            step_handle: None,
            impl_handle: None,
        }
    }
}

/// Implementation → DataResource access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplDataLink {
    #[serde(default)]
    pub id: Option<i64>,
    pub impl_id: String,
    pub resource_id: String,
    /// e.g., "read", "write", "read_write"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    /// e.g., "batch", "point_lookup", "stream"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_handle: Option<Handle>,
}

impl ImplDataLink {
    pub fn new(impl_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            id: None,
            impl_id: impl_id.into(),
            resource_id: resource_id.into(),
            access_type: None,
            access_pattern: None,
            impl_handle: None,
            resource_handle: None,
        }
    }
}

/// Implementation → Implementation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplLink {
    #[serde(default)]
    pub id: Option<i64>,
    pub from_impl_id: String,
    pub to_impl_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<Handle>,
}

impl ImplLink {
    pub fn new(from_impl_id: impl Into<String>, to_impl_id: impl Into<String>) -> Self {
        Self {
            id: None,
            from_impl_id: from_impl_id.into(),
            to_impl_id: to_impl_id.into(),
            edge_type: None,
            condition: None,
            label: None,
            source_handle: None,
            target_handle: None,
        }
    }
}

/// The complete graph of one process
///
/// Same shape for the `GET /canvas` response, the `PUT /canvas` body and the
/// AI skeleton generator's output. Persistence is always a whole-snapshot
/// replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub process: Process,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Process edges (Step → Step)
    #[serde(default)]
    pub edges: Vec<ProcessEdge>,
    #[serde(default)]
    pub implementations: Vec<Implementation>,
    #[serde(default)]
    pub step_impl_links: Vec<StepImplLink>,
    #[serde(default)]
    pub data_resources: Vec<DataResource>,
    #[serde(default)]
    pub impl_data_links: Vec<ImplDataLink>,
    #[serde(default)]
    pub impl_links: Vec<ImplLink>,
    /// Storage revision this snapshot was read at (absent on unsaved drafts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

impl CanvasSnapshot {
    /// Empty canvas for a process
    pub fn new(process: Process) -> Self {
        Self {
            process,
            steps: Vec::new(),
            edges: Vec::new(),
            implementations: Vec::new(),
            step_impl_links: Vec::new(),
            data_resources: Vec::new(),
            impl_data_links: Vec::new(),
            impl_links: Vec::new(),
            revision: None,
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process.process_id
    }

    /// Every node reference, in tier order (steps, implementations, data resources)
    pub fn node_refs(&self) -> impl Iterator<Item = NodeRef> + '_ {
        let steps = self.steps.iter().map(|s| NodeRef::step(s.step_id.as_str()));
        let impls = self
            .implementations
            .iter()
            .map(|i| NodeRef::implementation(i.impl_id.as_str()));
        let data = self
            .data_resources
            .iter()
            .map(|d| NodeRef::data_resource(d.resource_id.as_str()));
        steps.chain(impls).chain(data)
    }

    /// Endpoints of every relation, used by graph validation
    ///
    /// Edges without a persisted id get a positional label so violations can
    /// still name them.
    pub fn edge_endpoints(&self) -> Vec<EdgeEndpoints> {
        fn label(kind: EdgeKind, id: Option<i64>, index: usize) -> String {
            match id {
                Some(id) => format!("{}-{}", kind.prefix(), id),
                None => format!("{}-unsaved#{}", kind.prefix(), index),
            }
        }

        let mut endpoints = Vec::with_capacity(self.edge_count());
        for (i, e) in self.edges.iter().enumerate() {
            endpoints.push(EdgeEndpoints {
                edge_id: label(EdgeKind::ProcessEdge, e.id, i),
                kind: EdgeKind::ProcessEdge,
                source: NodeRef::step(e.from_step_id.as_str()),
                target: NodeRef::step(e.to_step_id.as_str()),
            });
        }
        for (i, l) in self.step_impl_links.iter().enumerate() {
            endpoints.push(EdgeEndpoints {
                edge_id: label(EdgeKind::StepImpl, l.id, i),
                kind: EdgeKind::StepImpl,
                source: NodeRef::step(l.step_id.as_str()),
                target: NodeRef::implementation(l.impl_id.as_str()),
            });
        }
        for (i, l) in self.impl_data_links.iter().enumerate() {
            endpoints.push(EdgeEndpoints {
                edge_id: label(EdgeKind::ImplData, l.id, i),
                kind: EdgeKind::ImplData,
                source: NodeRef::implementation(l.impl_id.as_str()),
                target: NodeRef::data_resource(l.resource_id.as_str()),
            });
        }
        for (i, l) in self.impl_links.iter().enumerate() {
            endpoints.push(EdgeEndpoints {
                edge_id: label(EdgeKind::ImplLink, l.id, i),
                kind: EdgeKind::ImplLink,
                source: NodeRef::implementation(l.from_impl_id.as_str()),
                target: NodeRef::implementation(l.to_impl_id.as_str()),
            });
        }
        endpoints
    }

    pub fn node_count(&self) -> usize {
        self.steps.len() + self.implementations.len() + self.data_resources.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
            + self.step_impl_links.len()
            + self.impl_data_links.len()
            + self.impl_links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }
}

/// `PUT /canvas/{process_id}` response: the persisted snapshot plus the
/// secondary-store replication outcome when it ran inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCanvas {
    #[serde(flatten)]
    pub snapshot: CanvasSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_result: Option<SyncResult>,
}
