//! Live, user-mutable canvas state
//!
//! Every mutation goes through `EditSession::apply`, which classifies the
//! change, updates the dirty flag and appends the command to a replayable log.
//! Invalid gestures (forbidden endpoints, unknown nodes) are rejected as
//! values rather than errors so direct-manipulation UIs never get interrupted.

use crate::graph::validate::{validate, EdgeEndpoints, Violation};
use crate::graph::{CanvasSnapshot, EdgeKind, Handle, NodeKind, NodeRef};
use crate::layout::{LayoutResult, Position};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attributes captured when a node is created on the canvas
///
/// `type_tag` maps to the step type, implementation type or resource type
/// depending on the node kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<String>,
}

/// Relation attributes carried by an edge from load to save
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    pub edge_type: Option<String>,
    pub condition: Option<String>,
    pub label: Option<String>,
    pub access_type: Option<String>,
    pub access_pattern: Option<String>,
}

/// A node as rendered on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasNode {
    pub node: NodeRef,
    pub label: String,
    pub position: Position,
    pub attributes: NodeAttributes,
}

/// An edge as rendered on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasEdge {
    /// Canvas-local id ("pe-10" for persisted edges, "e-<uuid>" for new ones)
    pub id: String,
    pub kind: EdgeKind,
    pub source: NodeRef,
    pub target: NodeRef,
    pub source_handle: Option<Handle>,
    pub target_handle: Option<Handle>,
    /// Storage id, `None` until the edge has been saved
    pub persisted_id: Option<i64>,
    pub attributes: EdgeAttributes,
}

impl CanvasEdge {
    pub fn touches(&self, node: &NodeRef) -> bool {
        self.source == *node || self.target == *node
    }

    fn joins(&self, kind: EdgeKind, source: &NodeRef, target: &NodeRef) -> bool {
        self.kind == kind && self.source == *source && self.target == *target
    }

    pub fn endpoints(&self) -> EdgeEndpoints {
        EdgeEndpoints {
            edge_id: self.id.clone(),
            kind: self.kind,
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }
}

/// Whether a change counts as an unsaved edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    /// Add, remove or replace: marks the session dirty
    Structural,
    /// Position, size or other geometry: never marks the session dirty
    Transient,
}

/// Why a command was not applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownNode(NodeRef),
    UnknownEdge(String),
    DuplicateNode(NodeRef),
    /// An edge with the same kind and endpoints already exists
    DuplicateEdge { existing: String },
    /// No edge kind may join these node kinds
    ForbiddenEndpoints { source: NodeRef, target: NodeRef },
    /// A reconnect would change the edge's kind
    KindMismatch { expected: EdgeKind, found: EdgeKind },
}

/// Result of applying one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied(ChangeClass),
    Rejected(Rejection),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied(_))
    }
}

/// A single canvas mutation
///
/// Commands carry every id they create, so replaying a log over the same
/// baseline reproduces the same session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    AddNode {
        node: NodeRef,
        label: String,
        #[serde(default)]
        attributes: NodeAttributes,
        position: Position,
    },
    RemoveNode {
        node: NodeRef,
    },
    RemoveEdge {
        edge_id: String,
    },
    Connect {
        edge_id: String,
        source: NodeRef,
        target: NodeRef,
        #[serde(default)]
        source_handle: Option<Handle>,
        #[serde(default)]
        target_handle: Option<Handle>,
    },
    Reconnect {
        edge_id: String,
        source: NodeRef,
        target: NodeRef,
        #[serde(default)]
        source_handle: Option<Handle>,
        #[serde(default)]
        target_handle: Option<Handle>,
    },
    Rename {
        node: NodeRef,
        label: String,
    },
    Reposition {
        node: NodeRef,
        position: Position,
    },
}

impl EditCommand {
    /// Change class the command has when it applies
    pub fn class(&self) -> ChangeClass {
        match self {
            EditCommand::Reposition { .. } => ChangeClass::Transient,
            _ => ChangeClass::Structural,
        }
    }
}

/// Mutable canvas state for the single active editing surface
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    nodes: Vec<CanvasNode>,
    edges: Vec<CanvasEdge>,
    dirty: bool,
    /// Load guard: while set, changes never mark the session dirty
    loading: bool,
    log: Vec<EditCommand>,
    /// Structural changes applied over the session's lifetime; never reset
    structural_edits: u64,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[CanvasNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CanvasEdge] {
        &self.edges
    }

    pub fn node(&self, node: &NodeRef) -> Option<&CanvasNode> {
        self.nodes.iter().find(|n| n.node == *node)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&CanvasEdge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Commands applied since the last load, in order
    pub fn operation_log(&self) -> &[EditCommand] {
        &self.log
    }

    /// Structural changes applied so far
    ///
    /// Compare two readings to tell whether the canvas was edited in between;
    /// transient changes and loads leave the count alone.
    pub fn structural_edits(&self) -> u64 {
        self.structural_edits
    }

    /// Open the load guard
    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Close the load guard
    pub fn end_load(&mut self) {
        self.loading = false;
    }

    /// Replace the canvas with a laid-out snapshot
    ///
    /// The structural inserts happen inside the load guard, so the session is
    /// clean afterwards and the operation log starts empty.
    pub fn load_snapshot(&mut self, snapshot: &CanvasSnapshot, layout: &LayoutResult) {
        self.begin_load();
        self.nodes.clear();
        self.edges.clear();

        for node in nodes_from_snapshot(snapshot, layout) {
            self.nodes.push(node);
        }
        for edge in edges_from_snapshot(snapshot) {
            self.edges.push(edge);
        }

        self.end_load();
        self.dirty = false;
        self.log.clear();

        tracing::debug!(
            "📥 Loaded canvas '{}' into edit session: {} nodes, {} edges",
            snapshot.process_id(),
            self.nodes.len(),
            self.edges.len()
        );
    }

    /// Give unsaved edges the storage ids a save assigned to them
    ///
    /// Edges are matched by kind and endpoints, so this works even when the
    /// session changed after the payload was built. Returns how many edges
    /// picked up an id.
    pub fn adopt_persisted_ids(&mut self, saved: &CanvasSnapshot) -> usize {
        let persisted = edges_from_snapshot(saved);
        let mut adopted = 0;
        for edge in self.edges.iter_mut().filter(|e| e.persisted_id.is_none()) {
            if let Some(stored) = persisted
                .iter()
                .find(|p| p.joins(edge.kind, &edge.source, &edge.target))
            {
                edge.persisted_id = stored.persisted_id;
                adopted += 1;
            }
        }
        adopted
    }

    /// Graph invariant violations in the current canvas
    pub fn violations(&self) -> Vec<Violation> {
        validate(
            self.nodes.iter().map(|n| n.node.clone()),
            self.edges.iter().map(CanvasEdge::endpoints),
        )
    }

    /// Single mutation entry point
    pub fn apply(&mut self, command: EditCommand) -> EditOutcome {
        let outcome = self.execute(&command);
        match &outcome {
            EditOutcome::Applied(class) => {
                if *class == ChangeClass::Structural && !self.loading {
                    self.dirty = true;
                    self.structural_edits += 1;
                }
                if !self.loading {
                    self.log.push(command);
                }
            }
            EditOutcome::Rejected(reason) => {
                tracing::debug!("🚫 Edit rejected: {:?} ({:?})", command, reason);
            }
        }
        outcome
    }

    /// Apply a sequence of commands, e.g. a recorded log over a fresh load
    pub fn replay<I>(&mut self, commands: I) -> Vec<EditOutcome>
    where
        I: IntoIterator<Item = EditCommand>,
    {
        commands.into_iter().map(|c| self.apply(c)).collect()
    }

    /// Add a new node with a freshly generated id
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        label: impl Into<String>,
        attributes: NodeAttributes,
        position: Position,
    ) -> NodeRef {
        let node = NodeRef::new(kind, Uuid::new_v4().to_string());
        self.apply(EditCommand::AddNode {
            node: node.clone(),
            label: label.into(),
            attributes,
            position,
        });
        node
    }

    pub fn remove_node(&mut self, node: &NodeRef) -> EditOutcome {
        self.apply(EditCommand::RemoveNode { node: node.clone() })
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> EditOutcome {
        self.apply(EditCommand::RemoveEdge {
            edge_id: edge_id.to_string(),
        })
    }

    /// Connect two nodes; the edge kind follows from their kinds
    pub fn connect(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        source_handle: Option<Handle>,
        target_handle: Option<Handle>,
    ) -> EditOutcome {
        self.apply(EditCommand::Connect {
            edge_id: format!("e-{}", Uuid::new_v4()),
            source: source.clone(),
            target: target.clone(),
            source_handle,
            target_handle,
        })
    }

    /// Move an existing edge to new endpoints of the same kind
    pub fn reconnect(
        &mut self,
        edge_id: &str,
        source: &NodeRef,
        target: &NodeRef,
        source_handle: Option<Handle>,
        target_handle: Option<Handle>,
    ) -> EditOutcome {
        self.apply(EditCommand::Reconnect {
            edge_id: edge_id.to_string(),
            source: source.clone(),
            target: target.clone(),
            source_handle,
            target_handle,
        })
    }

    pub fn rename(&mut self, node: &NodeRef, label: impl Into<String>) -> EditOutcome {
        self.apply(EditCommand::Rename {
            node: node.clone(),
            label: label.into(),
        })
    }

    pub fn reposition(&mut self, node: &NodeRef, position: Position) -> EditOutcome {
        self.apply(EditCommand::Reposition {
            node: node.clone(),
            position,
        })
    }

    fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.iter().any(|n| n.node == *node)
    }

    fn require_nodes(&self, source: &NodeRef, target: &NodeRef) -> Result<(), Rejection> {
        for node in [source, target] {
            if !self.contains(node) {
                return Err(Rejection::UnknownNode(node.clone()));
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: &EditCommand) -> EditOutcome {
        match self.try_execute(command) {
            Ok(class) => EditOutcome::Applied(class),
            Err(reason) => EditOutcome::Rejected(reason),
        }
    }

    fn try_execute(&mut self, command: &EditCommand) -> Result<ChangeClass, Rejection> {
        match command {
            EditCommand::AddNode {
                node,
                label,
                attributes,
                position,
            } => {
                if self.contains(node) {
                    return Err(Rejection::DuplicateNode(node.clone()));
                }
                self.nodes.push(CanvasNode {
                    node: node.clone(),
                    label: label.clone(),
                    position: *position,
                    attributes: attributes.clone(),
                });
                Ok(ChangeClass::Structural)
            }

            EditCommand::RemoveNode { node } => {
                if !self.contains(node) {
                    return Err(Rejection::UnknownNode(node.clone()));
                }
                self.nodes.retain(|n| n.node != *node);
                let before = self.edges.len();
                self.edges.retain(|e| !e.touches(node));
                tracing::debug!(
                    "🗑️ Removed node '{}' and {} attached edge(s)",
                    node,
                    before - self.edges.len()
                );
                Ok(ChangeClass::Structural)
            }

            EditCommand::RemoveEdge { edge_id } => {
                let index = self
                    .edges
                    .iter()
                    .position(|e| e.id == *edge_id)
                    .ok_or_else(|| Rejection::UnknownEdge(edge_id.clone()))?;
                self.edges.remove(index);
                Ok(ChangeClass::Structural)
            }

            EditCommand::Connect {
                edge_id,
                source,
                target,
                source_handle,
                target_handle,
            } => {
                self.require_nodes(source, target)?;
                let kind = EdgeKind::between(source.kind, target.kind).ok_or_else(|| {
                    Rejection::ForbiddenEndpoints {
                        source: source.clone(),
                        target: target.clone(),
                    }
                })?;
                if let Some(existing) = self.edges.iter().find(|e| e.joins(kind, source, target)) {
                    return Err(Rejection::DuplicateEdge {
                        existing: existing.id.clone(),
                    });
                }
                if self.edges.iter().any(|e| e.id == *edge_id) {
                    return Err(Rejection::DuplicateEdge {
                        existing: edge_id.clone(),
                    });
                }
                self.edges.push(CanvasEdge {
                    id: edge_id.clone(),
                    kind,
                    source: source.clone(),
                    target: target.clone(),
                    source_handle: *source_handle,
                    target_handle: *target_handle,
                    persisted_id: None,
                    attributes: EdgeAttributes::default(),
                });
                Ok(ChangeClass::Structural)
            }

            EditCommand::Reconnect {
                edge_id,
                source,
                target,
                source_handle,
                target_handle,
            } => {
                let index = self
                    .edges
                    .iter()
                    .position(|e| e.id == *edge_id)
                    .ok_or_else(|| Rejection::UnknownEdge(edge_id.clone()))?;
                self.require_nodes(source, target)?;
                let expected = self.edges[index].kind;
                let found = EdgeKind::between(source.kind, target.kind).ok_or_else(|| {
                    Rejection::ForbiddenEndpoints {
                        source: source.clone(),
                        target: target.clone(),
                    }
                })?;
                if found != expected {
                    return Err(Rejection::KindMismatch { expected, found });
                }
                if let Some(existing) = self
                    .edges
                    .iter()
                    .find(|e| e.id != *edge_id && e.joins(expected, source, target))
                {
                    return Err(Rejection::DuplicateEdge {
                        existing: existing.id.clone(),
                    });
                }

                let edge = &mut self.edges[index];
                edge.source = source.clone();
                edge.target = target.clone();
                edge.source_handle = *source_handle;
                edge.target_handle = *target_handle;
                Ok(ChangeClass::Structural)
            }

            EditCommand::Rename { node, label } => {
                let existing = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.node == *node)
                    .ok_or_else(|| Rejection::UnknownNode(node.clone()))?;
                if existing.label == *label {
                    return Ok(ChangeClass::Transient);
                }
                existing.label = label.clone();
                Ok(ChangeClass::Structural)
            }

            EditCommand::Reposition { node, position } => {
                let existing = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.node == *node)
                    .ok_or_else(|| Rejection::UnknownNode(node.clone()))?;
                existing.position = *position;
                Ok(ChangeClass::Transient)
            }
        }
    }
}

fn nodes_from_snapshot(snapshot: &CanvasSnapshot, layout: &LayoutResult) -> Vec<CanvasNode> {
    let place = |node: &NodeRef| layout.position(node).copied().unwrap_or_default();
    let mut nodes = Vec::with_capacity(snapshot.node_count());

    for step in &snapshot.steps {
        let node = NodeRef::step(step.step_id.as_str());
        nodes.push(CanvasNode {
            position: place(&node),
            node,
            label: step.name.clone(),
            attributes: NodeAttributes {
                description: step.description.clone(),
                type_tag: step.step_type.clone(),
                ..NodeAttributes::default()
            },
        });
    }
    for implementation in &snapshot.implementations {
        let node = NodeRef::implementation(implementation.impl_id.as_str());
        nodes.push(CanvasNode {
            position: place(&node),
            node,
            label: implementation.name.clone(),
            attributes: NodeAttributes {
                type_tag: implementation.impl_type.clone(),
                system: implementation.system.clone(),
                code_ref: implementation.code_ref.clone(),
                ..NodeAttributes::default()
            },
        });
    }
    for resource in &snapshot.data_resources {
        let node = NodeRef::data_resource(resource.resource_id.as_str());
        nodes.push(CanvasNode {
            position: place(&node),
            node,
            label: resource.name.clone(),
            attributes: NodeAttributes {
                description: resource.description.clone(),
                type_tag: resource.resource_type.clone(),
                system: resource.system.clone(),
                ..NodeAttributes::default()
            },
        });
    }
    nodes
}

fn canvas_edge_id(kind: EdgeKind, persisted: Option<i64>, index: usize) -> String {
    match persisted {
        Some(id) => format!("{}-{}", kind.prefix(), id),
        None => format!("{}-unsaved-{}", kind.prefix(), index),
    }
}

fn edges_from_snapshot(snapshot: &CanvasSnapshot) -> Vec<CanvasEdge> {
    let mut edges = Vec::with_capacity(snapshot.edge_count());

    for (i, e) in snapshot.edges.iter().enumerate() {
        edges.push(CanvasEdge {
            id: canvas_edge_id(EdgeKind::ProcessEdge, e.id, i),
            kind: EdgeKind::ProcessEdge,
            source: NodeRef::step(e.from_step_id.as_str()),
            target: NodeRef::step(e.to_step_id.as_str()),
            source_handle: e.source_handle,
            target_handle: e.target_handle,
            persisted_id: e.id,
            attributes: EdgeAttributes {
                edge_type: e.edge_type.clone(),
                condition: e.condition.clone(),
                label: e.label.clone(),
                ..EdgeAttributes::default()
            },
        });
    }
    for (i, l) in snapshot.step_impl_links.iter().enumerate() {
        edges.push(CanvasEdge {
            id: canvas_edge_id(EdgeKind::StepImpl, l.id, i),
            kind: EdgeKind::StepImpl,
            source: NodeRef::step(l.step_id.as_str()),
            target: NodeRef::implementation(l.impl_id.as_str()),
            source_handle: l.step_handle,
            target_handle: l.impl_handle,
            persisted_id: l.id,
            attributes: EdgeAttributes::default(),
        });
    }
    for (i, l) in snapshot.impl_data_links.iter().enumerate() {
        edges.push(CanvasEdge {
            id: canvas_edge_id(EdgeKind::ImplData, l.id, i),
            kind: EdgeKind::ImplData,
            source: NodeRef::implementation(l.impl_id.as_str()),
            target: NodeRef::data_resource(l.resource_id.as_str()),
            source_handle: l.impl_handle,
            target_handle: l.resource_handle,
            persisted_id: l.id,
            attributes: EdgeAttributes {
                access_type: l.access_type.clone(),
                access_pattern: l.access_pattern.clone(),
                ..EdgeAttributes::default()
            },
        });
    }
    for (i, l) in snapshot.impl_links.iter().enumerate() {
        edges.push(CanvasEdge {
            id: canvas_edge_id(EdgeKind::ImplLink, l.id, i),
            kind: EdgeKind::ImplLink,
            source: NodeRef::implementation(l.from_impl_id.as_str()),
            target: NodeRef::implementation(l.to_impl_id.as_str()),
            source_handle: l.source_handle,
            target_handle: l.target_handle,
            persisted_id: l.id,
            attributes: EdgeAttributes {
                edge_type: l.edge_type.clone(),
                condition: l.condition.clone(),
                label: l.label.clone(),
                ..EdgeAttributes::default()
            },
        });
    }
    edges
}
