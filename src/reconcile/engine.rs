//! Reconciliation of session edits against the baseline snapshot
//!
//! The payload is the full desired end state: anything missing from it is
//! deleted by the primary store on save.

use crate::error::ValidationError;
use crate::graph::{
    CanvasSnapshot, DataResource, EdgeKind, ImplDataLink, ImplLink, Implementation, NodeKind,
    ProcessEdge, Step, StepImplLink,
};
use crate::session::{CanvasEdge, CanvasNode, EditSession};
use std::collections::HashMap;

/// Baseline records indexed by id, per node kind
struct BaselineIndex<'a> {
    steps: HashMap<&'a str, &'a Step>,
    implementations: HashMap<&'a str, &'a Implementation>,
    data_resources: HashMap<&'a str, &'a DataResource>,
}

impl<'a> BaselineIndex<'a> {
    fn new(baseline: &'a CanvasSnapshot) -> Self {
        let mut index = Self {
            steps: HashMap::new(),
            implementations: HashMap::new(),
            data_resources: HashMap::new(),
        };
        for step in &baseline.steps {
            index.steps.entry(step.step_id.as_str()).or_insert(step);
        }
        for implementation in &baseline.implementations {
            index
                .implementations
                .entry(implementation.impl_id.as_str())
                .or_insert(implementation);
        }
        for resource in &baseline.data_resources {
            index
                .data_resources
                .entry(resource.resource_id.as_str())
                .or_insert(resource);
        }
        index
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Build the save payload for `session`
    ///
    /// Fails with every invariant violation when the session graph is invalid.
    /// Unchanged nodes reuse their baseline record as-is, so reconciling a
    /// freshly loaded session reproduces the baseline exactly.
    pub fn reconcile(
        &self,
        session: &EditSession,
        baseline: &CanvasSnapshot,
    ) -> Result<CanvasSnapshot, ValidationError> {
        ValidationError::check(session.violations())?;

        let index = BaselineIndex::new(baseline);
        let mut payload = CanvasSnapshot::new(baseline.process.clone());
        payload.revision = baseline.revision;

        let mut reused = 0usize;
        for node in session.nodes() {
            let id = node.node.id.as_str();
            match node.node.kind {
                NodeKind::Step => {
                    let record = match index.steps.get(id) {
                        Some(existing) => {
                            reused += 1;
                            Step {
                                name: node.label.clone(),
                                ..(*existing).clone()
                            }
                        }
                        None => new_step(node),
                    };
                    payload.steps.push(record);
                }
                NodeKind::Implementation => {
                    let record = match index.implementations.get(id) {
                        Some(existing) => {
                            reused += 1;
                            Implementation {
                                name: node.label.clone(),
                                ..(*existing).clone()
                            }
                        }
                        None => new_implementation(node),
                    };
                    payload.implementations.push(record);
                }
                NodeKind::DataResource => {
                    let record = match index.data_resources.get(id) {
                        Some(existing) => {
                            reused += 1;
                            DataResource {
                                name: node.label.clone(),
                                ..(*existing).clone()
                            }
                        }
                        None => new_data_resource(node),
                    };
                    payload.data_resources.push(record);
                }
            }
        }

        for edge in session.edges() {
            match edge.kind {
                EdgeKind::ProcessEdge => payload.edges.push(process_edge(edge)),
                EdgeKind::StepImpl => payload.step_impl_links.push(step_impl_link(edge)),
                EdgeKind::ImplData => payload.impl_data_links.push(impl_data_link(edge)),
                EdgeKind::ImplLink => payload.impl_links.push(impl_link(edge)),
            }
        }

        tracing::debug!(
            "🧩 Reconciled canvas '{}': {} nodes ({} from baseline, {} new), {} edges",
            payload.process_id(),
            payload.node_count(),
            reused,
            payload.node_count() - reused,
            payload.edge_count()
        );

        Ok(payload)
    }
}

fn new_step(node: &CanvasNode) -> Step {
    Step {
        description: node.attributes.description.clone(),
        step_type: node.attributes.type_tag.clone(),
        ..Step::new(node.node.id.as_str(), node.label.as_str())
    }
}

fn new_implementation(node: &CanvasNode) -> Implementation {
    Implementation {
        impl_type: node.attributes.type_tag.clone(),
        system: node.attributes.system.clone(),
        code_ref: node.attributes.code_ref.clone(),
        ..Implementation::new(node.node.id.as_str(), node.label.as_str())
    }
}

fn new_data_resource(node: &CanvasNode) -> DataResource {
    DataResource {
        resource_type: node.attributes.type_tag.clone(),
        system: node.attributes.system.clone(),
        description: node.attributes.description.clone(),
        ..DataResource::new(node.node.id.as_str(), node.label.as_str())
    }
}

fn process_edge(edge: &CanvasEdge) -> ProcessEdge {
    ProcessEdge {
        id: edge.persisted_id,
        from_step_id: edge.source.id.clone(),
        to_step_id: edge.target.id.clone(),
        edge_type: edge.attributes.edge_type.clone(),
        condition: edge.attributes.condition.clone(),
        label: edge.attributes.label.clone(),
        source_handle: edge.source_handle,
        target_handle: edge.target_handle,
    }
}

/// Step and implementation sides are picked by node kind, not edge direction
fn step_impl_link(edge: &CanvasEdge) -> StepImplLink {
    let (step, step_handle, implementation, impl_handle) = if edge.source.kind == NodeKind::Step {
        (&edge.source, edge.source_handle, &edge.target, edge.target_handle)
    } else {
        (&edge.target, edge.target_handle, &edge.source, edge.source_handle)
    };
    StepImplLink {
        id: edge.persisted_id,
        step_id: step.id.clone(),
        impl_id: implementation.id.clone(),
        step_handle,
        impl_handle,
    }
}

fn impl_data_link(edge: &CanvasEdge) -> ImplDataLink {
    ImplDataLink {
        id: edge.persisted_id,
        impl_id: edge.source.id.clone(),
        resource_id: edge.target.id.clone(),
        access_type: edge.attributes.access_type.clone(),
        access_pattern: edge.attributes.access_pattern.clone(),
        impl_handle: edge.source_handle,
        resource_handle: edge.target_handle,
    }
}

fn impl_link(edge: &CanvasEdge) -> ImplLink {
    ImplLink {
        id: edge.persisted_id,
        from_impl_id: edge.source.id.clone(),
        to_impl_id: edge.target.id.clone(),
        edge_type: edge.attributes.edge_type.clone(),
        condition: edge.attributes.condition.clone(),
        label: edge.attributes.label.clone(),
        source_handle: edge.source_handle,
        target_handle: edge.target_handle,
    }
}
