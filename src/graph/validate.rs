//! Graph invariant checks
//!
//! Validation never stops at the first problem: every violation is collected
//! so the save path can report all of them at once. Layout does not call this;
//! it tolerates transiently invalid graphs.

use crate::error::ValidationError;
use crate::graph::node_ref::{EdgeKind, NodeRef};
use crate::graph::types::CanvasSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Minimal view of an edge needed for validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeEndpoints {
    pub edge_id: String,
    pub kind: EdgeKind,
    pub source: NodeRef,
    pub target: NodeRef,
}

/// A single broken graph invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// Two nodes of the same kind share an id
    DuplicateNode { node: NodeRef },
    /// Two edges share an id
    DuplicateEdge { edge_id: String },
    /// An edge points at a node that is not on the canvas
    DanglingEndpoint { edge_id: String, endpoint: NodeRef },
    /// No edge kind may join these two node kinds
    ForbiddenEndpoints {
        edge_id: String,
        source: NodeRef,
        target: NodeRef,
    },
    /// The endpoints are legal for some edge kind, but not for this edge's kind
    KindMismatch {
        edge_id: String,
        kind: EdgeKind,
        source: NodeRef,
        target: NodeRef,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateNode { node } => write!(f, "duplicate node '{}'", node),
            Violation::DuplicateEdge { edge_id } => write!(f, "duplicate edge '{}'", edge_id),
            Violation::DanglingEndpoint { edge_id, endpoint } => {
                write!(f, "edge '{}' references missing node '{}'", edge_id, endpoint)
            }
            Violation::ForbiddenEndpoints { edge_id, source, target } => write!(
                f,
                "edge '{}' may not connect a {} to a {} ('{}' → '{}')",
                edge_id, source.kind, target.kind, source, target
            ),
            Violation::KindMismatch { edge_id, kind, source, target } => write!(
                f,
                "edge '{}' is a {} but connects '{}' → '{}'",
                edge_id, kind, source, target
            ),
        }
    }
}

/// Collect every invariant violation in a node/edge set
pub fn validate<N, E>(nodes: N, edges: E) -> Vec<Violation>
where
    N: IntoIterator<Item = NodeRef>,
    E: IntoIterator<Item = EdgeEndpoints>,
{
    let mut violations = Vec::new();

    let mut present = HashSet::new();
    for node in nodes {
        if present.contains(&node) {
            violations.push(Violation::DuplicateNode { node });
        } else {
            present.insert(node);
        }
    }

    let mut seen_edges = HashSet::new();
    for edge in edges {
        if !seen_edges.insert(edge.edge_id.clone()) {
            violations.push(Violation::DuplicateEdge {
                edge_id: edge.edge_id.clone(),
            });
        }

        for endpoint in [&edge.source, &edge.target] {
            if !present.contains(endpoint) {
                violations.push(Violation::DanglingEndpoint {
                    edge_id: edge.edge_id.clone(),
                    endpoint: endpoint.clone(),
                });
            }
        }

        match EdgeKind::between(edge.source.kind, edge.target.kind) {
            None => violations.push(Violation::ForbiddenEndpoints {
                edge_id: edge.edge_id,
                source: edge.source,
                target: edge.target,
            }),
            Some(kind) if kind != edge.kind => violations.push(Violation::KindMismatch {
                edge_id: edge.edge_id,
                kind: edge.kind,
                source: edge.source,
                target: edge.target,
            }),
            Some(_) => {}
        }
    }

    violations
}

impl CanvasSnapshot {
    /// All invariant violations of this snapshot
    pub fn violations(&self) -> Vec<Violation> {
        validate(self.node_refs(), self.edge_endpoints())
    }

    /// Reject the snapshot if any invariant is broken
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check(self.violations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;
    use crate::graph::types::{DataResource, ImplDataLink, ProcessEdge, Step, StepImplLink};

    #[test]
    fn well_formed_snapshot_has_no_violations() {
        assert!(fixtures::full_process().violations().is_empty());
        assert!(fixtures::full_process().validate().is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let mut snapshot = fixtures::chain();
        snapshot.steps.push(Step::new("a", "Duplicate A"));
        snapshot.edges.push(ProcessEdge::new("c", "ghost"));
        snapshot.data_resources.push(DataResource::new("d1", "Orders"));
        snapshot.impl_data_links.push(ImplDataLink::new("nobody", "d1"));

        let violations = snapshot.violations();
        assert_eq!(violations.len(), 3, "{:?}", violations);
        assert!(violations.contains(&Violation::DuplicateNode { node: NodeRef::step("a") }));
        assert!(violations.iter().any(|v| matches!(
            v,
            Violation::DanglingEndpoint { endpoint, .. } if *endpoint == NodeRef::step("ghost")
        )));
        assert!(violations.iter().any(|v| matches!(
            v,
            Violation::DanglingEndpoint { endpoint, .. } if *endpoint == NodeRef::implementation("nobody")
        )));

        let err = snapshot.validate().unwrap_err();
        assert_eq!(err.violations.len(), 3);
    }

    #[test]
    fn duplicate_persisted_edge_ids_are_flagged() {
        let mut snapshot = fixtures::shared_implementation();
        for link in snapshot.step_impl_links.iter_mut() {
            link.id = Some(7);
        }
        assert_eq!(
            snapshot.violations(),
            vec![Violation::DuplicateEdge { edge_id: "si-7".to_string() }]
        );
    }

    #[test]
    fn forbidden_and_mismatched_kinds_are_distinguished() {
        let nodes = vec![NodeRef::step("s"), NodeRef::implementation("i"), NodeRef::data_resource("d")];
        let edges = vec![
            EdgeEndpoints {
                edge_id: "e1".into(),
                kind: EdgeKind::ImplData,
                source: NodeRef::data_resource("d"),
                target: NodeRef::step("s"),
            },
            EdgeEndpoints {
                edge_id: "e2".into(),
                kind: EdgeKind::ImplLink,
                source: NodeRef::step("s"),
                target: NodeRef::implementation("i"),
            },
        ];
        let violations = validate(nodes, edges);
        assert!(matches!(violations[0], Violation::ForbiddenEndpoints { .. }));
        assert!(matches!(violations[1], Violation::KindMismatch { kind: EdgeKind::ImplLink, .. }));
    }

    #[test]
    fn unsaved_edges_get_positional_labels() {
        let mut snapshot = fixtures::chain();
        snapshot.step_impl_links.push(StepImplLink::new("a", "missing"));
        let violations = snapshot.violations();
        assert_eq!(
            violations,
            vec![Violation::DanglingEndpoint {
                edge_id: "si-unsaved#0".to_string(),
                endpoint: NodeRef::implementation("missing"),
            }]
        );
    }
}
