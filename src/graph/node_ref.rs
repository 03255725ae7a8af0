//! Node and edge identity on the canvas
//!
//! Canvas nodes are referenced by a tagged `NodeRef { kind, id }`. The prefixed
//! string form ("step-42", "impl-7", "data-orders") only exists at the
//! serialization boundary, so nothing inside the crate parses ids by prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three kinds of node that appear on a canvas
///
/// The Process itself is the canvas root record and never an edge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A business process step (top tier)
    Step,
    /// A technical implementation of one or more steps (middle tier)
    Implementation,
    /// A data resource accessed by implementations (bottom tier, always a sink)
    DataResource,
}

impl NodeKind {
    /// Prefix used for the boundary string form of a `NodeRef`
    pub fn prefix(self) -> &'static str {
        match self {
            NodeKind::Step => "step",
            NodeKind::Implementation => "impl",
            NodeKind::DataResource => "data",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "step" => Some(NodeKind::Step),
            "impl" => Some(NodeKind::Implementation),
            "data" => Some(NodeKind::DataResource),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Step => "step",
            NodeKind::Implementation => "implementation",
            NodeKind::DataResource => "data resource",
        };
        f.write_str(name)
    }
}

/// Reference to one canvas node: its kind plus its process-scoped entity id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeRef {
    pub kind: NodeKind,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn step(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Step, id)
    }

    pub fn implementation(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Implementation, id)
    }

    pub fn data_resource(id: impl Into<String>) -> Self {
        Self::new(NodeKind::DataResource, id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.id)
    }
}

/// Error for canvas ids that carry no known kind prefix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a canvas node id (expected step-*, impl-* or data-*)")]
pub struct ParseNodeRefError(pub String);

impl FromStr for NodeRef {
    type Err = ParseNodeRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('-')
            .ok_or_else(|| ParseNodeRefError(s.to_string()))?;
        let kind = NodeKind::from_prefix(prefix).ok_or_else(|| ParseNodeRefError(s.to_string()))?;
        if id.is_empty() {
            return Err(ParseNodeRefError(s.to_string()));
        }
        Ok(NodeRef::new(kind, id))
    }
}

impl TryFrom<String> for NodeRef {
    type Error = ParseNodeRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeRef> for String {
    fn from(node: NodeRef) -> Self {
        node.to_string()
    }
}

/// The four relation kinds a canvas edge can be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Step → Step control flow
    ProcessEdge,
    /// Step ↔ Implementation
    StepImpl,
    /// Implementation → DataResource access
    ImplData,
    /// Implementation → Implementation call
    ImplLink,
}

impl EdgeKind {
    /// Endpoint validity table: which edge kind, if any, joins `source` to `target`
    ///
    /// DataResource never appears as a source.
    pub fn between(source: NodeKind, target: NodeKind) -> Option<EdgeKind> {
        match (source, target) {
            (NodeKind::Step, NodeKind::Step) => Some(EdgeKind::ProcessEdge),
            (NodeKind::Step, NodeKind::Implementation) => Some(EdgeKind::StepImpl),
            (NodeKind::Implementation, NodeKind::Implementation) => Some(EdgeKind::ImplLink),
            (NodeKind::Implementation, NodeKind::DataResource) => Some(EdgeKind::ImplData),
            _ => None,
        }
    }

    /// The (source, target) node kinds this edge kind connects
    pub fn endpoint_kinds(self) -> (NodeKind, NodeKind) {
        match self {
            EdgeKind::ProcessEdge => (NodeKind::Step, NodeKind::Step),
            EdgeKind::StepImpl => (NodeKind::Step, NodeKind::Implementation),
            EdgeKind::ImplData => (NodeKind::Implementation, NodeKind::DataResource),
            EdgeKind::ImplLink => (NodeKind::Implementation, NodeKind::Implementation),
        }
    }

    /// Short prefix used for canvas edge ids ("pe-3", "si-new-…")
    pub fn prefix(self) -> &'static str {
        match self {
            EdgeKind::ProcessEdge => "pe",
            EdgeKind::StepImpl => "si",
            EdgeKind::ImplData => "id",
            EdgeKind::ImplLink => "il",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::ProcessEdge => "process edge",
            EdgeKind::StepImpl => "step-implementation link",
            EdgeKind::ImplData => "implementation-data link",
            EdgeKind::ImplLink => "implementation link",
        };
        f.write_str(name)
    }
}

/// One of the eight anchor points on a node box
///
/// Handles only steer edge routing; they carry no semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handle {
    TopIn,
    TopOut,
    BottomIn,
    BottomOut,
    LeftIn,
    LeftOut,
    RightIn,
    RightOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ref_string_form_round_trips() {
        let node = NodeRef::implementation("billing-api");
        assert_eq!(node.to_string(), "impl-billing-api");
        assert_eq!("impl-billing-api".parse::<NodeRef>().unwrap(), node);
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        assert!("proc-1".parse::<NodeRef>().is_err());
        assert!("step-".parse::<NodeRef>().is_err());
        assert!("step".parse::<NodeRef>().is_err());
    }

    #[test]
    fn data_resources_never_originate_edges() {
        for target in [NodeKind::Step, NodeKind::Implementation, NodeKind::DataResource] {
            assert_eq!(EdgeKind::between(NodeKind::DataResource, target), None);
        }
        assert_eq!(EdgeKind::between(NodeKind::Step, NodeKind::DataResource), None);
        assert_eq!(EdgeKind::between(NodeKind::Implementation, NodeKind::Step), None);
    }

    #[test]
    fn endpoint_kinds_agree_with_table() {
        for kind in [EdgeKind::ProcessEdge, EdgeKind::StepImpl, EdgeKind::ImplData, EdgeKind::ImplLink] {
            let (source, target) = kind.endpoint_kinds();
            assert_eq!(EdgeKind::between(source, target), Some(kind));
        }
    }

    #[test]
    fn handles_use_kebab_case_on_the_wire() {
        assert_eq!(serde_json::to_string(&Handle::BottomOut).unwrap(), "\"bottom-out\"");
    }
}
