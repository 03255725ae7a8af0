//! Selection and highlight state
//!
//! Lives next to the edit session but never mutates it. Selecting, hovering
//! or clearing a selection is not an edit and never marks the canvas dirty.

use crate::graph::NodeRef;
use crate::session::edit::EditSession;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    selected_nodes: BTreeSet<NodeRef>,
    selected_edges: BTreeSet<String>,
    focus: Option<NodeRef>,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_nodes(&self) -> impl Iterator<Item = &NodeRef> {
        self.selected_nodes.iter()
    }

    pub fn selected_edges(&self) -> impl Iterator<Item = &str> {
        self.selected_edges.iter().map(String::as_str)
    }

    pub fn is_selected(&self, node: &NodeRef) -> bool {
        self.selected_nodes.contains(node)
    }

    pub fn select_node(&mut self, node: NodeRef, additive: bool) {
        if !additive {
            self.selected_nodes.clear();
            self.selected_edges.clear();
        }
        self.selected_nodes.insert(node);
    }

    pub fn select_edge(&mut self, edge_id: impl Into<String>, additive: bool) {
        if !additive {
            self.selected_nodes.clear();
            self.selected_edges.clear();
        }
        self.selected_edges.insert(edge_id.into());
    }

    pub fn clear_selection(&mut self) {
        self.selected_nodes.clear();
        self.selected_edges.clear();
    }

    /// Node whose neighbourhood is highlighted (hover or single selection)
    pub fn focus(&self) -> Option<&NodeRef> {
        self.focus.as_ref()
    }

    pub fn set_focus(&mut self, node: Option<NodeRef>) {
        self.focus = node;
    }

    /// Edge ids and neighbour nodes to highlight around the focused node
    pub fn highlighted(&self, session: &EditSession) -> (BTreeSet<String>, BTreeSet<NodeRef>) {
        let mut edges = BTreeSet::new();
        let mut nodes = BTreeSet::new();
        let Some(focus) = &self.focus else {
            return (edges, nodes);
        };

        for edge in session.edges().iter().filter(|e| e.touches(focus)) {
            edges.insert(edge.id.clone());
            let other = if edge.source == *focus { &edge.target } else { &edge.source };
            nodes.insert(other.clone());
        }
        (edges, nodes)
    }

    /// Drop references to nodes and edges that no longer exist
    pub fn retain_existing(&mut self, session: &EditSession) {
        self.selected_nodes.retain(|n| session.node(n).is_some());
        self.selected_edges.retain(|e| session.edge(e).is_some());
        if let Some(focus) = &self.focus {
            if session.node(focus).is_none() {
                self.focus = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;
    use crate::layout::LayoutEngine;

    fn session() -> EditSession {
        let snapshot = fixtures::full_process();
        let mut session = EditSession::new();
        session.load_snapshot(&snapshot, &LayoutEngine::default().layout(&snapshot));
        session
    }

    #[test]
    fn selection_does_not_touch_the_session() {
        let session = session();
        let mut presentation = Presentation::new();
        presentation.select_node(NodeRef::step("s1"), false);
        presentation.select_node(NodeRef::step("s2"), true);
        presentation.select_edge("pe-10", true);
        assert_eq!(presentation.selected_nodes().count(), 2);
        assert!(!session.is_dirty());

        presentation.select_node(NodeRef::step("s3"), false);
        assert_eq!(presentation.selected_nodes().count(), 1);
        assert_eq!(presentation.selected_edges().count(), 0);
    }

    #[test]
    fn focus_highlights_neighbourhood() {
        let session = session();
        let mut presentation = Presentation::new();
        presentation.set_focus(Some(NodeRef::implementation("i1")));
        let (edges, nodes) = presentation.highlighted(&session);
        assert_eq!(
            edges.into_iter().collect::<Vec<_>>(),
            vec!["id-40", "il-30", "si-20"]
        );
        assert!(nodes.contains(&NodeRef::step("s1")));
        assert!(nodes.contains(&NodeRef::implementation("i2")));
        assert!(nodes.contains(&NodeRef::data_resource("d1")));
    }

    #[test]
    fn removed_nodes_drop_out_of_the_selection() {
        let mut session = session();
        let mut presentation = Presentation::new();
        presentation.select_node(NodeRef::implementation("i1"), false);
        presentation.select_edge("il-30", true);
        presentation.set_focus(Some(NodeRef::implementation("i1")));

        session.remove_node(&NodeRef::implementation("i1"));
        presentation.retain_existing(&session);

        assert_eq!(presentation.selected_nodes().count(), 0);
        assert_eq!(presentation.selected_edges().count(), 0);
        assert!(presentation.focus().is_none());
    }
}
