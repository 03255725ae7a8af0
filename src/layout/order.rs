//! Topological ordering of steps
//!
//! Runs Kahn's algorithm over a petgraph view of the process edges. Unlike
//! `petgraph::algo::toposort`, a cycle does not abort the ordering: steps that
//! never reach in-degree zero are returned separately so they can still be
//! rendered after the sorted sequence.

use crate::graph::CanvasSnapshot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Step ids in layout order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOrder {
    /// Steps in a valid topological order
    pub ordered: Vec<String>,
    /// Steps stuck on or behind a cycle, in snapshot order
    pub cyclic: Vec<String>,
}

impl StepOrder {
    /// Full rendering sequence: sorted steps, then cycle members
    pub fn sequence(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().chain(self.cyclic.iter()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ordered.len() + self.cyclic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Order the snapshot's steps along its process edges
///
/// Isolated steps have in-degree zero and come first, in snapshot order.
/// Edges touching unknown steps are ignored; duplicate step ids count once.
pub fn order_steps(snapshot: &CanvasSnapshot) -> StepOrder {
    let mut graph: DiGraph<&str, ()> =
        DiGraph::with_capacity(snapshot.steps.len(), snapshot.edges.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for step in &snapshot.steps {
        let id = step.step_id.as_str();
        if !index.contains_key(id) {
            index.insert(id, graph.add_node(id));
        }
    }

    for edge in &snapshot.edges {
        let from = index.get(edge.from_step_id.as_str());
        let to = index.get(edge.to_step_id.as_str());
        if let (Some(&from), Some(&to)) = (from, to) {
            graph.add_edge(from, to, ());
        }
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|ix| graph.edges_directed(ix, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|ix| in_degree[ix.index()] == 0)
        .collect();

    let mut sorted = vec![false; graph.node_count()];
    let mut ordered = Vec::with_capacity(graph.node_count());

    while let Some(ix) = queue.pop_front() {
        sorted[ix.index()] = true;
        ordered.push(graph[ix].to_string());

        // petgraph yields outgoing edges newest-first; release in snapshot order
        let mut targets: Vec<NodeIndex> = graph
            .edges_directed(ix, Direction::Outgoing)
            .map(|edge| edge.target())
            .collect();
        targets.sort_by_key(|t| t.index());

        for target in targets {
            let degree = &mut in_degree[target.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(target);
            }
        }
    }

    let cyclic = graph
        .node_indices()
        .filter(|ix| !sorted[ix.index()])
        .map(|ix| graph[ix].to_string())
        .collect();

    StepOrder { ordered, cyclic }
}
