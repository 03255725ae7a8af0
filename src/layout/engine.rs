//! Deterministic three-tier canvas layout
//!
//! Steps run left to right in topological order on the top tier.
//! Implementations are centered under the steps they implement on the middle
//! tier, data resources under their implementations on the bottom tier. Within
//! a tier, every candidate position is swept rightward until it clears all
//! boxes already placed, so siblings never overlap.

use crate::graph::{CanvasSnapshot, NodeKind, NodeRef};
use crate::layout::order::{order_steps, StepOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Top-left x, tier y and box width of a laid-out node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, width: f64) -> Self {
        Self { x, y, width }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn mid_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Whether the horizontal ranges `[x, x + width]` of two boxes intersect
    pub fn overlaps_horizontally(&self, other: &Position) -> bool {
        self.x < other.right() && self.right() > other.x
    }
}

/// Inclusive bounds for a box width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidthRange {
    pub min: f64,
    pub max: f64,
}

impl WidthRange {
    fn clamp(&self, width: f64) -> f64 {
        width.max(self.min).min(self.max)
    }
}

/// Geometry constants for the layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Estimated width of one label character
    pub char_width: f64,
    /// Horizontal padding added around the label
    pub label_padding: f64,
    pub step_width: WidthRange,
    pub implementation_width: WidthRange,
    pub data_resource_width: WidthRange,
    /// Fixed part of the gap after a step
    pub step_gap: f64,
    /// Share of a step's width added to the gap after it
    pub step_gap_ratio: f64,
    /// Gap between siblings in the implementation and data tiers
    pub sibling_gap: f64,
    /// Increment of the collision sweep
    pub collision_step: f64,
    pub node_height: f64,
    /// Vertical gap between tiers
    pub tier_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            label_padding: 32.0,
            step_width: WidthRange { min: 160.0, max: 320.0 },
            implementation_width: WidthRange { min: 140.0, max: 280.0 },
            data_resource_width: WidthRange { min: 140.0, max: 260.0 },
            step_gap: 48.0,
            step_gap_ratio: 0.25,
            sibling_gap: 24.0,
            collision_step: 20.0,
            node_height: 64.0,
            tier_gap: 120.0,
        }
    }
}

impl LayoutConfig {
    /// Vertical band of a tier
    pub fn tier_y(&self, kind: NodeKind) -> f64 {
        let band = self.node_height + self.tier_gap;
        match kind {
            NodeKind::Step => 0.0,
            NodeKind::Implementation => band,
            NodeKind::DataResource => band * 2.0,
        }
    }

    /// Box width for a label, clamped to the tier's range
    pub fn box_width(&self, kind: NodeKind, label: &str) -> f64 {
        let raw = label.chars().count() as f64 * self.char_width + self.label_padding;
        let range = match kind {
            NodeKind::Step => self.step_width,
            NodeKind::Implementation => self.implementation_width,
            NodeKind::DataResource => self.data_resource_width,
        };
        range.clamp(raw)
    }

    /// Gap after a step box; wider boxes get more room
    pub fn gap_after_step(&self, width: f64) -> f64 {
        self.step_gap + width * self.step_gap_ratio
    }
}

/// Output of a layout pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub positions: BTreeMap<NodeRef, Position>,
    /// Step ids left to right
    pub step_order: Vec<String>,
    /// Steps that sit on or behind a process-edge cycle (rendered last)
    pub cyclic_steps: Vec<String>,
}

impl LayoutResult {
    pub fn position(&self, node: &NodeRef) -> Option<&Position> {
        self.positions.get(node)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions of one tier, left to right
    pub fn tier(&self, kind: NodeKind) -> Vec<(&NodeRef, &Position)> {
        let mut tier: Vec<_> = self.positions.iter().filter(|(n, _)| n.kind == kind).collect();
        tier.sort_by(|a, b| a.1.x.total_cmp(&b.1.x));
        tier
    }
}

/// Midpoints and ordering of the tier above the one being placed
struct Anchors<'a> {
    mid: HashMap<&'a str, f64>,
    rank: HashMap<&'a str, usize>,
}

impl<'a> Anchors<'a> {
    fn from_sequence(ids: &[&'a str], positions: &BTreeMap<NodeRef, Position>, kind: NodeKind) -> Self {
        let mut mid = HashMap::new();
        let mut rank = HashMap::new();
        for (i, id) in ids.iter().enumerate() {
            if let Some(position) = positions.get(&NodeRef::new(kind, *id)) {
                mid.insert(*id, position.mid_x());
                rank.insert(*id, i);
            }
        }
        Self { mid, rank }
    }
}

/// Pure, side-effect free layout of a canvas snapshot
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lay out every node of the snapshot
    ///
    /// Identical snapshots always produce identical results. Invalid graphs
    /// (dangling links, duplicates) are laid out as far as they make sense.
    pub fn layout(&self, snapshot: &CanvasSnapshot) -> LayoutResult {
        let order = order_steps(snapshot);
        if !order.cyclic.is_empty() {
            tracing::warn!(
                "🔁 Process '{}' has {} step(s) on a process-edge cycle; placing them after the sorted steps: {:?}",
                snapshot.process_id(),
                order.cyclic.len(),
                order.cyclic
            );
        }

        let mut positions = BTreeMap::new();
        let step_sequence = self.place_steps(snapshot, &order, &mut positions);

        let step_anchors = Anchors::from_sequence(&step_sequence, &positions, NodeKind::Step);
        let implementations: Vec<(&str, &str)> = snapshot
            .implementations
            .iter()
            .map(|i| (i.impl_id.as_str(), i.name.as_str()))
            .collect();
        let step_links: Vec<(&str, &str)> = snapshot
            .step_impl_links
            .iter()
            .map(|l| (l.step_id.as_str(), l.impl_id.as_str()))
            .collect();
        let impl_sequence = self.place_tier(
            NodeKind::Implementation,
            &implementations,
            &step_links,
            &step_anchors,
            &mut positions,
        );

        let impl_anchors =
            Anchors::from_sequence(&impl_sequence, &positions, NodeKind::Implementation);
        let resources: Vec<(&str, &str)> = snapshot
            .data_resources
            .iter()
            .map(|d| (d.resource_id.as_str(), d.name.as_str()))
            .collect();
        let data_links: Vec<(&str, &str)> = snapshot
            .impl_data_links
            .iter()
            .map(|l| (l.impl_id.as_str(), l.resource_id.as_str()))
            .collect();
        self.place_tier(
            NodeKind::DataResource,
            &resources,
            &data_links,
            &impl_anchors,
            &mut positions,
        );

        tracing::debug!(
            "📐 Laid out process '{}': {} nodes ({} steps, {} cyclic)",
            snapshot.process_id(),
            positions.len(),
            order.len(),
            order.cyclic.len()
        );

        LayoutResult {
            positions,
            step_order: order.sequence().map(str::to_string).collect(),
            cyclic_steps: order.cyclic,
        }
    }

    /// Steps left to right, each followed by a width-dependent gap
    fn place_steps<'a>(
        &self,
        snapshot: &'a CanvasSnapshot,
        order: &StepOrder,
        positions: &mut BTreeMap<NodeRef, Position>,
    ) -> Vec<&'a str> {
        let mut labels: HashMap<&str, &'a str> = HashMap::new();
        let mut ids: HashMap<&str, &'a str> = HashMap::new();
        for step in &snapshot.steps {
            labels.entry(step.step_id.as_str()).or_insert(step.name.as_str());
            ids.entry(step.step_id.as_str()).or_insert(step.step_id.as_str());
        }

        let y = self.config.tier_y(NodeKind::Step);
        let mut x = 0.0;
        let mut sequence = Vec::with_capacity(order.len());
        for id in order.sequence() {
            let (Some(&label), Some(&id)) = (labels.get(id), ids.get(id)) else {
                continue;
            };
            let width = self.config.box_width(NodeKind::Step, label);
            positions.insert(NodeRef::step(id), Position::new(x, y, width));
            sequence.push(id);
            x += width + self.config.gap_after_step(width);
        }
        sequence
    }

    /// Place one lower tier under its anchors
    ///
    /// `nodes` are (id, label) pairs in snapshot order, `links` are
    /// (parent, child) pairs. Each child is owned by its earliest-ranked
    /// parent and centered on the mean midpoint of all its parents, so a node
    /// shared by several parents sits once, between them. Children without a
    /// placed parent are packed to the right of everything else. Returns the
    /// placement order.
    fn place_tier<'a>(
        &self,
        kind: NodeKind,
        nodes: &[(&'a str, &'a str)],
        links: &[(&'a str, &'a str)],
        anchors: &Anchors<'a>,
        positions: &mut BTreeMap<NodeRef, Position>,
    ) -> Vec<&'a str> {
        let y = self.config.tier_y(kind);
        let gap = self.config.sibling_gap;

        let mut labels: HashMap<&str, &str> = HashMap::new();
        for (id, label) in nodes {
            labels.entry(*id).or_insert(*label);
        }

        let mut parents_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for (parent, child) in links {
            if !anchors.mid.contains_key(parent) || !labels.contains_key(child) {
                continue;
            }
            let parents = parents_of.entry(*child).or_default();
            if !parents.contains(parent) {
                parents.push(*parent);
            }
        }

        let owner_rank = |child: &str| -> Option<usize> {
            parents_of
                .get(child)?
                .iter()
                .filter_map(|p| anchors.rank.get(p).copied())
                .min()
        };

        let mut groups: BTreeMap<usize, Vec<&'a str>> = BTreeMap::new();
        let mut grouped: HashSet<&str> = HashSet::new();
        for (parent, child) in links {
            let (Some(parent_rank), Some(rank)) = (anchors.rank.get(parent), owner_rank(*child)) else {
                continue;
            };
            if *parent_rank == rank && grouped.insert(*child) {
                groups.entry(rank).or_default().push(*child);
            }
        }

        let mut occupied: Vec<(f64, f64)> = Vec::new();
        let mut sequence = Vec::with_capacity(labels.len());

        for group in groups.values() {
            let widths: Vec<f64> = group
                .iter()
                .map(|child| self.config.box_width(kind, labels[child]))
                .collect();
            let total = widths.iter().sum::<f64>() + gap * (widths.len().saturating_sub(1)) as f64;

            let anchor = group
                .iter()
                .map(|child| {
                    let parents = &parents_of[child];
                    parents.iter().map(|p| anchors.mid[p]).sum::<f64>() / parents.len() as f64
                })
                .sum::<f64>()
                / group.len() as f64;

            let mut cursor = anchor - total / 2.0;
            for (child, width) in group.iter().zip(widths) {
                let x = self.settle(cursor, width, &occupied);
                occupied.push((x, x + width));
                positions.insert(NodeRef::new(kind, *child), Position::new(x, y, width));
                sequence.push(*child);
                cursor = x + width + gap;
            }
        }

        let mut cursor = occupied
            .iter()
            .map(|(_, end)| *end + gap)
            .fold(None, |acc: Option<f64>, end| Some(acc.map_or(end, |a| a.max(end))))
            .unwrap_or(0.0);
        for (id, label) in nodes {
            if grouped.contains(id) || sequence.contains(id) {
                continue;
            }
            let width = self.config.box_width(kind, label);
            let x = self.settle(cursor, width, &occupied);
            occupied.push((x, x + width));
            positions.insert(NodeRef::new(kind, *id), Position::new(x, y, width));
            sequence.push(*id);
            cursor = x + width + gap;
        }

        sequence
    }

    /// Sweep `x` rightward until `[x, x + width]` clears every occupied range
    fn settle(&self, mut x: f64, width: f64, occupied: &[(f64, f64)]) -> f64 {
        let step = self.config.collision_step.max(1.0);
        while occupied.iter().any(|&(start, end)| x < end && x + width > start) {
            x += step;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{fixtures, Implementation, Process, Step, StepImplLink};

    fn engine() -> LayoutEngine {
        LayoutEngine::default()
    }

    #[test]
    fn empty_graph_has_no_positions() {
        let result = engine().layout(&CanvasSnapshot::new(Process::new("p", "Empty")));
        assert!(result.is_empty());
        assert!(result.step_order.is_empty());
    }

    #[test]
    fn simple_chain_runs_left_to_right() {
        let result = engine().layout(&fixtures::chain());
        assert_eq!(result.step_order, vec!["a", "b", "c"]);

        let a = result.position(&NodeRef::step("a")).unwrap();
        let b = result.position(&NodeRef::step("b")).unwrap();
        let c = result.position(&NodeRef::step("c")).unwrap();
        assert!(a.x < b.x && b.x < c.x);
        assert_eq!(a.y, b.y);
        assert_eq!(b.y, c.y);
        assert_eq!(a.x, 0.0);
        assert_eq!(b.x, a.right() + engine().config().gap_after_step(a.width));
    }

    #[test]
    fn shared_implementation_is_centered_between_its_steps() {
        let result = engine().layout(&fixtures::shared_implementation());
        let a = result.position(&NodeRef::step("a")).unwrap();
        let b = result.position(&NodeRef::step("b")).unwrap();
        let x = result.position(&NodeRef::implementation("x")).unwrap();

        assert_eq!(result.tier(NodeKind::Implementation).len(), 1);
        assert_eq!(x.mid_x(), (a.mid_x() + b.mid_x()) / 2.0);
        assert!(x.y > a.y);
    }

    #[test]
    fn long_labels_are_clamped() {
        let mut snapshot = CanvasSnapshot::new(Process::new("p", "P"));
        snapshot.steps = vec![
            Step::new("short", "Go"),
            Step::new("long", "x".repeat(500)),
        ];
        let config = LayoutConfig::default();
        let result = engine().layout(&snapshot);
        assert_eq!(result.position(&NodeRef::step("short")).unwrap().width, config.step_width.min);
        assert_eq!(result.position(&NodeRef::step("long")).unwrap().width, config.step_width.max);
    }

    #[test]
    fn crowded_implementations_do_not_overlap() {
        let mut snapshot = CanvasSnapshot::new(Process::new("p", "P"));
        snapshot.steps = vec![Step::new("s1", "One"), Step::new("s2", "Two")];
        snapshot.implementations = (0..6)
            .map(|i| Implementation::new(format!("i{}", i), format!("Implementation number {}", i)))
            .collect();
        snapshot.step_impl_links = (0..6)
            .map(|i| StepImplLink::new(if i < 3 { "s1" } else { "s2" }, format!("i{}", i)))
            .collect();

        let result = engine().layout(&snapshot);
        let tier = result.tier(NodeKind::Implementation);
        assert_eq!(tier.len(), 6);
        for pair in tier.windows(2) {
            assert!(!pair[0].1.overlaps_horizontally(pair[1].1), "{:?}", pair);
        }
    }

    #[test]
    fn unlinked_nodes_still_get_a_position() {
        let mut snapshot = fixtures::full_process();
        snapshot.implementations.push(Implementation::new("orphan", "Orphan job"));
        let result = engine().layout(&snapshot);

        let orphan = result.position(&NodeRef::implementation("orphan")).unwrap();
        let linked_right = ["i1", "i2", "i3"]
            .iter()
            .map(|id| result.position(&NodeRef::implementation(*id)).unwrap().right())
            .fold(f64::MIN, f64::max);
        assert!(orphan.x >= linked_right);
        assert_eq!(result.positions.len(), snapshot.node_count());
    }

    #[test]
    fn tiers_stack_top_to_bottom() {
        let result = engine().layout(&fixtures::full_process());
        let step_y = result.position(&NodeRef::step("s1")).unwrap().y;
        let impl_y = result.position(&NodeRef::implementation("i1")).unwrap().y;
        let data_y = result.position(&NodeRef::data_resource("d1")).unwrap().y;
        assert!(step_y < impl_y && impl_y < data_y);
    }

    #[test]
    fn shared_data_resource_is_centered_between_its_implementations() {
        let result = engine().layout(&fixtures::full_process());
        let i1 = result.position(&NodeRef::implementation("i1")).unwrap();
        let i3 = result.position(&NodeRef::implementation("i3")).unwrap();
        let d1 = result.position(&NodeRef::data_resource("d1")).unwrap();
        let d2 = result.position(&NodeRef::data_resource("d2")).unwrap();

        assert_eq!(d1.mid_x(), (i1.mid_x() + i3.mid_x()) / 2.0);
        // d2 wants the same spot under i2 and gets swept right of d1
        assert!(!d1.overlaps_horizontally(d2));
        assert!(d2.x >= d1.right());
    }

    #[test]
    fn cyclic_steps_are_rendered_last() {
        let mut snapshot = fixtures::chain();
        snapshot.edges.push(crate::graph::ProcessEdge::new("c", "b"));
        let result = engine().layout(&snapshot);
        assert_eq!(result.step_order, vec!["a", "b", "c"]);
        assert_eq!(result.cyclic_steps, vec!["b", "c"]);
        assert_eq!(result.positions.len(), 3);
    }

    #[test]
    fn layout_is_deterministic() {
        let snapshot = fixtures::full_process();
        assert_eq!(engine().layout(&snapshot), engine().layout(&snapshot));
    }
}
