//! Structural comparison of two graph snapshots.
//!
//! Only structure takes part in equality: a node's id, label, shape and
//! group, an edge's endpoints and label. Geometry and style never make a
//! node "updated", so moving a box on the canvas is not a change.

use std::collections::HashMap;

use tracing::debug;

use crate::graph::{Geometry, GraphEdge, GraphIR, GraphNode};

/// Share of topology changes, relative to the larger node count, above which
/// a full relayout is recommended.
const RELAYOUT_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub before: T,
    pub after: T,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDiff {
    pub added: Vec<GraphNode>,
    pub removed: Vec<GraphNode>,
    pub updated: Vec<Change<GraphNode>>,
    /// Carries the old geometry forward.
    pub unchanged: Vec<GraphNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeDiff {
    pub added: Vec<GraphEdge>,
    pub removed: Vec<GraphEdge>,
    pub updated: Vec<Change<GraphEdge>>,
    pub unchanged: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDiff {
    pub nodes: NodeDiff,
    pub edges: EdgeDiff,
    pub direction_changed: bool,
    pub needs_relayout: bool,
}

pub fn diff(old: &GraphIR, new: &GraphIR) -> GraphDiff {
    let nodes = diff_nodes(&old.nodes, &new.nodes);
    let edges = diff_edges(&old.edges, &new.edges);
    let direction_changed = old.direction != new.direction;

    let topology_changes =
        nodes.added.len() + nodes.removed.len() + edges.added.len() + edges.removed.len();
    let total = old.nodes.len().max(new.nodes.len()).max(1);
    #[allow(clippy::cast_precision_loss)]
    let ratio = topology_changes as f64 / total as f64;

    let needs_relayout = direction_changed
        || !nodes.added.is_empty()
        || !nodes.removed.is_empty()
        || ratio > RELAYOUT_THRESHOLD;

    debug!(
        nodes_added = nodes.added.len(),
        nodes_removed = nodes.removed.len(),
        nodes_updated = nodes.updated.len(),
        edges_added = edges.added.len(),
        edges_removed = edges.removed.len(),
        needs_relayout,
        "diffed graphs"
    );

    GraphDiff {
        nodes,
        edges,
        direction_changed,
        needs_relayout,
    }
}

fn nodes_equal(a: &GraphNode, b: &GraphNode) -> bool {
    a.id == b.id && a.label == b.label && a.shape == b.shape && a.group == b.group
}

fn diff_nodes(old: &[GraphNode], new: &[GraphNode]) -> NodeDiff {
    let old_by_id: HashMap<&str, &GraphNode> = old.iter().map(|n| (n.id.as_str(), n)).collect();
    let new_by_id: HashMap<&str, &GraphNode> = new.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut result = NodeDiff::default();

    for node in new {
        match old_by_id.get(node.id.as_str()) {
            None => result.added.push(node.clone()),
            Some(before) if !nodes_equal(before, node) => result.updated.push(Change {
                before: (*before).clone(),
                after: node.clone(),
            }),
            Some(before) => {
                let mut kept = node.clone();
                kept.geometry = before.geometry.or(node.geometry);
                result.unchanged.push(kept);
            }
        }
    }
    result.removed = old
        .iter()
        .filter(|n| !new_by_id.contains_key(n.id.as_str()))
        .cloned()
        .collect();
    result
}

fn edges_equal(a: &GraphEdge, b: &GraphEdge) -> bool {
    a.from == b.from && a.to == b.to && a.label == b.label
}

/// `(from, to, occurrence)`; parallel edges between the same pair match in
/// order of appearance.
fn edge_keys(edges: &[GraphEdge]) -> Vec<(&str, &str, usize)> {
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    edges
        .iter()
        .map(|e| {
            let n = seen.entry((e.from.as_str(), e.to.as_str())).or_default();
            let key = (e.from.as_str(), e.to.as_str(), *n);
            *n += 1;
            key
        })
        .collect()
}

fn diff_edges(old: &[GraphEdge], new: &[GraphEdge]) -> EdgeDiff {
    let old_keys = edge_keys(old);
    let new_keys = edge_keys(new);
    let old_by_key: HashMap<_, &GraphEdge> = old_keys.iter().copied().zip(old).collect();
    let new_by_key: HashMap<_, &GraphEdge> = new_keys.iter().copied().zip(new).collect();
    let mut result = EdgeDiff::default();

    for (key, edge) in new_keys.iter().zip(new) {
        match old_by_key.get(key) {
            None => result.added.push(edge.clone()),
            Some(before) if !edges_equal(before, edge) => result.updated.push(Change {
                before: (*before).clone(),
                after: edge.clone(),
            }),
            Some(_) => result.unchanged.push(edge.clone()),
        }
    }
    result.removed = old_keys
        .iter()
        .zip(old)
        .filter(|(key, _)| !new_by_key.contains_key(*key))
        .map(|(_, e)| e.clone())
        .collect();
    result
}

impl GraphDiff {
    pub fn added_node_ids(&self) -> Vec<String> {
        self.nodes.added.iter().map(|n| n.id.clone()).collect()
    }

    /// `new` with the previous geometry of every unchanged and updated node.
    /// Added nodes keep whatever geometry `new` gave them.
    pub fn carry_geometry(&self, new: &GraphIR) -> GraphIR {
        let mut previous: HashMap<&str, Geometry> = HashMap::new();
        for node in &self.nodes.unchanged {
            if let Some(geometry) = node.geometry {
                previous.insert(&node.id, geometry);
            }
        }
        for change in &self.nodes.updated {
            if let Some(geometry) = change.before.geometry {
                previous.insert(&change.after.id, geometry);
            }
        }

        let mut graph = new.clone();
        for node in &mut graph.nodes {
            if let Some(geometry) = previous.get(node.id.as_str()) {
                node.geometry = Some(*geometry);
            }
        }
        graph
    }
}
