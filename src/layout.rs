//! Node placement. Each diagram type maps to one of three strategies; all of
//! them leave pinned geometry alone unless a relayout is forced.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{DiagramType, Geometry, GraphIR, GraphNode};
use crate::text_metrics::estimate_text_size;
use crate::{class_layout, graph_layout, sequence_layout};

/// Boxes closer than this count as overlapping.
pub const COLLISION_MARGIN: f64 = 20.0;
/// Space left around a freshly laid out graph.
pub const LAYOUT_MARGIN: f64 = 40.0;
pub(crate) const DEFAULT_FONT_SIZE: f64 = 20.0;
/// Room between a label and its container's border, horizontally and
/// vertically.
const LABEL_PAD_X: f64 = 40.0;
const LABEL_PAD_Y: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    /// Gap between neighbours within a rank.
    pub node_sep: f64,
    /// Gap between consecutive ranks.
    pub rank_sep: f64,
    pub default_width: f64,
    pub default_height: f64,
    /// Recompute every position, pinned or not.
    pub force_relayout: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            node_sep: 80.0,
            rank_sep: 100.0,
            default_width: 150.0,
            default_height: 60.0,
            force_relayout: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Rank layout; also used by state, C4 and mindmap diagrams.
    Flowchart,
    /// Participant row with message lanes; also used by gantt.
    Sequence,
    /// Rank layout over member-sized boxes; also used by ER.
    Class,
}

impl Strategy {
    pub fn for_diagram(diagram_type: DiagramType) -> Self {
        match diagram_type {
            DiagramType::Sequence | DiagramType::Gantt => Strategy::Sequence,
            DiagramType::Class | DiagramType::Er => Strategy::Class,
            DiagramType::Flowchart
            | DiagramType::State
            | DiagramType::C4
            | DiagramType::Mindmap => Strategy::Flowchart,
        }
    }
}

/// Positions every node that lacks geometry (every node when
/// `force_relayout` is set). A graph whose nodes are all pinned comes back
/// unchanged.
pub fn layout_graph(graph: &GraphIR, options: &LayoutOptions) -> GraphIR {
    let strategy = Strategy::for_diagram(graph.diagram_type);
    debug!(?strategy, nodes = graph.nodes.len(), "full layout");
    match strategy {
        Strategy::Flowchart => graph_layout::layout(graph, options, |n| node_size(n, options)),
        Strategy::Sequence => sequence_layout::layout(graph, options),
        Strategy::Class => class_layout::layout(graph, options),
    }
}

/// Places only `new_ids` (and any other node still without geometry) next
/// to an already placed neighbour.
pub fn layout_new_nodes(graph: &GraphIR, new_ids: &[String], options: &LayoutOptions) -> GraphIR {
    let strategy = Strategy::for_diagram(graph.diagram_type);
    debug!(?strategy, new = new_ids.len(), "incremental layout");
    let new_ids: HashSet<&str> = new_ids
        .iter()
        .map(String::as_str)
        .chain(
            graph
                .nodes
                .iter()
                .filter(|n| n.geometry.is_none())
                .map(|n| n.id.as_str()),
        )
        .collect();
    match strategy {
        Strategy::Flowchart => {
            graph_layout::place_new_nodes(graph, &new_ids, options, |n| node_size(n, options))
        }
        Strategy::Sequence => sequence_layout::layout(graph, options),
        Strategy::Class => class_layout::layout_new_nodes(graph, &new_ids, options),
    }
}

/// Size of a box that fits the node's label, never smaller than the
/// configured default.
pub(crate) fn node_size(node: &GraphNode, options: &LayoutOptions) -> Size {
    let font_size = node
        .style
        .as_ref()
        .and_then(|s| s.font_size)
        .unwrap_or(DEFAULT_FONT_SIZE);
    let text = estimate_text_size(&node.label, font_size);
    Size {
        width: options.default_width.max(text.width + LABEL_PAD_X),
        height: options.default_height.max(text.height + LABEL_PAD_Y),
    }
}

/// Axis-aligned overlap test. Boxes within `margin` of each other overlap.
pub fn overlaps(a: &Geometry, b: &Geometry, margin: f64) -> bool {
    !(a.right() + margin < b.x
        || b.right() + margin < a.x
        || a.bottom() + margin < b.y
        || b.bottom() + margin < a.y)
}

pub(crate) fn collides(candidate: &Geometry, placed: &[Geometry]) -> bool {
    placed.iter().any(|p| overlaps(candidate, p, COLLISION_MARGIN))
}
