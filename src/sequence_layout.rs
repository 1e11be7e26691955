use std::collections::HashMap;

use crate::graph::{Geometry, GraphIR, Point};
use crate::layout::LayoutOptions;

/// Vertical distance between consecutive messages.
const MESSAGE_STEP: f64 = 100.0;
/// Share of the rank gap left between the header row and the first message.
const FIRST_MESSAGE_GAP: f64 = 0.8;

/// Participants in one row in declaration order, messages as horizontal
/// lanes below them. Pinned positions are ignored; only pinned sizes are
/// kept.
pub(crate) fn layout(graph: &GraphIR, options: &LayoutOptions) -> GraphIR {
    let mut result = graph.clone();
    let column = options.default_width + 2.0 * options.node_sep;

    let mut centres: HashMap<String, f64> = HashMap::new();
    for (idx, node) in result.nodes.iter_mut().enumerate() {
        let width = node.geometry.map_or(options.default_width, |g| g.width);
        let height = node.geometry.map_or(options.default_height, |g| g.height);
        #[allow(clippy::cast_precision_loss)]
        let x = idx as f64 * column;
        node.geometry = Some(Geometry::new(x, 0.0, width, height));
        centres.insert(node.id.clone(), x + width / 2.0);
    }

    let mut lane = options.default_height + options.rank_sep * FIRST_MESSAGE_GAP;
    for edge in &mut result.edges {
        let (Some(&x1), Some(&x2)) = (centres.get(&edge.from), centres.get(&edge.to)) else {
            continue;
        };
        edge.points = Some(vec![Point { x: x1, y: lane }, Point { x: x2, y: lane }]);
        lane += MESSAGE_STEP;
    }

    let lifeline_end = lane + options.rank_sep;
    for node in &mut result.nodes {
        node.lifeline_end = Some(lifeline_end);
    }
    result
}
