use std::collections::HashSet;

use crate::graph::{GraphIR, GraphNode};
use crate::graph_layout;
use crate::layout::{DEFAULT_FONT_SIZE, LayoutOptions, Size, node_size};
use crate::text_metrics::estimate_text_size;

const HEADER_HEIGHT: f64 = 40.0;
const MEMBER_LINE_HEIGHT: f64 = 24.0;
const BOX_PADDING: f64 = 20.0;
const SEPARATOR_SPACE: f64 = 15.0;
/// Horizontal room around the widest member line.
const MEMBER_PAD_X: f64 = 40.0;

pub(crate) fn layout(graph: &GraphIR, options: &LayoutOptions) -> GraphIR {
    graph_layout::layout(graph, options, |n| class_size(n, options))
}

pub(crate) fn layout_new_nodes(
    graph: &GraphIR,
    new_ids: &HashSet<&str>,
    options: &LayoutOptions,
) -> GraphIR {
    graph_layout::place_new_nodes(graph, new_ids, options, |n| class_size(n, options))
}

/// Box size for a class node: header plus one line per member, with room
/// for the two section separators. Nodes without sections get the
/// label-fitted size.
pub(crate) fn class_size(node: &GraphNode, options: &LayoutOptions) -> Size {
    let fitted = node_size(node, options);
    let Some(sections) = &node.sections else {
        return fitted;
    };

    #[allow(clippy::cast_precision_loss)]
    let (attributes, methods) = (sections.attributes.len() as f64, sections.methods.len() as f64);
    let mut height = HEADER_HEIGHT + BOX_PADDING + attributes * MEMBER_LINE_HEIGHT;
    if !sections.attributes.is_empty() {
        height += SEPARATOR_SPACE;
    }
    height += methods * MEMBER_LINE_HEIGHT + SEPARATOR_SPACE;

    let widest_member = sections
        .attributes
        .iter()
        .chain(&sections.methods)
        .map(|m| estimate_text_size(&m.to_string(), DEFAULT_FONT_SIZE).width + MEMBER_PAD_X)
        .fold(0.0, f64::max);

    Size {
        width: fitted.width.max(widest_member),
        height: options.default_height.max(height),
    }
}
