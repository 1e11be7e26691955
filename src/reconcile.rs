//! Text + current canvas → updated canvas.
//!
//! Elements the engine manages are matched to the diagram by logical id and
//! rewritten in place; everything else on the board is passed through
//! untouched, ahead of the managed elements.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::canvas::{BoardStyle, Element, ElementKind, derived_seed};
use crate::canvas_parser::{self, IdentityMap};
use crate::diff::{GraphDiff, diff};
use crate::error::DiagramSyntaxError;
use crate::generator::{Generator, attach_arrows, container_of, edge_ids, node_ids};
use crate::graph::GraphIR;
use crate::layout::{LayoutOptions, Strategy, layout_graph, layout_new_nodes};
use crate::parser;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcileOptions {
    pub layout: LayoutOptions,
    /// Styling for new elements. Inferred from the board when absent.
    pub board: Option<BoardStyle>,
}

pub fn reconcile(text: &str, elements: &[Element]) -> Result<Vec<Element>, DiagramSyntaxError> {
    reconcile_with_options(text, elements, &ReconcileOptions::default())
}

pub fn reconcile_with_options(
    text: &str,
    elements: &[Element],
    options: &ReconcileOptions,
) -> Result<Vec<Element>, DiagramSyntaxError> {
    let target = parser::parse(text)?;

    let managed_ids = managed_element_ids(elements);
    let (unmanaged, managed): (Vec<&Element>, Vec<&Element>) = elements
        .iter()
        .partition(|el| !managed_ids.contains(el.id.as_str()));
    let managed: Vec<Element> = managed.into_iter().cloned().collect();
    let (current, identity) = canvas_parser::parse_with_identity(&managed);

    let changes = diff(&current, &target);
    debug!(
        added = changes.nodes.added.len(),
        removed = changes.nodes.removed.len(),
        updated = changes.nodes.updated.len(),
        needs_relayout = changes.needs_relayout,
        "diffed canvas against text"
    );
    let positioned = position(&current, &target, &changes, &options.layout);

    let board = options
        .board
        .clone()
        .unwrap_or_else(|| BoardStyle::infer(elements));
    let existing: HashMap<&str, &Element> = managed
        .iter()
        .filter(|el| !el.is_deleted)
        .map(|el| (el.id.as_str(), el))
        .collect();
    let drawn = draw(&positioned, &identity, &board);

    let mut result: Vec<Element> = unmanaged.into_iter().cloned().collect();
    let passed_through = result.len();
    result.extend(
        drawn
            .into_iter()
            .map(|el| match existing.get(el.id.as_str()) {
                Some(old) => refresh(old, el, &managed_ids),
                None => el,
            }),
    );
    info!(
        unmanaged = passed_through,
        managed = result.len() - passed_through,
        "reconciled canvas"
    );
    Ok(result)
}

/// Ids of elements carrying engine identity, plus the text bound to them.
fn managed_element_ids(elements: &[Element]) -> HashSet<&str> {
    let mut ids: HashSet<&str> = elements
        .iter()
        .filter(|el| el.carries_identity())
        .map(|el| el.id.as_str())
        .collect();
    let bound_text: Vec<&str> = elements
        .iter()
        .filter(|el| el.kind == ElementKind::Text)
        .filter(|el| el.container_id.as_deref().is_some_and(|c| ids.contains(c)))
        .map(|el| el.id.as_str())
        .collect();
    ids.extend(bound_text);
    ids
}

/// Geometry for the target graph. Nodes already on the canvas keep their
/// place; new ones are slotted in next to a neighbour when the canvas has a
/// layout to fit into.
fn position(current: &GraphIR, target: &GraphIR, changes: &GraphDiff, options: &LayoutOptions) -> GraphIR {
    let mut carried = changes.carry_geometry(target);
    for node in &mut carried.nodes {
        if node.style.is_none() {
            node.style = current.node(&node.id).and_then(|n| n.style.clone());
        }
    }

    if changes.direction_changed && !current.nodes.is_empty() {
        debug!("direction changed, laying out from scratch");
        let forced = LayoutOptions {
            force_relayout: true,
            ..*options
        };
        return layout_graph(&carried, &forced);
    }

    let has_layout = carried.nodes.iter().any(|n| n.geometry.is_some());
    let incremental = !changes.nodes.added.is_empty()
        && has_layout
        && !options.force_relayout
        && Strategy::for_diagram(carried.diagram_type) != Strategy::Sequence;
    if incremental {
        layout_new_nodes(&carried, &changes.added_node_ids(), options)
    } else {
        layout_graph(&carried, options)
    }
}

/// Every node's elements followed by every edge's, reusing the element ids
/// already on the canvas.
fn draw(graph: &GraphIR, identity: &IdentityMap, board: &BoardStyle) -> Vec<Element> {
    let generator = Generator::new(board, graph);
    let mut nodes: Vec<Element> = graph
        .nodes
        .iter()
        .flat_map(|n| generator.node(n, &node_ids(&n.id, identity.node(&n.id))))
        .collect();
    let arrows: Vec<Element> = graph
        .edges
        .iter()
        .flat_map(|e| {
            match (container_of(&nodes, &e.from), container_of(&nodes, &e.to)) {
                (Some(from), Some(to)) => {
                    generator.edge(e, from, to, &edge_ids(&e.id, identity.edge(&e.id)))
                }
                _ => Vec::new(),
            }
        })
        .collect();
    attach_arrows(&mut nodes, &arrows);
    nodes.extend(arrows);
    nodes
}

/// Updates an element already on the canvas from its freshly drawn
/// counterpart. Styling, rotation, locks and unknown fields stay as the user
/// left them; the version only moves when something actually changed.
///
/// Arrow stroke style and width always follow the text, which spells them
/// out in the link syntax.
fn refresh(old: &Element, mut fresh: Element, managed_ids: &HashSet<&str>) -> Element {
    fresh.stroke_color = old.stroke_color.clone().or(fresh.stroke_color);
    fresh.background_color = old.background_color.clone().or(fresh.background_color);
    fresh.fill_style = old.fill_style.clone().or(fresh.fill_style);
    if fresh.kind != ElementKind::Arrow {
        fresh.stroke_width = old.stroke_width.or(fresh.stroke_width);
        fresh.stroke_style = old.stroke_style.clone().or(fresh.stroke_style);
    }
    fresh.roughness = old.roughness.or(fresh.roughness);
    fresh.opacity = old.opacity.or(fresh.opacity);
    fresh.font_family = old.font_family.or(fresh.font_family);
    fresh.angle = old.angle;
    fresh.locked = old.locked || fresh.locked;
    fresh.seed = old.seed.or(fresh.seed);

    let mut extra = old.extra.clone();
    extra.extend(fresh.extra);
    fresh.extra = extra;
    if let (Some(old_custom), Some(custom)) = (&old.custom_data, &mut fresh.custom_data) {
        let mut extra = old_custom.extra.clone();
        extra.append(&mut custom.extra);
        custom.extra = extra;
    }

    // hand-drawn arrows and other unmanaged elements stay bound
    let foreign = old
        .bound_elements
        .iter()
        .flatten()
        .filter(|b| !managed_ids.contains(b.id.as_str()))
        .filter(|b| fresh.bound_elements.iter().flatten().all(|f| f.id != b.id))
        .cloned()
        .collect::<Vec<_>>();
    if !foreign.is_empty() {
        fresh.bound_elements.get_or_insert_with(Vec::new).extend(foreign);
    }

    fresh.version = old.version;
    fresh.version_nonce = old.version_nonce;
    if fresh == *old {
        return fresh;
    }
    let version = old.version.unwrap_or(1) + 1;
    fresh.version = Some(version);
    fresh.version_nonce = Some(derived_seed(&fresh.id, &format!("v{version}")));
    fresh
}
