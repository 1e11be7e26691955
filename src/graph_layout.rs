use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::graph::{Direction, Geometry, GraphIR, GraphNode};
use crate::layout::{LAYOUT_MARGIN, LayoutOptions, Size, collides};

const NUDGE_ATTEMPTS: usize = 20;
const PLACEMENT_ATTEMPTS: usize = 50;

/// Longest-path ranks and predecessor lists, indexed like `graph.nodes`.
struct Ranking {
    ranks: Vec<usize>,
    preds: Vec<Vec<usize>>,
}

/// Rank layout. Pinned nodes keep their geometry; every other node takes its
/// computed slot, pushed along the rank axis until it clears the boxes
/// already placed.
pub(crate) fn layout(
    graph: &GraphIR,
    options: &LayoutOptions,
    size_of: impl Fn(&GraphNode) -> Size,
) -> GraphIR {
    if !options.force_relayout && graph.nodes.iter().all(|n| n.geometry.is_some()) {
        return graph.clone();
    }

    let sizes: Vec<Size> = graph
        .nodes
        .iter()
        .map(|n| match n.geometry {
            Some(g) => Size {
                width: g.width,
                height: g.height,
            },
            None => size_of(n),
        })
        .collect();
    let computed = rank_positions(graph, &sizes, options);

    let mut result = graph.clone();
    if options.force_relayout {
        for (node, geometry) in result.nodes.iter_mut().zip(computed) {
            node.geometry = Some(geometry);
        }
        return result;
    }

    let mut placed: Vec<Geometry> = graph.nodes.iter().filter_map(|n| n.geometry).collect();
    for (node, mut candidate) in result.nodes.iter_mut().zip(computed) {
        if node.geometry.is_some() {
            continue;
        }
        nudge(&mut candidate, &placed, graph.direction, options);
        trace!(node = %node.id, x = candidate.x, y = candidate.y, "placed node");
        placed.push(candidate);
        node.geometry = Some(candidate);
    }
    result
}

fn nudge(candidate: &mut Geometry, placed: &[Geometry], direction: Direction, options: &LayoutOptions) {
    let sign = if direction.is_reversed() { -1.0 } else { 1.0 };
    for _ in 0..NUDGE_ATTEMPTS {
        if !collides(candidate, placed) {
            return;
        }
        if direction.is_vertical() {
            candidate.y += sign * (candidate.height + options.rank_sep);
        } else {
            candidate.x += sign * (candidate.width + options.rank_sep);
        }
    }
    if collides(candidate, placed) {
        warn!(x = candidate.x, y = candidate.y, "no free slot found, node overlaps");
    }
}

fn rank_positions(graph: &GraphIR, sizes: &[Size], options: &LayoutOptions) -> Vec<Geometry> {
    let ranking = assign_ranks(graph);
    let layers = order_layers(&ranking);
    let vertical = graph.direction.is_vertical();
    let along = |s: &Size| if vertical { s.height } else { s.width };
    let across = |s: &Size| if vertical { s.width } else { s.height };

    let depths: Vec<f64> = layers
        .iter()
        .map(|layer| layer.iter().map(|&i| along(&sizes[i])).fold(0.0, f64::max))
        .collect();
    let spans: Vec<f64> = layers
        .iter()
        .map(|layer| {
            let gaps = layer.len().saturating_sub(1);
            #[allow(clippy::cast_precision_loss)]
            let gaps = gaps as f64 * options.node_sep;
            layer.iter().map(|&i| across(&sizes[i])).sum::<f64>() + gaps
        })
        .collect();
    let widest = spans.iter().copied().fold(0.0, f64::max);

    let mut geometry = vec![Geometry::new(0.0, 0.0, 0.0, 0.0); sizes.len()];
    let mut offset = 0.0;
    for ((layer, depth), span) in layers.iter().zip(&depths).zip(&spans) {
        let mut cursor = (widest - span) / 2.0;
        for &i in layer {
            let size = sizes[i];
            let rank_pos = offset + (depth - along(&size)) / 2.0;
            let (x, y) = if vertical {
                (cursor, rank_pos)
            } else {
                (rank_pos, cursor)
            };
            geometry[i] = Geometry::new(x + LAYOUT_MARGIN, y + LAYOUT_MARGIN, size.width, size.height);
            cursor += across(&size) + options.node_sep;
        }
        offset += depth + options.rank_sep;
    }

    if graph.direction.is_reversed() && !layers.is_empty() {
        let extent = offset - options.rank_sep;
        for g in &mut geometry {
            if vertical {
                g.y = LAYOUT_MARGIN + extent - (g.y - LAYOUT_MARGIN) - g.height;
            } else {
                g.x = LAYOUT_MARGIN + extent - (g.x - LAYOUT_MARGIN) - g.width;
            }
        }
    }
    geometry
}

fn assign_ranks(graph: &GraphIR) -> Ranking {
    let index: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    for edge in &graph.edges {
        if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
            if from != to && !preds[to].contains(&from) {
                preds[to].push(from);
            }
        }
    }

    let mut ranks = vec![None; graph.nodes.len()];
    let mut on_stack = vec![false; graph.nodes.len()];
    for id in 0..graph.nodes.len() {
        compute_rank(id, &preds, &mut ranks, &mut on_stack);
    }
    Ranking {
        ranks: ranks.into_iter().map(|r| r.unwrap_or(0)).collect(),
        preds,
    }
}

/// Edges back into the current path close a cycle and are ignored.
fn compute_rank(
    id: usize,
    preds: &[Vec<usize>],
    ranks: &mut [Option<usize>],
    on_stack: &mut [bool],
) -> usize {
    if let Some(r) = ranks[id] {
        return r;
    }

    on_stack[id] = true;
    let mut rank = 0;
    for &p in &preds[id] {
        if on_stack[p] {
            continue;
        }
        rank = rank.max(compute_rank(p, preds, ranks, on_stack) + 1);
    }
    on_stack[id] = false;
    ranks[id] = Some(rank);
    rank
}

/// Groups nodes by rank, ordering each rank by the mean slot of its
/// predecessors in earlier ranks.
fn order_layers(ranking: &Ranking) -> Vec<Vec<usize>> {
    let max_rank = ranking.ranks.iter().copied().max().unwrap_or(0);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for (i, &rank) in ranking.ranks.iter().enumerate() {
        layers[rank].push(i);
    }
    if ranking.ranks.is_empty() {
        return Vec::new();
    }

    let mut slot = vec![0.0; ranking.ranks.len()];
    for (rank, layer) in layers.iter_mut().enumerate() {
        let mut keyed: Vec<(usize, f64)> = layer
            .iter()
            .enumerate()
            .map(|(pos, &i)| {
                let earlier: Vec<f64> = ranking.preds[i]
                    .iter()
                    .filter(|&&p| ranking.ranks[p] < rank)
                    .map(|&p| slot[p])
                    .collect();
                #[allow(clippy::cast_precision_loss)]
                let key = if earlier.is_empty() {
                    pos as f64
                } else {
                    earlier.iter().sum::<f64>() / earlier.len() as f64
                };
                (i, key)
            })
            .collect();
        keyed.sort_by(|a, b| a.1.total_cmp(&b.1));
        *layer = keyed.into_iter().map(|(i, _)| i).collect();
        for (pos, &i) in layer.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let pos = pos as f64;
            slot[i] = pos;
        }
    }
    layers
}

/// Incremental placement: each new node (in id order) goes next to a placed
/// neighbour along the rank axis, or past the placed extent when it has
/// none, then steps across the rank axis, alternating sides, until it fits.
pub(crate) fn place_new_nodes(
    graph: &GraphIR,
    new_ids: &HashSet<&str>,
    options: &LayoutOptions,
    size_of: impl Fn(&GraphNode) -> Size,
) -> GraphIR {
    let mut placed: HashMap<&str, Geometry> = graph
        .nodes
        .iter()
        .filter(|n| !new_ids.contains(n.id.as_str()))
        .filter_map(|n| n.geometry.map(|g| (n.id.as_str(), g)))
        .collect();
    let mut boxes: Vec<Geometry> = graph
        .nodes
        .iter()
        .filter_map(|n| placed.get(n.id.as_str()).copied())
        .collect();

    let mut pending: Vec<&GraphNode> = graph
        .nodes
        .iter()
        .filter(|n| new_ids.contains(n.id.as_str()))
        .collect();
    pending.sort_by(|a, b| a.id.cmp(&b.id));

    let mut result = graph.clone();
    // breadth first out of the placed nodes, so a new node can sit beside
    // another new node placed before it
    while !pending.is_empty() {
        let next = pending
            .iter()
            .position(|n| placed_neighbour(graph, &n.id, &placed).is_some())
            .unwrap_or(0);
        let node = pending.remove(next);
        let size = size_of(node);
        let origin = match placed_neighbour(graph, &node.id, &placed) {
            Some(neighbour) => beside(&neighbour, size, graph.direction, options),
            None => past_extent(&boxes, size, graph.direction, options),
        };
        let geometry = displace(origin, &boxes, graph.direction, options);
        trace!(node = %node.id, x = geometry.x, y = geometry.y, "placed new node");

        boxes.push(geometry);
        placed.insert(node.id.as_str(), geometry);
        if let Some(target) = result.node_mut(&node.id) {
            target.geometry = Some(geometry);
        }
    }
    result
}

/// A placed node this one has an edge from, else one it has an edge to.
fn placed_neighbour(graph: &GraphIR, id: &str, placed: &HashMap<&str, Geometry>) -> Option<Geometry> {
    let incoming = graph
        .edges
        .iter()
        .filter(|e| e.to == id)
        .find_map(|e| placed.get(e.from.as_str()));
    let outgoing = graph
        .edges
        .iter()
        .filter(|e| e.from == id)
        .find_map(|e| placed.get(e.to.as_str()));
    incoming.or(outgoing).copied()
}

fn beside(neighbour: &Geometry, size: Size, direction: Direction, options: &LayoutOptions) -> Geometry {
    let centred_x = neighbour.x + (neighbour.width - size.width) / 2.0;
    let centred_y = neighbour.y + (neighbour.height - size.height) / 2.0;
    let (x, y) = match direction {
        Direction::TD => (centred_x, neighbour.bottom() + options.rank_sep),
        Direction::BT => (centred_x, neighbour.y - options.rank_sep - size.height),
        Direction::LR => (neighbour.right() + options.rank_sep, centred_y),
        Direction::RL => (neighbour.x - options.rank_sep - size.width, centred_y),
    };
    Geometry::new(x, y, size.width, size.height)
}

fn past_extent(boxes: &[Geometry], size: Size, direction: Direction, options: &LayoutOptions) -> Geometry {
    if boxes.is_empty() {
        return Geometry::new(LAYOUT_MARGIN, LAYOUT_MARGIN, size.width, size.height);
    }
    let min_x = boxes.iter().map(|b| b.x).fold(f64::INFINITY, f64::min);
    let min_y = boxes.iter().map(|b| b.y).fold(f64::INFINITY, f64::min);
    let max_x = boxes.iter().map(Geometry::right).fold(f64::NEG_INFINITY, f64::max);
    let max_y = boxes.iter().map(Geometry::bottom).fold(f64::NEG_INFINITY, f64::max);
    let (x, y) = match direction {
        Direction::TD => (min_x, max_y + options.rank_sep),
        Direction::BT => (min_x, min_y - options.rank_sep - size.height),
        Direction::LR => (max_x + options.rank_sep, min_y),
        Direction::RL => (min_x - options.rank_sep - size.width, min_y),
    };
    Geometry::new(x, y, size.width, size.height)
}

fn displace(origin: Geometry, boxes: &[Geometry], direction: Direction, options: &LayoutOptions) -> Geometry {
    let mut candidate = origin;
    for attempt in 1..PLACEMENT_ATTEMPTS {
        if !collides(&candidate, boxes) {
            return candidate;
        }
        #[allow(clippy::cast_precision_loss)]
        let steps = attempt.div_ceil(2) as f64;
        let sign = if attempt % 2 == 1 { 1.0 } else { -1.0 };
        candidate = origin;
        if direction.is_vertical() {
            candidate.x += sign * steps * (origin.width + options.node_sep);
        } else {
            candidate.y += sign * steps * (origin.height + options.node_sep);
        }
    }
    if collides(&candidate, boxes) {
        warn!(x = candidate.x, y = candidate.y, "no free slot found, node overlaps");
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DiagramType, GraphEdge, NodeShape};
    use crate::layout::overlaps;
    use pretty_assertions::assert_eq;

    fn default_size(_: &GraphNode) -> Size {
        Size {
            width: 150.0,
            height: 60.0,
        }
    }

    fn graph(direction: Direction, nodes: &[&str], edges: &[(&str, &str)]) -> GraphIR {
        let mut g = GraphIR::empty(DiagramType::Flowchart, direction);
        g.nodes = nodes
            .iter()
            .map(|id| GraphNode::new(*id, *id, NodeShape::Rectangle))
            .collect();
        g.edges = edges.iter().map(|(f, t)| GraphEdge::new(*f, *t)).collect();
        g
    }

    fn geometry_of(g: &GraphIR, id: &str) -> Geometry {
        g.node(id).and_then(|n| n.geometry).unwrap()
    }

    #[test]
    fn rank_linear_chain() {
        let g = graph(Direction::TD, &["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        assert_eq!(assign_ranks(&g).ranks, vec![0, 1, 2]);
    }

    #[test]
    fn rank_fan_out() {
        let g = graph(Direction::TD, &["A", "B", "C"], &[("A", "B"), ("A", "C")]);
        assert_eq!(assign_ranks(&g).ranks, vec![0, 1, 1]);
    }

    #[test]
    fn rank_fan_in_takes_longest_path() {
        let g = graph(
            Direction::TD,
            &["A", "B", "C"],
            &[("A", "B"), ("B", "C"), ("A", "C")],
        );
        assert_eq!(assign_ranks(&g).ranks, vec![0, 1, 2]);
    }

    #[test]
    fn rank_cycle_terminates() {
        let g = graph(
            Direction::TD,
            &["A", "B", "C"],
            &[("A", "B"), ("B", "C"), ("C", "A")],
        );
        assert_eq!(assign_ranks(&g).ranks, vec![2, 0, 1]);
    }

    #[test]
    fn td_chain_stacks_ranks() {
        let g = graph(Direction::TD, &["A", "B"], &[("A", "B")]);
        let out = layout(&g, &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "A"), Geometry::new(40.0, 40.0, 150.0, 60.0));
        assert_eq!(geometry_of(&out, "B"), Geometry::new(40.0, 200.0, 150.0, 60.0));
    }

    #[test]
    fn narrow_ranks_are_centred() {
        let g = graph(Direction::TD, &["A", "B", "C"], &[("A", "B"), ("A", "C")]);
        let out = layout(&g, &LayoutOptions::default(), default_size);
        // second rank spans 150 + 80 + 150
        assert_eq!(geometry_of(&out, "A").x, 40.0 + 115.0);
        assert_eq!(geometry_of(&out, "B").x, 40.0);
        assert_eq!(geometry_of(&out, "C").x, 270.0);
    }

    #[test]
    fn lr_chain_runs_horizontally() {
        let g = graph(Direction::LR, &["A", "B"], &[("A", "B")]);
        let out = layout(&g, &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "A"), Geometry::new(40.0, 40.0, 150.0, 60.0));
        assert_eq!(geometry_of(&out, "B"), Geometry::new(290.0, 40.0, 150.0, 60.0));
    }

    #[test]
    fn bt_and_rl_flip_the_rank_axis() {
        let g = graph(Direction::BT, &["A", "B"], &[("A", "B")]);
        let out = layout(&g, &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "A").y, 200.0);
        assert_eq!(geometry_of(&out, "B").y, 40.0);

        let g = graph(Direction::RL, &["A", "B"], &[("A", "B")]);
        let out = layout(&g, &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "A").x, 290.0);
        assert_eq!(geometry_of(&out, "B").x, 40.0);
    }

    #[test]
    fn barycenter_keeps_children_under_parents() {
        let g = graph(
            Direction::TD,
            &["A", "B", "D", "C"],
            &[("A", "C"), ("B", "D")],
        );
        let out = layout(&g, &LayoutOptions::default(), default_size);
        assert!(geometry_of(&out, "C").x < geometry_of(&out, "D").x);
    }

    #[test]
    fn unpinned_node_is_nudged_off_pinned_one() {
        let mut g = graph(Direction::TD, &["A", "B"], &[]);
        g.nodes[0].geometry = Some(Geometry::new(270.0, 40.0, 150.0, 60.0));
        let out = layout(&g, &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "A"), Geometry::new(270.0, 40.0, 150.0, 60.0));
        assert_eq!(geometry_of(&out, "B"), Geometry::new(270.0, 200.0, 150.0, 60.0));
    }

    #[test]
    fn forced_relayout_moves_pinned_nodes() {
        let mut g = graph(Direction::TD, &["A"], &[]);
        g.nodes[0].geometry = Some(Geometry::new(900.0, 900.0, 150.0, 60.0));
        let options = LayoutOptions {
            force_relayout: true,
            ..LayoutOptions::default()
        };
        let out = layout(&g, &options, default_size);
        assert_eq!(geometry_of(&out, "A"), Geometry::new(40.0, 40.0, 150.0, 60.0));
    }

    #[test]
    fn fresh_layout_is_collision_free() {
        let g = graph(
            Direction::TD,
            &["A", "B", "C", "D", "E", "F"],
            &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D"), ("D", "E"), ("E", "A"), ("F", "C")],
        );
        let out = layout(&g, &LayoutOptions::default(), default_size);
        let boxes: Vec<Geometry> = out.nodes.iter().filter_map(|n| n.geometry).collect();
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                assert!(!overlaps(a, b, 0.0), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn new_node_goes_below_its_parent() {
        let mut g = graph(Direction::TD, &["A", "B"], &[("A", "B")]);
        g.nodes[0].geometry = Some(Geometry::new(100.0, 100.0, 150.0, 60.0));
        let out = place_new_nodes(&g, &HashSet::from(["B"]), &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "A"), Geometry::new(100.0, 100.0, 150.0, 60.0));
        assert_eq!(geometry_of(&out, "B"), Geometry::new(100.0, 260.0, 150.0, 60.0));
    }

    #[test]
    fn new_node_beside_parent_in_lr() {
        let mut g = graph(Direction::LR, &["A", "B"], &[("B", "A")]);
        g.nodes[0].geometry = Some(Geometry::new(100.0, 100.0, 150.0, 60.0));
        let out = place_new_nodes(&g, &HashSet::from(["B"]), &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "B"), Geometry::new(350.0, 100.0, 150.0, 60.0));
    }

    #[test]
    fn unconnected_new_node_goes_past_extent() {
        let mut g = graph(Direction::TD, &["A", "C"], &[]);
        g.nodes[0].geometry = Some(Geometry::new(100.0, 100.0, 150.0, 60.0));
        let out = place_new_nodes(&g, &HashSet::from(["C"]), &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "C"), Geometry::new(100.0, 260.0, 150.0, 60.0));
    }

    #[test]
    fn new_node_steps_aside_when_blocked() {
        let mut g = graph(Direction::TD, &["A", "D", "B"], &[("A", "B")]);
        g.nodes[0].geometry = Some(Geometry::new(100.0, 100.0, 150.0, 60.0));
        g.nodes[1].geometry = Some(Geometry::new(100.0, 260.0, 150.0, 60.0));
        let out = place_new_nodes(&g, &HashSet::from(["B"]), &LayoutOptions::default(), default_size);
        assert_eq!(geometry_of(&out, "B"), Geometry::new(330.0, 260.0, 150.0, 60.0));
    }

    #[test]
    fn new_nodes_chain_off_each_other() {
        let mut g = graph(Direction::TD, &["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        g.nodes[0].geometry = Some(Geometry::new(0.0, 0.0, 150.0, 60.0));
        let out = place_new_nodes(
            &g,
            &HashSet::from(["B", "C"]),
            &LayoutOptions::default(),
            default_size,
        );
        assert_eq!(geometry_of(&out, "B").y, 160.0);
        assert_eq!(geometry_of(&out, "C").y, 320.0);
    }

    #[test]
    fn new_node_waits_for_its_new_neighbour() {
        let mut g = graph(Direction::TD, &["A", "B", "Z"], &[("A", "Z"), ("Z", "B")]);
        g.nodes[0].geometry = Some(Geometry::new(0.0, 0.0, 150.0, 60.0));
        let out = place_new_nodes(
            &g,
            &HashSet::from(["B", "Z"]),
            &LayoutOptions::default(),
            default_size,
        );
        assert_eq!(geometry_of(&out, "Z"), Geometry::new(0.0, 160.0, 150.0, 60.0));
        assert_eq!(geometry_of(&out, "B"), Geometry::new(0.0, 320.0, 150.0, 60.0));
    }
}
