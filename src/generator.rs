//! GraphIR → canvas elements.
//!
//! Element ids, seeds and nonces are derived from logical ids, so drawing
//! the same graph twice gives the same elements.

use serde_json::{Value, json};

use crate::canvas::{
    ADAPTIVE_ROUNDNESS, Binding, BoardStyle, BoundElement, CustomData, Element, ElementKind,
    Roundness, derived_id, derived_seed, enum_name, tags,
};
use crate::canvas_parser::{EdgeElements, NodeElements};
use crate::graph::{
    ClassMember, DiagramType, Direction, Geometry, GraphEdge, GraphIR, GraphNode, NodeShape,
    StrokeStyle, StyleHints,
};
use crate::text_metrics::{LINE_HEIGHT, TextSize, estimate_text_size, label_to_canvas_text};

const MIN_CONTAINER_WIDTH: f64 = 120.0;
const MIN_CONTAINER_HEIGHT: f64 = 60.0;
const CONTAINER_PAD_X: f64 = 40.0;
const CONTAINER_PAD_Y: f64 = 20.0;

const CLASS_PADDING: f64 = 10.0;
const CLASS_MIN_WIDTH: f64 = 200.0;
const CLASS_MIN_HEADER: f64 = 40.0;
const CLASS_MIN_SECTION: f64 = 20.0;
const CLASS_MEMBER_SCALE: f64 = 0.9;
const SEPARATOR_GAP: f64 = 5.0;

const LIFELINE_OPACITY: f64 = 50.0;
const LIFELINE_WIDTH: f64 = 1.0;
/// Sequence message labels sit this far above their line.
const MESSAGE_LABEL_LIFT: f64 = 20.0;
const BASELINE_RATIO: f64 = 0.8;

/// Draws graph nodes and edges in a given board style. `diagram` and
/// `direction` are written to each container so the canvas can be read back
/// as the same kind of diagram.
#[derive(Debug, Clone)]
pub struct Generator<'a> {
    pub board: &'a BoardStyle,
    pub diagram: DiagramType,
    pub direction: Direction,
}

impl<'a> Generator<'a> {
    pub fn new(board: &'a BoardStyle, graph: &GraphIR) -> Self {
        Self {
            board,
            diagram: graph.diagram_type,
            direction: graph.direction,
        }
    }

    /// Elements for a whole graph: every node's elements, then every
    /// edge's, with arrows registered on the containers they bind to.
    pub fn graph(&self, graph: &GraphIR) -> Vec<Element> {
        let mut nodes: Vec<Element> = graph
            .nodes
            .iter()
            .flat_map(|n| self.node(n, &node_ids(&n.id, None)))
            .collect();
        let arrows: Vec<Element> = graph
            .edges
            .iter()
            .flat_map(|e| {
                let from = container_of(&nodes, &e.from);
                let to = container_of(&nodes, &e.to);
                match (from, to) {
                    (Some(from), Some(to)) => self.edge(e, from, to, &edge_ids(&e.id, None)),
                    _ => Vec::new(),
                }
            })
            .collect();
        attach_arrows(&mut nodes, &arrows);
        nodes.extend(arrows);
        nodes
    }

    /// Container, label and any extras (class segments, lifeline) for a
    /// node. The container always comes first.
    pub fn node(&self, node: &GraphNode, ids: &NodeElements) -> Vec<Element> {
        if node.sections.is_some() {
            return self.class_node(node, ids);
        }

        let font_size = self.font_size(node.style.as_ref());
        let text_size = estimate_text_size(&node.label, font_size);
        let geometry = node.geometry.unwrap_or_else(|| {
            Geometry::new(
                0.0,
                0.0,
                MIN_CONTAINER_WIDTH.max(text_size.width + CONTAINER_PAD_X),
                MIN_CONTAINER_HEIGHT.max(text_size.height + CONTAINER_PAD_Y),
            )
        });

        let mut container = self.styled(&ids.container, shape_kind(node.shape), node.style.as_ref());
        place(&mut container, &geometry);
        if matches!(node.shape, NodeShape::Rounded | NodeShape::Stadium) {
            container.roundness = Some(Roundness {
                kind: ADAPTIVE_ROUNDNESS,
                value: None,
            });
        }
        container.group_ids = node.group.iter().cloned().collect();
        container.custom_data = Some(CustomData {
            node_id: Some(node.id.clone()),
            shape: Some(node.shape.as_str().to_string()),
            ..self.diagram_metadata()
        });

        let text_id = ids.text.clone().unwrap_or_else(|| derived_id("text", &node.id));
        container.bound_elements = Some(vec![BoundElement {
            id: text_id.clone(),
            kind: ElementKind::Text,
        }]);

        let mut label = self.text(&text_id, &node.label, node.style.as_ref(), &ids.container);
        label.x = geometry.center_x() - text_size.width / 2.0;
        label.y = geometry.center_y() - text_size.height / 2.0;
        label.group_ids.clone_from(&container.group_ids);

        let mut elements = vec![container, label];
        if let Some(end) = node.lifeline_end {
            let lifeline_id = ids
                .lifeline
                .clone()
                .unwrap_or_else(|| derived_id("lifeline", &node.id));
            elements.push(self.lifeline(&lifeline_id, node, &geometry, end));
        }
        elements
    }

    fn class_node(&self, node: &GraphNode, ids: &NodeElements) -> Vec<Element> {
        let style = node.style.as_ref();
        let font_size = self.font_size(style);
        let member_font = font_size * CLASS_MEMBER_SCALE;
        let sections = node.sections.clone().unwrap_or_default();
        let lines = |members: &[ClassMember]| {
            members.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
        };
        let attr_text = lines(&sections.attributes);
        let method_text = lines(&sections.methods);
        let attr_size = estimate_text_size(non_empty(&attr_text), member_font);
        let method_size = estimate_text_size(non_empty(&method_text), member_font);
        let title_size = estimate_text_size(&node.label, font_size);

        let header = CLASS_MIN_HEADER.max(title_size.height + CLASS_PADDING * 2.0);
        let attr_height = CLASS_MIN_SECTION.max(attr_size.height);
        let method_height = CLASS_MIN_SECTION.max(method_size.height);
        let width = node
            .geometry
            .map_or(CLASS_MIN_WIDTH, |g| g.width)
            .max(attr_size.width + CLASS_PADDING * 2.0)
            .max(method_size.width + CLASS_PADDING * 2.0);
        let height = node
            .geometry
            .map_or(header + attr_height + method_height + CLASS_PADDING * 2.0, |g| g.height);
        let (x, y) = node.geometry.map_or((0.0, 0.0), |g| (g.x, g.y));
        let geometry = Geometry::new(x, y, width, height);

        let mut groups: Vec<String> = node.group.iter().cloned().collect();
        groups.push(ids.container.clone());

        let mut container = self.styled(&ids.container, ElementKind::Rectangle, style);
        place(&mut container, &geometry);
        container.group_ids.clone_from(&groups);
        container.custom_data = Some(CustomData {
            node_id: Some(node.id.clone()),
            shape: Some(node.shape.as_str().to_string()),
            tag: Some(tags::CLASS_CONTAINER.to_string()),
            ..self.diagram_metadata()
        });
        let title_id = ids.text.clone().unwrap_or_else(|| derived_id("text", &node.id));
        container.bound_elements = Some(vec![BoundElement {
            id: title_id.clone(),
            kind: ElementKind::Text,
        }]);

        let mut title = self.text(&title_id, &node.label, style, &ids.container);
        title.x = geometry.center_x() - title_size.width / 2.0;
        title.y = y + CLASS_PADDING;
        title.vertical_align = Some("top".to_string());
        title.group_ids.clone_from(&groups);

        let first_separator = y + header;
        let attr_y = first_separator + SEPARATOR_GAP;
        let second_separator = attr_y + attr_height + CLASS_PADDING;
        let method_y = second_separator + SEPARATOR_GAP;

        let segment = |id: String, tag: &str, kind: ElementKind| {
            let mut el = self.styled(&id, kind, None);
            el.stroke_color = Some(self.stroke_color(style));
            el.group_ids.clone_from(&groups);
            el.custom_data = Some(CustomData {
                owner_id: Some(node.id.clone()),
                ..CustomData::tagged(tag)
            });
            el
        };
        let separator = |top: f64, ordinal: &str| {
            let id = derived_id(&format!("{}-{ordinal}", tags::CLASS_SEPARATOR), &node.id);
            let mut line = segment(id, tags::CLASS_SEPARATOR, ElementKind::Line);
            line.x = x;
            line.y = top;
            line.width = width;
            line.height = 1.0;
            line.points = Some(vec![[0.0, 0.0], [width, 0.0]]);
            line.locked = true;
            line
        };
        let members = |tag: &str, text: &str, size: TextSize, top: f64| {
            let mut el = segment(derived_id(tag, &node.id), tag, ElementKind::Text);
            el.x = x + CLASS_PADDING;
            el.y = top;
            el.width = size.width;
            el.height = size.height;
            el.text = Some(non_empty(text).to_string());
            el.original_text = el.text.clone();
            el.font_size = Some(member_font);
            el.font_family = Some(self.font_family(style));
            el.text_align = Some("left".to_string());
            el.vertical_align = Some("top".to_string());
            el.line_height = Some(LINE_HEIGHT);
            el.background_color = Some("transparent".to_string());
            el
        };

        vec![
            container,
            title,
            separator(first_separator, "1"),
            members(tags::CLASS_ATTRIBUTES, &attr_text, attr_size, attr_y),
            separator(second_separator, "2"),
            members(tags::CLASS_METHODS, &method_text, method_size, method_y),
        ]
    }

    fn lifeline(&self, id: &str, node: &GraphNode, geometry: &Geometry, end: f64) -> Element {
        let length = (end - geometry.bottom()).max(0.0);
        let mut line = self.styled(id, ElementKind::Line, None);
        line.x = geometry.center_x();
        line.y = geometry.bottom();
        line.width = LIFELINE_WIDTH;
        line.height = length;
        line.points = Some(vec![[0.0, 0.0], [0.0, length]]);
        line.stroke_style = Some(enum_name(&StrokeStyle::Dashed));
        line.stroke_width = Some(LIFELINE_WIDTH);
        line.opacity = Some(LIFELINE_OPACITY);
        line.locked = true;
        line.custom_data = Some(CustomData {
            participant_id: Some(node.id.clone()),
            ..CustomData::tagged(tags::LIFELINE)
        });
        line
    }

    /// Arrow (and label) for an edge. Edges with routing points become
    /// unbound sequence messages; the rest run between the two containers'
    /// borders and bind to them.
    pub fn edge(&self, edge: &GraphEdge, from: &Element, to: &Element, ids: &EdgeElements) -> Vec<Element> {
        let style = edge.style.as_ref();
        let mut arrow = self.styled(&ids.arrow, ElementKind::Arrow, style);
        arrow.start_arrowhead = edge.start_arrow.canvas_name().map(str::to_string);
        arrow.end_arrowhead = edge.end_arrow.canvas_name().map(str::to_string);
        arrow.custom_data = Some(CustomData {
            edge_id: Some(edge.id.clone()),
            from: Some(edge.from.clone()),
            to: Some(edge.to.clone()),
            ..CustomData::default()
        });

        let (start, end, lift) = match edge.points.as_deref() {
            Some([first, .., last]) => {
                let first = [first.x, first.y];
                arrow.points = Some(
                    edge.points
                        .iter()
                        .flatten()
                        .map(|p| [p.x - first[0], p.y - first[1]])
                        .collect(),
                );
                if let Some(custom) = &mut arrow.custom_data {
                    custom.tag = Some(tags::SEQUENCE_MESSAGE.to_string());
                }
                (first, [last.x, last.y], MESSAGE_LABEL_LIFT)
            }
            _ => {
                let from_box = Geometry::new(from.x, from.y, from.width, from.height);
                let to_box = Geometry::new(to.x, to.y, to.width, to.height);
                let start = border_point(&from_box, [to_box.center_x(), to_box.center_y()]);
                let end = border_point(&to_box, [from_box.center_x(), from_box.center_y()]);
                arrow.points = Some(vec![[0.0, 0.0], [end[0] - start[0], end[1] - start[1]]]);
                arrow.start_binding = Some(Binding::to(&from.id));
                arrow.end_binding = Some(Binding::to(&to.id));
                (start, end, 0.0)
            }
        };
        arrow.x = start[0];
        arrow.y = start[1];
        arrow.width = (end[0] - start[0]).abs();
        arrow.height = (end[1] - start[1]).abs();
        if lift > 0.0 {
            // unbound lines still need a non-empty box
            arrow.width = if arrow.width == 0.0 { 1.0 } else { arrow.width };
            arrow.height = if arrow.height == 0.0 { 1.0 } else { arrow.height };
        }
        arrow.extra.insert("lastCommittedPoint".to_string(), Value::Null);

        let Some(label) = &edge.label else {
            return vec![arrow];
        };
        let text_id = ids.text.clone().unwrap_or_else(|| derived_id("text", &edge.id));
        arrow.bound_elements = Some(vec![BoundElement {
            id: text_id.clone(),
            kind: ElementKind::Text,
        }]);
        let font_size = self.font_size(style);
        let size = estimate_text_size(label, font_size);
        let mut text = self.text(&text_id, label, style, &ids.arrow);
        text.x = (start[0] + end[0]) / 2.0 - size.width / 2.0;
        text.y = (start[1] + end[1]) / 2.0 - size.height / 2.0 - lift;
        vec![arrow, text]
    }

    fn styled(&self, id: &str, kind: ElementKind, style: Option<&StyleHints>) -> Element {
        let board = self.board;
        let mut el = Element::new(id, kind);
        el.stroke_color = Some(self.stroke_color(style));
        el.background_color = Some(
            style
                .and_then(|s| s.background_color.clone())
                .unwrap_or_else(|| board.background_color.clone()),
        );
        el.fill_style = Some(enum_name(
            &style.and_then(|s| s.fill_style).unwrap_or(board.fill_style),
        ));
        el.stroke_width = Some(style.and_then(|s| s.stroke_width).unwrap_or(board.stroke_width));
        el.stroke_style = Some(enum_name(
            &style.and_then(|s| s.stroke_style).unwrap_or(board.stroke_style),
        ));
        el.roughness = Some(style.and_then(|s| s.roughness).unwrap_or(board.roughness));
        el.opacity = Some(style.and_then(|s| s.opacity).unwrap_or(board.opacity));
        el.seed = Some(derived_seed(id, "seed"));
        el.version = Some(1);
        el.version_nonce = Some(derived_seed(id, "v1"));
        el.extra.insert("frameId".to_string(), Value::Null);
        el.extra.insert("link".to_string(), Value::Null);
        el
    }

    /// Label text bound to `container_id`, sized but not yet positioned.
    fn text(&self, id: &str, label: &str, style: Option<&StyleHints>, container_id: &str) -> Element {
        let font_size = self.font_size(style);
        let size = estimate_text_size(label, font_size);
        let mut el = self.styled(id, ElementKind::Text, None);
        el.stroke_color = Some(self.stroke_color(style));
        el.width = size.width;
        el.height = size.height;
        el.text = Some(label_to_canvas_text(label));
        el.original_text = el.text.clone();
        el.font_size = Some(font_size);
        el.font_family = Some(self.font_family(style));
        el.text_align = Some("center".to_string());
        el.vertical_align = Some("middle".to_string());
        el.container_id = Some(container_id.to_string());
        el.line_height = Some(LINE_HEIGHT);
        el.background_color = Some("transparent".to_string());
        el.extra
            .insert("baseline".to_string(), json!((font_size * BASELINE_RATIO).round()));
        el
    }

    fn diagram_metadata(&self) -> CustomData {
        CustomData {
            diagram: Some(self.diagram.as_str().to_string()),
            direction: Some(self.direction.as_str().to_string()),
            ..CustomData::default()
        }
    }

    fn stroke_color(&self, style: Option<&StyleHints>) -> String {
        style
            .and_then(|s| s.stroke_color.clone())
            .unwrap_or_else(|| self.board.stroke_color.clone())
    }

    fn font_size(&self, style: Option<&StyleHints>) -> f64 {
        style.and_then(|s| s.font_size).unwrap_or(self.board.font_size)
    }

    fn font_family(&self, style: Option<&StyleHints>) -> u32 {
        style.and_then(|s| s.font_family).unwrap_or(self.board.font_family)
    }
}

/// Element ids for a node, keeping whatever the canvas already uses.
pub fn node_ids(node_id: &str, existing: Option<&NodeElements>) -> NodeElements {
    NodeElements {
        container: existing.map_or_else(|| derived_id("node", node_id), |e| e.container.clone()),
        text: Some(
            existing
                .and_then(|e| e.text.clone())
                .unwrap_or_else(|| derived_id("text", node_id)),
        ),
        lifeline: existing.and_then(|e| e.lifeline.clone()),
        segments: Vec::new(),
    }
}

pub fn edge_ids(edge_id: &str, existing: Option<&EdgeElements>) -> EdgeElements {
    EdgeElements {
        arrow: existing.map_or_else(|| derived_id("arrow", edge_id), |e| e.arrow.clone()),
        text: existing.and_then(|e| e.text.clone()),
    }
}

/// The container element drawn for `node_id` among `elements`.
pub fn container_of<'e>(elements: &'e [Element], node_id: &str) -> Option<&'e Element> {
    elements.iter().find(|el| {
        el.kind.is_container()
            && el
                .custom_data
                .as_ref()
                .and_then(|c| c.node_id.as_deref())
                == Some(node_id)
    })
}

/// Lists every bound arrow in its containers' `boundElements`, replacing
/// arrow entries the containers carried before.
pub fn attach_arrows(nodes: &mut [Element], arrows: &[Element]) {
    for container in nodes.iter_mut().filter(|el| el.kind.is_container()) {
        let mut bound: Vec<BoundElement> = container
            .bound_elements
            .take()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.kind != ElementKind::Arrow)
            .collect();
        for arrow in arrows {
            let binds = [&arrow.start_binding, &arrow.end_binding]
                .into_iter()
                .flatten()
                .any(|b| b.element_id == container.id);
            if binds && !bound.iter().any(|b| b.id == arrow.id) {
                bound.push(BoundElement {
                    id: arrow.id.clone(),
                    kind: ElementKind::Arrow,
                });
            }
        }
        container.bound_elements = (!bound.is_empty()).then_some(bound);
    }
}

fn shape_kind(shape: NodeShape) -> ElementKind {
    match shape {
        NodeShape::Diamond => ElementKind::Diamond,
        NodeShape::Circle | NodeShape::Stadium | NodeShape::Hexagon => ElementKind::Ellipse,
        NodeShape::Rectangle | NodeShape::Rounded | NodeShape::Parallelogram => {
            ElementKind::Rectangle
        }
    }
}

fn place(el: &mut Element, geometry: &Geometry) {
    el.x = geometry.x;
    el.y = geometry.y;
    el.width = geometry.width;
    el.height = geometry.height;
}

fn non_empty(text: &str) -> &str {
    if text.is_empty() { " " } else { text }
}

/// Where the ray from the box centre towards `target` leaves the box.
fn border_point(rect: &Geometry, target: [f64; 2]) -> [f64; 2] {
    let (cx, cy) = (rect.center_x(), rect.center_y());
    let dx = target[0] - cx;
    let dy = target[1] - cy;
    if dx == 0.0 && dy == 0.0 {
        return [cx, cy];
    }
    let half_w = rect.width / 2.0;
    let half_h = rect.height / 2.0;
    if dx != 0.0 && dx.abs() * half_h >= dy.abs() * half_w {
        let sign = dx.signum();
        [cx + sign * half_w, cy + sign * half_w * dy / dx]
    } else {
        let sign = dy.signum();
        [cx + sign * half_h * dx / dy, cy + sign * half_h]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas_parser;
    use crate::graph::Point;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn positioned(node: GraphNode, geometry: Geometry) -> GraphNode {
        GraphNode {
            geometry: Some(geometry),
            ..node
        }
    }

    #[test]
    fn node_is_container_plus_centred_label() {
        let board = BoardStyle::default();
        let graph = GraphIR::empty(DiagramType::Flowchart, Direction::TD);
        let node = positioned(
            GraphNode::new("A", "Hi", NodeShape::Rounded),
            Geometry::new(100.0, 100.0, 150.0, 60.0),
        );
        let elements = Generator::new(&board, &graph).node(&node, &node_ids("A", None));
        assert_eq!(elements.len(), 2);

        let container = &elements[0];
        assert_eq!(container.kind, ElementKind::Rectangle);
        assert_eq!(container.roundness.as_ref().map(|r| r.kind), Some(ADAPTIVE_ROUNDNESS));
        assert_eq!(container.custom_data.as_ref().unwrap().node_id.as_deref(), Some("A"));
        assert_eq!(container.custom_data.as_ref().unwrap().shape.as_deref(), Some("rounded"));
        assert_eq!(container.bound_elements.as_ref().unwrap()[0].id, elements[1].id);

        let label = &elements[1];
        assert_eq!(label.container_id.as_deref(), Some(container.id.as_str()));
        // "Hi" is 2 * 12 + 20 wide and 25 + 10 tall
        assert_eq!((label.width, label.height), (44.0, 35.0));
        assert_eq!((label.x, label.y), (153.0, 112.5));
        assert_eq!(label.extra.get("baseline"), Some(&json!(16.0)));
    }

    #[test]
    fn unpositioned_node_is_sized_to_its_label() {
        let board = BoardStyle::default();
        let graph = GraphIR::empty(DiagramType::Flowchart, Direction::TD);
        let node = GraphNode::new("A", "A", NodeShape::Circle);
        let elements = Generator::new(&board, &graph).node(&node, &node_ids("A", None));
        assert_eq!(elements[0].kind, ElementKind::Ellipse);
        assert_eq!((elements[0].width, elements[0].height), (120.0, 60.0));
    }

    #[test]
    fn ids_are_deterministic_and_reusable() {
        let fresh = node_ids("A", None);
        assert_eq!(fresh, node_ids("A", None));
        let existing = NodeElements {
            container: "rect-1".to_string(),
            text: Some("text-1".to_string()),
            lifeline: None,
            segments: Vec::new(),
        };
        assert_eq!(node_ids("A", Some(&existing)).container, "rect-1");
        assert_eq!(edge_ids("A->B", None).arrow, derived_id("arrow", "A->B"));
    }

    #[test]
    fn arrows_run_between_borders_and_bind() {
        let board = BoardStyle::default();
        let mut graph = parse("graph TD\n    A -->|go| B\n").unwrap();
        graph.nodes[0].geometry = Some(Geometry::new(0.0, 0.0, 100.0, 50.0));
        graph.nodes[1].geometry = Some(Geometry::new(0.0, 200.0, 100.0, 50.0));
        let elements = Generator::new(&board, &graph).graph(&graph);
        assert_eq!(elements.len(), 6);

        let arrow = &elements[4];
        assert_eq!(arrow.kind, ElementKind::Arrow);
        assert_eq!((arrow.x, arrow.y), (50.0, 50.0));
        assert_eq!(arrow.points, Some(vec![[0.0, 0.0], [0.0, 150.0]]));
        assert_eq!(arrow.start_binding.as_ref().unwrap().element_id, elements[0].id);
        assert_eq!(arrow.end_binding.as_ref().unwrap().element_id, elements[2].id);
        assert_eq!(arrow.end_arrowhead.as_deref(), Some("arrow"));
        assert_eq!(arrow.start_arrowhead, None);

        let label = &elements[5];
        assert_eq!(label.container_id.as_deref(), Some(arrow.id.as_str()));
        assert_eq!(label.text.as_deref(), Some("go"));

        let bound: Vec<&str> = elements[0]
            .bound_elements
            .iter()
            .flatten()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(bound, vec![elements[1].id.as_str(), arrow.id.as_str()]);
    }

    #[test]
    fn border_point_picks_the_facing_side() {
        let rect = Geometry::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(border_point(&rect, [500.0, 25.0]), [100.0, 25.0]);
        assert_eq!(border_point(&rect, [-500.0, 25.0]), [0.0, 25.0]);
        assert_eq!(border_point(&rect, [50.0, 300.0]), [50.0, 50.0]);
        assert_eq!(border_point(&rect, [150.0, 75.0]), [100.0, 50.0]);
        assert_eq!(border_point(&rect, [50.0, 25.0]), [50.0, 25.0]);
    }

    #[test]
    fn sequence_messages_are_unbound_lines() {
        let board = BoardStyle::default();
        let mut graph = parse("sequenceDiagram\n    A->>B: hi\n").unwrap();
        graph.edges[0].points = Some(vec![Point { x: 75.0, y: 140.0 }, Point { x: 385.0, y: 140.0 }]);
        graph.nodes[0].geometry = Some(Geometry::new(0.0, 0.0, 150.0, 60.0));
        graph.nodes[1].geometry = Some(Geometry::new(310.0, 0.0, 150.0, 60.0));
        let generator = Generator::new(&board, &graph);
        let nodes = generator.graph(&graph);
        let arrow = nodes.iter().find(|e| e.kind == ElementKind::Arrow).unwrap();
        assert_eq!(arrow.tag(), Some(tags::SEQUENCE_MESSAGE));
        assert_eq!(arrow.start_binding, None);
        assert_eq!((arrow.x, arrow.y, arrow.width, arrow.height), (75.0, 140.0, 310.0, 1.0));
        let label = nodes.iter().find(|e| e.text.as_deref() == Some("hi")).unwrap();
        // 2 * 12 + 20 wide, 35 tall, lifted 20 above the line
        assert_eq!(label.y, 140.0 - 17.5 - 20.0);
    }

    #[test]
    fn lifeline_runs_to_the_sequence_bottom() {
        let board = BoardStyle::default();
        let graph = GraphIR::empty(DiagramType::Sequence, Direction::LR);
        let mut node = positioned(
            GraphNode::new("A", "A", NodeShape::Rectangle),
            Geometry::new(0.0, 0.0, 150.0, 60.0),
        );
        node.lifeline_end = Some(340.0);
        let elements = Generator::new(&board, &graph).node(&node, &node_ids("A", None));
        let lifeline = &elements[2];
        assert_eq!(lifeline.tag(), Some(tags::LIFELINE));
        assert_eq!((lifeline.x, lifeline.y, lifeline.height), (75.0, 60.0, 280.0));
        assert_eq!(lifeline.stroke_style.as_deref(), Some("dashed"));
        assert_eq!(lifeline.opacity, Some(50.0));
        assert!(lifeline.locked);
    }

    #[test]
    fn class_node_has_segments() {
        let board = BoardStyle::default();
        let mut graph = parse("classDiagram\n    class Animal {\n        +String name\n        +eat()\n    }\n").unwrap();
        graph.nodes[0].geometry = Some(Geometry::new(0.0, 0.0, 200.0, 150.0));
        let elements = Generator::new(&board, &graph).node(&graph.nodes[0], &node_ids("Animal", None));
        let tags_seen: Vec<Option<&str>> = elements.iter().map(Element::tag).collect();
        assert_eq!(
            tags_seen,
            vec![
                Some(tags::CLASS_CONTAINER),
                None,
                Some(tags::CLASS_SEPARATOR),
                Some(tags::CLASS_ATTRIBUTES),
                Some(tags::CLASS_SEPARATOR),
                Some(tags::CLASS_METHODS),
            ]
        );
        assert_eq!(elements[3].text.as_deref(), Some("+String name"));
        assert_eq!(elements[5].text.as_deref(), Some("+eat()"));
        assert_ne!(elements[2].id, elements[4].id);
        assert!(elements.iter().all(|e| e.group_ids.contains(&elements[0].id)));
    }

    #[test]
    fn generated_canvas_parses_back() {
        let board = BoardStyle::default();
        let text = "graph LR\n    subgraph g\n        A[\"Start\"]\n        B{Check}\n    end\n    A -.->|\"maybe\"| B\n    B ==> C([Done])\n";
        let graph = crate::layout::layout_graph(&parse(text).unwrap(), &Default::default());
        let elements = Generator::new(&board, &graph).graph(&graph);
        let back = canvas_parser::parse(&elements);

        assert_eq!(back.diagram_type, DiagramType::Flowchart);
        assert_eq!(back.direction, Direction::LR);
        let summary = |g: &GraphIR| {
            g.nodes
                .iter()
                .map(|n| (n.id.clone(), n.label.clone(), n.shape, n.geometry))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&back), summary(&graph));
        assert_eq!(back.edges.len(), 2);
        assert_eq!(back.edges[0].label.as_deref(), Some("maybe"));
        assert!(back.edges[0].is_dashed());
        assert_eq!(back.edges[1].style.as_ref().and_then(|s| s.stroke_width), Some(4.0));
        assert_eq!(back.groups[0].children, vec!["A", "B"]);
    }
}
