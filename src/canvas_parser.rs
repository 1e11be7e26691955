//! Canvas elements → [`GraphIR`], recovering logical identity from element
//! metadata, bindings and geometry.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::canvas::{
    ADAPTIVE_ROUNDNESS, Binding, BoardStyle, Element, ElementKind, enum_from_name, tags,
};
use crate::class_parser::parse_member;
use crate::graph::{
    ArrowHead, ClassMember, ClassSections, DiagramType, GraphEdge, GraphGroup, GraphIR, GraphNode,
    Geometry, NodeShape, StyleHints, edge_id,
};
use crate::text_metrics::canvas_text_to_label;

/// How far (in canvas units) an unbound sequence-message endpoint may sit
/// from a participant's horizontal centre and still attach to it.
///
/// Changing this changes which participants unbound arrows resolve to.
pub const LIFELINE_SNAP_DISTANCE: f64 = 40.0;

/// Length of the element-id prefix used for nodes without identity metadata.
const DERIVED_ID_PREFIX_LEN: usize = 8;

/// Element ids backing one logical node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeElements {
    pub container: String,
    pub text: Option<String>,
    pub lifeline: Option<String>,
    /// Class attribute/method text and separator lines.
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeElements {
    pub arrow: String,
    pub text: Option<String>,
}

/// Bidirectional table between logical graph ids and canvas element ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityMap {
    nodes: HashMap<String, NodeElements>,
    edges: HashMap<String, EdgeElements>,
    owners: HashMap<String, String>,
}

impl IdentityMap {
    pub fn node(&self, logical_id: &str) -> Option<&NodeElements> {
        self.nodes.get(logical_id)
    }

    pub fn edge(&self, logical_id: &str) -> Option<&EdgeElements> {
        self.edges.get(logical_id)
    }

    /// Logical node or edge id an element belongs to.
    pub fn owner(&self, element_id: &str) -> Option<&str> {
        self.owners.get(element_id).map(String::as_str)
    }

    pub fn insert_node(&mut self, logical_id: &str, elements: NodeElements) {
        let ids = std::iter::once(&elements.container)
            .chain(&elements.text)
            .chain(&elements.lifeline)
            .chain(&elements.segments);
        for id in ids {
            self.owners.insert(id.clone(), logical_id.to_string());
        }
        self.nodes.insert(logical_id.to_string(), elements);
    }

    pub fn insert_edge(&mut self, logical_id: &str, elements: EdgeElements) {
        for id in std::iter::once(&elements.arrow).chain(&elements.text) {
            self.owners.insert(id.clone(), logical_id.to_string());
        }
        self.edges.insert(logical_id.to_string(), elements);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

pub fn parse(elements: &[Element]) -> GraphIR {
    parse_with_identity(elements).0
}

#[derive(Default)]
struct ClassSegments {
    attributes: Option<String>,
    methods: Option<String>,
    ids: Vec<String>,
}

pub fn parse_with_identity(elements: &[Element]) -> (GraphIR, IdentityMap) {
    let live: Vec<&Element> = elements.iter().filter(|el| !el.is_deleted).collect();
    let defaults = BoardStyle::default();

    let mut labels: HashMap<&str, &Element> = HashMap::new();
    for el in &live {
        if el.kind == ElementKind::Text {
            if let Some(container) = el.container_id.as_deref() {
                labels.insert(container, el);
            }
        }
    }

    let mut segments: HashMap<&str, ClassSegments> = HashMap::new();
    for el in &live {
        let Some(custom) = &el.custom_data else { continue };
        let (Some(tag), Some(owner)) = (custom.tag.as_deref(), custom.owner_id.as_deref()) else {
            continue;
        };
        let entry = segments.entry(owner).or_default();
        match tag {
            tags::CLASS_ATTRIBUTES => entry.attributes = Some(el.text_content().to_string()),
            tags::CLASS_METHODS => entry.methods = Some(el.text_content().to_string()),
            tags::CLASS_SEPARATOR => {}
            _ => continue,
        }
        entry.ids.push(el.id.clone());
    }

    let mut graph = GraphIR::empty(DiagramType::Flowchart, Default::default());
    let mut identity = IdentityMap::default();
    let mut node_by_element: HashMap<&str, String> = HashMap::new();

    if let Some(custom) = live
        .iter()
        .filter(|el| el.kind.is_container())
        .find_map(|el| el.custom_data.as_ref().filter(|c| c.diagram.is_some()))
    {
        if let Some(diagram) = custom.diagram.as_deref().and_then(|d| d.parse().ok()) {
            graph.diagram_type = diagram;
        }
        if let Some(direction) = custom.direction.as_deref().and_then(|d| d.parse().ok()) {
            graph.direction = direction;
        }
    }

    for el in &live {
        if !el.kind.is_container() {
            continue;
        }
        let id = stable_node_id(el);
        if graph.contains_node(&id) {
            trace!(node = %id, element = %el.id, "duplicate node id on canvas");
            continue;
        }

        let label_el = labels.get(el.id.as_str()).copied();
        let label = label_el
            .map(|t| canvas_text_to_label(t.text_content()))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| id.clone());

        let mut node = GraphNode::new(&id, label, container_shape(el));
        node.geometry = Some(Geometry::new(el.x, el.y, el.width, el.height));
        let mut style = extract_style(el, &defaults);
        if let Some(text) = label_el {
            style.font_size = text.font_size.filter(|fs| *fs != defaults.font_size);
            style.font_family = text.font_family.filter(|ff| *ff != defaults.font_family);
        }
        node.style = (!style.is_empty()).then_some(style);

        let owned = segments.remove(id.as_str());
        if owned.is_some() || el.tag() == Some(tags::CLASS_CONTAINER) {
            if !graph.diagram_type.is_class_like() {
                graph.diagram_type = DiagramType::Class;
            }
            let mut sections = ClassSections::default();
            if let Some(seg) = &owned {
                sections.attributes = member_lines(seg.attributes.as_deref());
                sections.methods = member_lines(seg.methods.as_deref());
            }
            node.sections = Some(sections);
        }

        identity.insert_node(
            &id,
            NodeElements {
                container: el.id.clone(),
                text: label_el.map(|t| t.id.clone()),
                lifeline: None,
                segments: owned.map(|s| s.ids).unwrap_or_default(),
            },
        );
        node_by_element.insert(el.id.as_str(), id);
        graph.nodes.push(node);
    }

    for el in &live {
        match el.tag() {
            Some(tags::LIFELINE) => {
                let participant = el
                    .custom_data
                    .as_ref()
                    .and_then(|c| c.participant_id.as_deref());
                if let Some(participant) = participant.filter(|p| graph.contains_node(p)) {
                    graph.diagram_type = DiagramType::Sequence;
                    if let Some(mut entry) = identity.node(participant).cloned() {
                        entry.lifeline = Some(el.id.clone());
                        identity.insert_node(participant, entry);
                    }
                }
            }
            Some(tags::SEQUENCE_MESSAGE) => graph.diagram_type = DiagramType::Sequence,
            _ => {}
        }
    }

    for el in &live {
        if el.kind != ElementKind::Arrow {
            continue;
        }
        let custom = el.custom_data.as_ref();
        let bound = |binding: Option<&Binding>| {
            binding.and_then(|b| node_by_element.get(b.element_id.as_str()).cloned())
        };
        let mut from = custom
            .and_then(|c| c.from.clone())
            .or_else(|| bound(el.start_binding.as_ref()));
        let mut to = custom
            .and_then(|c| c.to.clone())
            .or_else(|| bound(el.end_binding.as_ref()));

        if graph.diagram_type == DiagramType::Sequence && (from.is_none() || to.is_none()) {
            let (start, end) = el.endpoints();
            if from.is_none() {
                from = nearest_lifeline(&graph, start[0]);
            }
            if to.is_none() {
                to = nearest_lifeline(&graph, end[0]);
            }
        }

        let (Some(from), Some(to)) = (from, to) else {
            trace!(element = %el.id, "arrow without resolvable endpoints");
            continue;
        };

        let label_el = labels.get(el.id.as_str()).copied();
        let id = custom
            .and_then(|c| c.edge_id.clone().or_else(|| c.id.clone()))
            .unwrap_or_else(|| edge_id(&from, &to));
        let mut edge = GraphEdge::new(&from, &to);
        edge.id.clone_from(&id);
        edge.label = label_el
            .map(|t| canvas_text_to_label(t.text_content()))
            .filter(|l| !l.is_empty());
        edge.start_arrow = ArrowHead::from_canvas_name(el.start_arrowhead.as_deref());
        edge.end_arrow = ArrowHead::from_canvas_name(el.end_arrowhead.as_deref());
        let style = extract_style(el, &defaults);
        edge.style = (!style.is_empty()).then_some(style);

        identity.insert_edge(
            &id,
            EdgeElements {
                arrow: el.id.clone(),
                text: label_el.map(|t| t.id.clone()),
            },
        );
        graph.edges.push(edge);
    }

    let mut memberships: Vec<(&str, Vec<String>)> = Vec::new();
    for el in &live {
        let Some(node_id) = node_by_element.get(el.id.as_str()) else { continue };
        for gid in &el.group_ids {
            match memberships.iter_mut().find(|(g, _)| *g == gid.as_str()) {
                Some((_, members)) => members.push(node_id.clone()),
                None => memberships.push((gid.as_str(), vec![node_id.clone()])),
            }
        }
    }
    for (gid, children) in memberships {
        if children.len() < 2 {
            continue;
        }
        for child in &children {
            if let Some(node) = graph.node_mut(child) {
                if node.group.is_none() {
                    node.group = Some(gid.to_string());
                }
            }
        }
        graph.groups.push(GraphGroup {
            id: gid.to_string(),
            label: gid.to_string(),
            children,
        });
    }

    graph.prune();
    debug!(
        diagram = graph.diagram_type.as_str(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "parsed canvas elements"
    );
    (graph, identity)
}

/// `customData.nodeId`, then `customData.id`, then a prefix of the
/// element's own id, reduced to characters every grammar accepts in an id.
fn stable_node_id(el: &Element) -> String {
    let custom = el.custom_data.as_ref();
    custom
        .and_then(|c| c.node_id.clone().or_else(|| c.id.clone()))
        .unwrap_or_else(|| {
            let prefix: String = el
                .id
                .chars()
                .take(DERIVED_ID_PREFIX_LEN)
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            format!("n_{prefix}")
        })
}

fn container_shape(el: &Element) -> NodeShape {
    if let Some(shape) = el
        .custom_data
        .as_ref()
        .and_then(|c| c.shape.as_deref())
        .and_then(|s| s.parse().ok())
    {
        return shape;
    }
    match el.kind {
        ElementKind::Ellipse => NodeShape::Circle,
        ElementKind::Diamond => NodeShape::Diamond,
        _ if el.roundness.as_ref().is_some_and(|r| r.kind == ADAPTIVE_ROUNDNESS) => {
            NodeShape::Rounded
        }
        _ => NodeShape::Rectangle,
    }
}

/// Style hints for the fields that differ from the board defaults.
fn extract_style(el: &Element, defaults: &BoardStyle) -> StyleHints {
    StyleHints {
        stroke_color: el.stroke_color.clone().filter(|c| *c != defaults.stroke_color),
        background_color: el
            .background_color
            .clone()
            .filter(|c| *c != defaults.background_color),
        fill_style: el
            .fill_style
            .as_deref()
            .and_then(enum_from_name)
            .filter(|f| *f != defaults.fill_style),
        stroke_width: el.stroke_width.filter(|w| *w != defaults.stroke_width),
        stroke_style: el
            .stroke_style
            .as_deref()
            .and_then(enum_from_name)
            .filter(|s| *s != defaults.stroke_style),
        roughness: el.roughness.filter(|r| *r != defaults.roughness),
        opacity: el.opacity.filter(|o| *o != defaults.opacity),
        font_size: None,
        font_family: None,
    }
}

fn member_lines(text: Option<&str>) -> Vec<ClassMember> {
    text.unwrap_or_default()
        .lines()
        .filter_map(|line| parse_member(line).map(|(member, _)| member))
        .collect()
}

fn nearest_lifeline(graph: &GraphIR, x: f64) -> Option<String> {
    graph
        .nodes
        .iter()
        .filter_map(|n| n.geometry.map(|g| (n, (x - g.center_x()).abs())))
        .filter(|(_, distance)| *distance < LIFELINE_SNAP_DISTANCE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n.id.clone())
}
