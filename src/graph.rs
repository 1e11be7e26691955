//! The canonical graph model shared by every parser, the differ, the layout
//! strategies and the serializer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    TD,
    LR,
    RL,
    BT,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TD => "TD",
            Direction::LR => "LR",
            Direction::RL => "RL",
            Direction::BT => "BT",
        }
    }

    /// Ranks stack vertically (TD/BT) rather than horizontally (LR/RL).
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::TD | Direction::BT)
    }

    /// Whether the rank axis runs towards negative coordinates.
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::BT | Direction::RL)
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TD" | "TB" => Ok(Direction::TD),
            "LR" => Ok(Direction::LR),
            "RL" => Ok(Direction::RL),
            "BT" => Ok(Direction::BT),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    #[default]
    Flowchart,
    Sequence,
    Class,
    State,
    Er,
    Gantt,
    Mindmap,
    C4,
}

impl DiagramType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramType::Flowchart => "flowchart",
            DiagramType::Sequence => "sequence",
            DiagramType::Class => "class",
            DiagramType::State => "state",
            DiagramType::Er => "er",
            DiagramType::Gantt => "gantt",
            DiagramType::Mindmap => "mindmap",
            DiagramType::C4 => "c4",
        }
    }

    /// Class and ER nodes carry attribute/method sections.
    pub fn is_class_like(self) -> bool {
        matches!(self, DiagramType::Class | DiagramType::Er)
    }
}

impl FromStr for DiagramType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flowchart" => Ok(DiagramType::Flowchart),
            "sequence" => Ok(DiagramType::Sequence),
            "class" => Ok(DiagramType::Class),
            "state" => Ok(DiagramType::State),
            "er" => Ok(DiagramType::Er),
            "gantt" => Ok(DiagramType::Gantt),
            "mindmap" => Ok(DiagramType::Mindmap),
            "c4" => Ok(DiagramType::C4),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    #[default]
    Rectangle,
    Rounded,
    Diamond,
    Circle,
    Stadium,
    Hexagon,
    Parallelogram,
}

impl NodeShape {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeShape::Rectangle => "rectangle",
            NodeShape::Rounded => "rounded",
            NodeShape::Diamond => "diamond",
            NodeShape::Circle => "circle",
            NodeShape::Stadium => "stadium",
            NodeShape::Hexagon => "hexagon",
            NodeShape::Parallelogram => "parallelogram",
        }
    }
}

impl FromStr for NodeShape {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rectangle" => Ok(NodeShape::Rectangle),
            "rounded" => Ok(NodeShape::Rounded),
            "diamond" => Ok(NodeShape::Diamond),
            "circle" => Ok(NodeShape::Circle),
            "stadium" => Ok(NodeShape::Stadium),
            "hexagon" => Ok(NodeShape::Hexagon),
            "parallelogram" => Ok(NodeShape::Parallelogram),
            _ => Err(()),
        }
    }
}

/// Arrowhead styles, named after their canvas counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowHead {
    #[default]
    None,
    Arrow,
    Bar,
    Dot,
    Triangle,
    TriangleOutline,
    Diamond,
    DiamondOutline,
}

impl ArrowHead {
    /// Canvas arrowhead name; `None` has no canvas representation.
    pub fn canvas_name(self) -> Option<&'static str> {
        match self {
            ArrowHead::None => None,
            ArrowHead::Arrow => Some("arrow"),
            ArrowHead::Bar => Some("bar"),
            ArrowHead::Dot => Some("dot"),
            ArrowHead::Triangle => Some("triangle"),
            ArrowHead::TriangleOutline => Some("triangle_outline"),
            ArrowHead::Diamond => Some("diamond"),
            ArrowHead::DiamondOutline => Some("diamond_outline"),
        }
    }

    /// Unknown canvas names degrade to a plain arrow.
    pub fn from_canvas_name(name: Option<&str>) -> ArrowHead {
        match name {
            None => ArrowHead::None,
            Some("bar") => ArrowHead::Bar,
            Some("dot" | "circle" | "circle_outline") => ArrowHead::Dot,
            Some("triangle") => ArrowHead::Triangle,
            Some("triangle_outline") => ArrowHead::TriangleOutline,
            Some("diamond") => ArrowHead::Diamond,
            Some("diamond_outline") => ArrowHead::DiamondOutline,
            Some(_) => ArrowHead::Arrow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillStyle {
    Hachure,
    CrossHatch,
    Solid,
    Zigzag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Sparse style overrides. A field is only populated when it differs from
/// the board default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_style: Option<FillStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_style: Option<StrokeStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roughness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<u32>,
}

impl StyleHints {
    pub fn is_empty(&self) -> bool {
        *self == StyleHints::default()
    }

    pub fn stroke(style: StrokeStyle) -> Self {
        Self {
            stroke_style: Some(style),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "+")]
    Public,
    #[serde(rename = "-")]
    Private,
    #[serde(rename = "#")]
    Protected,
    #[serde(rename = "~")]
    Package,
}

impl Visibility {
    pub fn from_marker(c: char) -> Option<Self> {
        match c {
            '+' => Some(Visibility::Public),
            '-' => Some(Visibility::Private),
            '#' => Some(Visibility::Protected),
            '~' => Some(Visibility::Package),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Visibility::Public => '+',
            Visibility::Private => '-',
            Visibility::Protected => '#',
            Visibility::Package => '~',
        }
    }
}

/// One attribute or method line of a class/ER node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMember {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_abstract: bool,
}

impl ClassMember {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visibility: None,
            is_static: false,
            is_abstract: false,
        }
    }
}

impl fmt::Display for ClassMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.visibility {
            write!(f, "{}", v.marker())?;
        }
        f.write_str(&self.text)?;
        if self.is_static {
            f.write_str("$")?;
        }
        if self.is_abstract {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassSections {
    pub attributes: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
}

impl ClassSections {
    pub fn member_count(&self) -> usize {
        self.attributes.len() + self.methods.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Absent until the node has been laid out or read from the canvas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleHints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<ClassSections>,
    /// Bottom of the participant's lifeline, set by the sequence layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifeline_end: Option<f64>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, shape: NodeShape) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            shape,
            group: None,
            geometry: None,
            style: None,
            sections: None,
            lifeline_end: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start_arrow: ArrowHead,
    pub end_arrow: ArrowHead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleHints>,
    /// Explicit routing points in absolute coordinates (lane layouts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: edge_id(&from, &to),
            from,
            to,
            label: None,
            start_arrow: ArrowHead::None,
            end_arrow: ArrowHead::Arrow,
            style: None,
            points: None,
        }
    }

    pub fn stroke_style(&self) -> StrokeStyle {
        self.style
            .as_ref()
            .and_then(|s| s.stroke_style)
            .unwrap_or(StrokeStyle::Solid)
    }

    pub fn is_dashed(&self) -> bool {
        self.stroke_style() != StrokeStyle::Solid
    }
}

pub fn edge_id(from: &str, to: &str) -> String {
    format!("{from}->{to}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphGroup {
    pub id: String,
    pub label: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphIR {
    #[serde(rename = "type")]
    pub diagram_type: DiagramType,
    pub direction: Direction,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub groups: Vec<GraphGroup>,
}

impl GraphIR {
    pub fn empty(diagram_type: DiagramType, direction: Direction) -> Self {
        Self {
            diagram_type,
            direction,
            nodes: Vec::new(),
            edges: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Drops edges whose endpoints do not resolve and groups with fewer than
    /// two surviving members, clearing `group` on nodes left without one.
    pub fn prune(&mut self) {
        let before = self.edges.len();
        let ids: std::collections::HashSet<String> =
            self.nodes.iter().map(|n| n.id.clone()).collect();
        self.edges
            .retain(|e| ids.contains(&e.from) && ids.contains(&e.to));
        if self.edges.len() != before {
            tracing::warn!(dropped = before - self.edges.len(), "dropped unresolved edges");
        }

        for group in &mut self.groups {
            group.children.retain(|c| ids.contains(c));
        }
        self.groups.retain(|g| g.children.len() >= 2);
        let grouped: std::collections::HashSet<&str> = self
            .groups
            .iter()
            .flat_map(|g| g.children.iter().map(String::as_str))
            .collect();
        for node in &mut self.nodes {
            if node.group.as_deref().is_some() && !grouped.contains(node.id.as_str()) {
                node.group = None;
            }
        }
    }
}
