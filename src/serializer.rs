//! GraphIR → diagram text. Output always parses back to the same node ids,
//! edge endpoints and labels; it is not meant to reproduce the input byte
//! for byte.

use std::collections::HashSet;

use crate::graph::{
    ArrowHead, DiagramType, Direction, GraphEdge, GraphIR, GraphNode, NodeShape,
};
use crate::graph_parser::THICK_STROKE_WIDTH;
use crate::parser::escape;
use crate::state_parser::START_END_ID;

const INDENT: &str = "  ";

/// Full form: every node is declared with its label and shape.
pub fn serialize(graph: &GraphIR) -> String {
    write(graph, false)
}

/// Token-light form. Flowchart nodes whose label is their id, whose shape is
/// the default rectangle and that appear in an edge are not declared, and
/// labels are only quoted when they have to be.
pub fn serialize_compact(graph: &GraphIR) -> String {
    write(graph, true)
}

fn write(graph: &GraphIR, compact: bool) -> String {
    let lines = match graph.diagram_type {
        DiagramType::Sequence => write_sequence(graph),
        DiagramType::Class => write_class(graph),
        DiagramType::Er => write_er(graph),
        DiagramType::State => write_state(graph),
        DiagramType::C4 => write_flowchart(graph, "C4Context".to_string(), compact),
        DiagramType::Flowchart | DiagramType::Gantt | DiagramType::Mindmap => {
            write_flowchart(graph, format!("graph {}", graph.direction.as_str()), compact)
        }
    };
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn write_flowchart(graph: &GraphIR, header: String, compact: bool) -> Vec<String> {
    let mut lines = vec![header];
    let in_edge: HashSet<&str> = graph
        .edges
        .iter()
        .flat_map(|e| [e.from.as_str(), e.to.as_str()])
        .collect();
    let grouped: HashSet<&str> = graph
        .groups
        .iter()
        .flat_map(|g| g.children.iter().map(String::as_str))
        .collect();

    for group in &graph.groups {
        if group.label == group.id {
            lines.push(format!("{INDENT}subgraph {}", group.id));
        } else {
            lines.push(format!(
                "{INDENT}subgraph {} [\"{}\"]",
                group.id,
                escape(&group.label)
            ));
        }
        for node in group.children.iter().filter_map(|id| graph.node(id)) {
            let decl = if compact && is_plain(node) {
                node.id.clone()
            } else {
                declaration(node, compact)
            };
            lines.push(format!("{INDENT}{INDENT}{decl}"));
        }
        lines.push(format!("{INDENT}end"));
    }

    for node in graph.nodes.iter().filter(|n| !grouped.contains(n.id.as_str())) {
        if !compact || !is_plain(node) {
            lines.push(format!("{INDENT}{}", declaration(node, compact)));
        } else if !in_edge.contains(node.id.as_str()) {
            lines.push(format!("{INDENT}{}", node.id));
        }
    }

    for edge in &graph.edges {
        let label = match &edge.label {
            Some(label) => format!("|{}|", quoted(label, compact)),
            None => String::new(),
        };
        lines.push(format!(
            "{INDENT}{} {}{label} {}",
            edge.from,
            flowchart_link(edge),
            edge.to
        ));
    }
    lines
}

fn is_plain(node: &GraphNode) -> bool {
    node.label == node.id && node.shape == NodeShape::Rectangle
}

fn declaration(node: &GraphNode, compact: bool) -> String {
    let label = quoted(&node.label, compact);
    let (open, close) = match node.shape {
        NodeShape::Rectangle => ("[", "]"),
        NodeShape::Rounded => ("(", ")"),
        NodeShape::Diamond => ("{", "}"),
        NodeShape::Circle => ("((", "))"),
        NodeShape::Stadium => ("([", "])"),
        NodeShape::Hexagon => ("{{", "}}"),
        NodeShape::Parallelogram => ("[/", "/]"),
    };
    format!("{}{open}{label}{close}", node.id)
}

/// Quotes a label unless `compact` is set and the label is plain text.
fn quoted(label: &str, compact: bool) -> String {
    let plain = !label.is_empty()
        && label.trim() == label
        && !label.contains(['"', '[', ']', '(', ')', '{', '}', '|', '<', '>', '#', ';', '/', '&']);
    if compact && plain {
        label.to_string()
    } else {
        format!("\"{}\"", escape(label))
    }
}

fn flowchart_link(edge: &GraphEdge) -> &'static str {
    let thick = edge
        .style
        .as_ref()
        .and_then(|s| s.stroke_width)
        .is_some_and(|w| w >= THICK_STROKE_WIDTH);
    let both = edge.start_arrow != ArrowHead::None && edge.end_arrow != ArrowHead::None;
    let open = edge.end_arrow == ArrowHead::None;
    match (edge.is_dashed(), thick, both, open) {
        (true, _, true, _) => "<-.->",
        (true, _, _, true) => "-.-",
        (true, _, _, _) => "-.->",
        (_, true, true, _) => "<==>",
        (_, true, _, true) => "===",
        (_, true, _, _) => "==>",
        (_, _, true, _) => "<-->",
        (_, _, _, true) => "---",
        _ => "-->",
    }
}

fn write_sequence(graph: &GraphIR) -> Vec<String> {
    let mut lines = vec!["sequenceDiagram".to_string()];
    for node in &graph.nodes {
        if node.label == node.id {
            lines.push(format!("{INDENT}participant {}", node.id));
        } else {
            lines.push(format!(
                "{INDENT}participant {} as \"{}\"",
                node.id,
                escape(&node.label)
            ));
        }
    }
    for edge in &graph.edges {
        let line = if edge.is_dashed() { "--" } else { "-" };
        let head = match edge.end_arrow {
            ArrowHead::None => ">",
            ArrowHead::Bar => "x",
            ArrowHead::TriangleOutline => ")",
            _ => ">>",
        };
        let text = match &edge.label {
            Some(label) => format!(": {}", escape(label)),
            None => String::new(),
        };
        lines.push(format!("{INDENT}{}{line}{head}{}{text}", edge.from, edge.to));
    }
    lines
}

fn direction_line(direction: Direction) -> Option<String> {
    (direction != Direction::TD).then(|| format!("{INDENT}direction {}", direction.as_str()))
}

fn write_class(graph: &GraphIR) -> Vec<String> {
    let mut lines = vec!["classDiagram".to_string()];
    lines.extend(direction_line(graph.direction));
    for node in &graph.nodes {
        let label = if node.label == node.id {
            String::new()
        } else {
            format!("[\"{}\"]", escape(&node.label))
        };
        let members = node
            .sections
            .as_ref()
            .filter(|s| s.member_count() > 0);
        match members {
            Some(sections) => {
                lines.push(format!("{INDENT}class {}{label} {{", node.id));
                for member in sections.attributes.iter().chain(&sections.methods) {
                    lines.push(format!("{INDENT}{INDENT}{member}"));
                }
                lines.push(format!("{INDENT}}}"));
            }
            None => lines.push(format!("{INDENT}class {}{label}", node.id)),
        }
    }
    for edge in &graph.edges {
        let label = match &edge.label {
            Some(label) => format!(" : {}", escape(label)),
            None => String::new(),
        };
        lines.push(format!(
            "{INDENT}{} {} {}{label}",
            edge.from,
            relation_token(edge),
            edge.to
        ));
    }
    lines
}

/// Relation token for a class edge. When both ends carry a head only the
/// start survives, except for the plain two-way arrow.
fn relation_token(edge: &GraphEdge) -> String {
    let dashed = edge.is_dashed();
    let line = if dashed { ".." } else { "--" };
    let start = match edge.start_arrow {
        ArrowHead::Triangle | ArrowHead::TriangleOutline => "<|",
        ArrowHead::Diamond if !dashed => "*",
        ArrowHead::DiamondOutline if !dashed => "o",
        ArrowHead::Arrow => "<",
        _ => "",
    };
    let end = match edge.end_arrow {
        ArrowHead::Triangle | ArrowHead::TriangleOutline => "|>",
        ArrowHead::Diamond if !dashed => "*",
        ArrowHead::DiamondOutline if !dashed => "o",
        ArrowHead::Arrow => ">",
        _ => "",
    };
    match (start, end) {
        ("<", ">") if !dashed => "<-->".to_string(),
        ("", end) => format!("{line}{end}"),
        (start, _) => format!("{start}{line}"),
    }
}

fn write_er(graph: &GraphIR) -> Vec<String> {
    let mut lines = vec!["erDiagram".to_string()];
    for node in &graph.nodes {
        match node.sections.as_ref().filter(|s| s.member_count() > 0) {
            Some(sections) => {
                lines.push(format!("{INDENT}{} {{", node.id));
                for member in sections.attributes.iter().chain(&sections.methods) {
                    lines.push(format!("{INDENT}{INDENT}{member}"));
                }
                lines.push(format!("{INDENT}}}"));
            }
            None => lines.push(format!("{INDENT}{}", node.id)),
        }
    }
    for edge in &graph.edges {
        let left = match edge.start_arrow {
            ArrowHead::Dot => "|o",
            ArrowHead::Triangle => "}|",
            ArrowHead::TriangleOutline => "}o",
            _ => "||",
        };
        let right = match edge.end_arrow {
            ArrowHead::Dot => "o|",
            ArrowHead::Triangle => "|{",
            ArrowHead::TriangleOutline => "o{",
            _ => "||",
        };
        let line = if edge.is_dashed() { ".." } else { "--" };
        let label = escape(edge.label.as_deref().unwrap_or_default());
        lines.push(format!(
            "{INDENT}{} {left}{line}{right} {} : \"{label}\"",
            edge.from, edge.to
        ));
    }
    lines
}

fn write_state(graph: &GraphIR) -> Vec<String> {
    let mut lines = vec!["stateDiagram-v2".to_string()];
    lines.extend(direction_line(graph.direction));
    let pseudo = |id: &str| if id == START_END_ID { "[*]".to_string() } else { id.to_string() };

    for node in graph.nodes.iter().filter(|n| n.id != START_END_ID) {
        let mut line = if node.label == node.id {
            format!("{INDENT}state {}", node.id)
        } else {
            format!("{INDENT}state \"{}\" as {}", escape(&node.label), node.id)
        };
        if node.shape == NodeShape::Diamond {
            line.push_str(" <<choice>>");
        }
        lines.push(line);
    }
    for edge in &graph.edges {
        let label = match &edge.label {
            Some(label) => format!(" : {}", escape(label)),
            None => String::new(),
        };
        lines.push(format!(
            "{INDENT}{} --> {}{label}",
            pseudo(&edge.from),
            pseudo(&edge.to)
        ));
    }
    lines
}
