use tracing::{trace, warn};
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::prelude::*;
use winnow::token::{take_until, take_while};

use crate::error::DiagramSyntaxError;
use crate::graph::{
    ArrowHead, Direction, DiagramType, GraphEdge, GraphGroup, GraphIR, GraphNode, NodeShape,
    StrokeStyle, StyleHints,
};
use crate::parser::{Line, after_keyword, snippet, strip_quotes, unescape};

/// Stroke width the canvas uses for `==>` links.
pub(crate) const THICK_STROKE_WIDTH: f64 = 4.0;

const DIRECTIVES: [&str; 6] = ["style", "class", "classDef", "linkStyle", "click", "direction"];

/// `style A fill:#f9f` and friends. A keyword used as a node id
/// (`class --> B`) is not a directive.
fn is_directive(text: &str) -> bool {
    DIRECTIVES.iter().any(|d| {
        after_keyword(text, d).is_some_and(|mut rest| {
            !rest.is_empty() && link.parse_next(&mut rest).is_err()
        })
    })
}

/// Reads the direction from a `graph TD` / `flowchart LR` header. A missing
/// direction means top-down.
pub(crate) fn header_direction(header: &Line<'_>) -> Result<Direction, DiagramSyntaxError> {
    let mut words = header.text.split_whitespace().skip(1);
    match words.next() {
        None => Ok(Direction::TD),
        Some(word) => word.trim_end_matches(';').parse().map_err(|()| {
            DiagramSyntaxError::at_line(header.number, format!("unknown direction `{}`", snippet(word)))
        }),
    }
}

/// Parses flowchart body lines (everything after the header). With
/// `lenient`, lines that are not node/edge statements are skipped instead of
/// rejected.
pub(crate) fn parse_flowchart(
    lines: &[Line<'_>],
    lenient: bool,
) -> Result<GraphIR, DiagramSyntaxError> {
    let mut builder = FlowchartBuilder::default();

    for line in lines {
        let text = line.text;
        if let Some(rest) = after_keyword(text, "subgraph") {
            builder.open_group(rest);
            continue;
        }
        if text == "end" || text == "end;" {
            builder.close_group();
            continue;
        }
        if is_directive(text) {
            trace!(line = line.number, "skipping flowchart directive");
            continue;
        }

        let mut input = text.trim_end_matches(';').trim_end();
        let parsed = statement.parse_next(&mut input);
        match parsed {
            Ok(stmt) if input.trim().is_empty() => builder.apply(stmt),
            _ if lenient => {
                warn!(line = line.number, text, "skipping unrecognized line");
            }
            Ok(_) => {
                return Err(DiagramSyntaxError::at_line(
                    line.number,
                    format!("unexpected `{}`", snippet(input.trim())),
                ));
            }
            Err(_) => {
                return Err(DiagramSyntaxError::at_line(
                    line.number,
                    format!("cannot read `{}` as nodes or edges", snippet(text)),
                ));
            }
        }
    }

    Ok(builder.finish())
}

#[derive(Debug, Clone, PartialEq)]
struct NodeDecl {
    id: String,
    label: Option<String>,
    shape: Option<NodeShape>,
}

impl NodeDecl {
    fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: None,
            shape: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LinkStroke {
    Normal,
    Dashed,
    Thick,
}

#[derive(Debug, Clone, PartialEq)]
struct Link {
    start: ArrowHead,
    end: ArrowHead,
    stroke: LinkStroke,
    label: Option<String>,
}

impl Link {
    fn new(start: ArrowHead, end: ArrowHead, stroke: LinkStroke) -> Self {
        Self {
            start,
            end,
            stroke,
            label: None,
        }
    }

    fn arrow(stroke: LinkStroke) -> Self {
        Self::new(ArrowHead::None, ArrowHead::Arrow, stroke)
    }

    fn open(stroke: LinkStroke) -> Self {
        Self::new(ArrowHead::None, ArrowHead::None, stroke)
    }

    fn both(stroke: LinkStroke) -> Self {
        Self::new(ArrowHead::Arrow, ArrowHead::Arrow, stroke)
    }

    fn style(&self) -> Option<StyleHints> {
        match self.stroke {
            LinkStroke::Normal => None,
            LinkStroke::Dashed => Some(StyleHints::stroke(StrokeStyle::Dashed)),
            LinkStroke::Thick => Some(StyleHints {
                stroke_width: Some(THICK_STROKE_WIDTH),
                ..StyleHints::default()
            }),
        }
    }
}

/// `a & b --> c --> d & e`: node groups joined by links.
#[derive(Debug, PartialEq)]
struct Statement {
    groups: Vec<Vec<NodeDecl>>,
    links: Vec<Link>,
}

#[derive(Default)]
struct FlowchartBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    groups: Vec<GraphGroup>,
    open: Vec<GraphGroup>,
}

impl FlowchartBuilder {
    fn open_group(&mut self, header: &str) {
        let (id, label) = subgraph_title(header, self.groups.len() + self.open.len());
        self.open.push(GraphGroup {
            id,
            label,
            children: Vec::new(),
        });
    }

    fn close_group(&mut self) {
        match self.open.pop() {
            Some(group) => self.groups.push(group),
            None => warn!("`end` without an open subgraph"),
        }
    }

    fn declare(&mut self, decl: &NodeDecl) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == decl.id) {
            if let Some(label) = decl.label.as_ref().filter(|l| **l != decl.id) {
                node.label.clone_from(label);
            }
            if let Some(shape) = decl.shape.filter(|s| *s != NodeShape::Rectangle) {
                node.shape = shape;
            }
            return;
        }

        let label = decl.label.clone().unwrap_or_else(|| decl.id.clone());
        let mut node = GraphNode::new(&decl.id, label, decl.shape.unwrap_or_default());
        if let Some(group) = self.open.last_mut() {
            group.children.push(decl.id.clone());
            node.group = Some(group.id.clone());
        }
        self.nodes.push(node);
    }

    fn connect(&mut self, from: &str, to: &str, link: &Link) {
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            trace!(from, to, "duplicate flowchart edge ignored");
            return;
        }
        let mut edge = GraphEdge::new(from, to);
        edge.label.clone_from(&link.label);
        edge.start_arrow = link.start;
        edge.end_arrow = link.end;
        edge.style = link.style();
        self.edges.push(edge);
    }

    fn apply(&mut self, stmt: Statement) {
        for decl in stmt.groups.iter().flatten() {
            self.declare(decl);
        }
        for (i, link) in stmt.links.iter().enumerate() {
            for from in &stmt.groups[i] {
                for to in &stmt.groups[i + 1] {
                    self.connect(&from.id, &to.id, link);
                }
            }
        }
    }

    fn finish(mut self) -> GraphIR {
        if !self.open.is_empty() {
            warn!(count = self.open.len(), "unterminated subgraph closed at end of input");
            while let Some(group) = self.open.pop() {
                self.groups.push(group);
            }
        }
        let mut graph = GraphIR::empty(DiagramType::Flowchart, Direction::TD);
        graph.nodes = self.nodes;
        graph.edges = self.edges;
        graph.groups = self.groups;
        graph.prune();
        graph
    }
}

/// `subgraph id`, `subgraph id [Label]`, `subgraph "Label"` or
/// `subgraph Free text`.
fn subgraph_title(header: &str, ordinal: usize) -> (String, String) {
    let header = header.trim();
    if header.is_empty() {
        let id = format!("subgraph_{ordinal}");
        return (id.clone(), id);
    }
    if header.starts_with('"') {
        let label = unescape(strip_quotes(header));
        return (slug(&label, ordinal), label);
    }

    let mut rest = header;
    if let Ok(id) = identifier.parse_next(&mut rest) {
        let rest = rest.trim();
        if rest.is_empty() {
            return (id.to_string(), id.to_string());
        }
        if let Some(inner) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return (id.to_string(), unescape(strip_quotes(inner.trim())));
        }
    }
    (slug(header, ordinal), header.to_string())
}

/// Lowercase id for a free-text title. Runs of anything `identifier` does
/// not accept become one `_`.
fn slug(label: &str, ordinal: usize) -> String {
    let mut id = String::new();
    for c in label.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            id.push(c);
        } else if !id.is_empty() && !id.ends_with('_') {
            id.push('_');
        }
    }
    let id = id.trim_end_matches('_');
    if id.is_empty() {
        format!("subgraph_{ordinal}")
    } else {
        id.to_string()
    }
}

fn statement(input: &mut &str) -> winnow::Result<Statement> {
    let mut groups = vec![node_group.parse_next(input)?];
    let mut links = Vec::new();
    loop {
        let checkpoint = *input;
        space0.parse_next(input)?;
        let Some(next_link) = opt(link).parse_next(input)? else {
            *input = checkpoint;
            break;
        };
        space0.parse_next(input)?;
        groups.push(node_group.parse_next(input)?);
        links.push(next_link);
    }
    Ok(Statement { groups, links })
}

fn node_group(input: &mut &str) -> winnow::Result<Vec<NodeDecl>> {
    let mut nodes = vec![node_ref.parse_next(input)?];
    while let Some(next) = opt(preceded((space0, "&", space0), node_ref)).parse_next(input)? {
        nodes.push(next);
    }
    Ok(nodes)
}

/// Node ids are word characters with inner hyphens; a hyphen that starts a
/// link (`A-->B`) ends the id.
fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    let s = *input;
    let mut end = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let accepted = if c.is_alphanumeric() || c == '_' {
            true
        } else if c == '-' && end > 0 {
            chars
                .peek()
                .is_some_and(|&(_, next)| next.is_alphanumeric() || next == '_')
        } else {
            false
        };
        if !accepted {
            break;
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        return Err(winnow::error::ParserError::from_input(input));
    }
    let (id, rest) = s.split_at(end);
    *input = rest;
    Ok(id)
}

fn node_ref(input: &mut &str) -> winnow::Result<NodeDecl> {
    let id = identifier.parse_next(input)?;
    let mut decl = NodeDecl::bare(id);

    if input.starts_with(['[', '(', '{']) {
        if let Some((shape, label)) = opt(shape_label).parse_next(input)? {
            decl.shape = Some(shape);
            decl.label = Some(if label.is_empty() { id.to_string() } else { label });
        } else {
            let token = take_while(0.., |c: char| !c.is_whitespace()).parse_next(input)?;
            warn!(node = id, token, "malformed shape, using a rectangle");
            decl.shape = Some(NodeShape::Rectangle);
        }
    }

    // `A:::className` styling suffix
    opt(preceded(
        ":::",
        take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    ))
    .parse_next(input)?;
    Ok(decl)
}

fn shape_label(input: &mut &str) -> winnow::Result<(NodeShape, String)> {
    alt((
        bracketed("([", "])").map(|l| (NodeShape::Stadium, l)),
        bracketed("((", "))").map(|l| (NodeShape::Circle, l)),
        bracketed("{{", "}}").map(|l| (NodeShape::Hexagon, l)),
        bracketed("[/", "/]").map(|l| (NodeShape::Parallelogram, l)),
        bracketed("(", ")").map(|l| (NodeShape::Rounded, l)),
        bracketed("{", "}").map(|l| (NodeShape::Diamond, l)),
        bracketed("[", "]").map(|l| (NodeShape::Rectangle, l)),
    ))
    .parse_next(input)
}

fn bracketed(
    mut open: &'static str,
    mut close: &'static str,
) -> impl FnMut(&mut &str) -> winnow::Result<String> {
    move |input: &mut &str| {
        open.parse_next(input)?;
        let text = if input.starts_with('"') {
            delimited("\"", take_until(0.., "\""), "\"").parse_next(input)?
        } else {
            take_until(0.., close).parse_next(input)?
        };
        close.parse_next(input)?;
        Ok(unescape(text.trim()))
    }
}

fn link(input: &mut &str) -> winnow::Result<Link> {
    alt((labeled_link, arrow_link)).parse_next(input)
}

fn arrow_link(input: &mut &str) -> winnow::Result<Link> {
    let mut link = arrow_token.parse_next(input)?;
    link.label = opt(preceded(space0, pipe_label))
        .parse_next(input)?
        .flatten();
    Ok(link)
}

fn arrow_token(input: &mut &str) -> winnow::Result<Link> {
    use LinkStroke::{Dashed, Normal, Thick};
    alt((
        "<-->".value(Link::both(Normal)),
        "<-.->".value(Link::both(Dashed)),
        "<==>".value(Link::both(Thick)),
        "-.->".value(Link::arrow(Dashed)),
        "-.-".value(Link::open(Dashed)),
        "==>".value(Link::arrow(Thick)),
        "===".value(Link::open(Thick)),
        "--->".value(Link::arrow(Normal)),
        "-->".value(Link::arrow(Normal)),
        "----".value(Link::open(Normal)),
        "---".value(Link::open(Normal)),
        "->".value(Link::arrow(Normal)),
    ))
    .parse_next(input)
}

/// `|text|` or `|"text"|`; a quoted label may contain pipes.
fn pipe_label(input: &mut &str) -> winnow::Result<Option<String>> {
    let text = alt((
        delimited(("|", space0, "\""), take_until(0.., "\""), ("\"", space0, "|")),
        delimited("|", take_until(0.., "|"), "|"),
    ))
    .parse_next(input)?;
    let text = strip_quotes(text.trim());
    Ok((!text.is_empty()).then(|| unescape(text)))
}

/// `A -- text --> B` and its dashed/thick variants.
fn labeled_link(input: &mut &str) -> winnow::Result<Link> {
    use LinkStroke::{Dashed, Normal, Thick};
    alt((
        labeled("--", "-->", Link::arrow(Normal)),
        labeled("--", "---", Link::open(Normal)),
        labeled("-.", ".->", Link::arrow(Dashed)),
        labeled("-.", ".-", Link::open(Dashed)),
        labeled("==", "==>", Link::arrow(Thick)),
        labeled("==", "===", Link::open(Thick)),
    ))
    .parse_next(input)
}

fn labeled(
    mut open: &'static str,
    mut close: &'static str,
    link: Link,
) -> impl FnMut(&mut &str) -> winnow::Result<Link> {
    move |input: &mut &str| {
        open.parse_next(input)?;
        space1.parse_next(input)?;
        let text = take_until(1.., close).parse_next(input)?;
        close.parse_next(input)?;
        let text = strip_quotes(text.trim());
        Ok(Link {
            label: (!text.is_empty()).then(|| unescape(text)),
            ..link.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_identifier_stops_at_link() {
        let mut input = "A-->B";
        assert_eq!(identifier(&mut input).unwrap(), "A");
        assert_eq!(input, "-->B");
    }

    #[test]
    fn parse_identifier_keeps_inner_hyphen() {
        let mut input = "api-gateway --> db";
        assert_eq!(identifier(&mut input).unwrap(), "api-gateway");
    }

    #[test]
    fn parse_node_ref_with_label() {
        let mut input = "A[Start]";
        let n = node_ref(&mut input).unwrap();
        assert_eq!(n.id, "A");
        assert_eq!(n.label.as_deref(), Some("Start"));
        assert_eq!(n.shape, Some(NodeShape::Rectangle));
    }

    #[test]
    fn parse_node_ref_without_label() {
        let mut input = "A rest";
        let n = node_ref(&mut input).unwrap();
        assert_eq!(n, NodeDecl::bare("A"));
        assert_eq!(input, " rest");
    }

    #[test]
    fn parse_every_shape() {
        let cases = [
            ("A[Box]", NodeShape::Rectangle),
            ("A(Round)", NodeShape::Rounded),
            ("A{Choice}", NodeShape::Diamond),
            ("A((Circle))", NodeShape::Circle),
            ("A([Pill])", NodeShape::Stadium),
            ("A{{Hex}}", NodeShape::Hexagon),
            ("A[/Slanted/]", NodeShape::Parallelogram),
        ];
        for (text, shape) in cases {
            let mut input = text;
            let n = node_ref(&mut input).unwrap();
            assert_eq!(n.shape, Some(shape), "for {text}");
            assert!(input.is_empty(), "leftover {input:?} for {text}");
        }
    }

    #[test]
    fn parse_quoted_labels_keep_brackets() {
        let mut input = "A[\"[NOTE] Hello World\"]";
        assert_eq!(
            node_ref(&mut input).unwrap().label.as_deref(),
            Some("[NOTE] Hello World")
        );
        let mut input = "A{\"choice {A}\"}";
        assert_eq!(node_ref(&mut input).unwrap().label.as_deref(), Some("choice {A}"));
    }

    #[test]
    fn parse_arrow_tokens() {
        let mut input = "-.->rest";
        let link = arrow_token(&mut input).unwrap();
        assert_eq!(link.stroke, LinkStroke::Dashed);
        assert_eq!(link.end, ArrowHead::Arrow);
        assert_eq!(input, "rest");

        let mut input = "===rest";
        let link = arrow_token(&mut input).unwrap();
        assert_eq!(link.stroke, LinkStroke::Thick);
        assert_eq!(link.end, ArrowHead::None);

        let mut input = "<-->";
        let link = arrow_token(&mut input).unwrap();
        assert_eq!((link.start, link.end), (ArrowHead::Arrow, ArrowHead::Arrow));
    }

    #[test]
    fn parse_simple_td_graph() {
        let graph = parse("graph TD\n    A[Start] --> B[End]\n").unwrap();
        assert_eq!(graph.direction, Direction::TD);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].label, "Start");
        assert_eq!(graph.nodes[1].label, "End");
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "A->B");
        assert_eq!(graph.edges[0].end_arrow, ArrowHead::Arrow);
    }

    #[test]
    fn parse_tb_header_is_td() {
        assert_eq!(parse("flowchart TB\n A --> B").unwrap().direction, Direction::TD);
        assert_eq!(parse("graph RL\n A --> B").unwrap().direction, Direction::RL);
    }

    #[test]
    fn parse_unknown_direction_is_error() {
        let err = parse("graph XY\n A --> B").unwrap_err();
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn parse_pipe_labels() {
        let graph = parse("graph TD\n    A -->|yes| B\n    B ---|\"no\"| C\n").unwrap();
        assert_eq!(graph.edges[0].label.as_deref(), Some("yes"));
        assert_eq!(graph.edges[1].label.as_deref(), Some("no"));
        assert_eq!(graph.edges[1].end_arrow, ArrowHead::None);
    }

    #[test]
    fn parse_dash_labels() {
        let graph = parse("graph TD\n    A -- \"hello world\" --> B\n    B -- text --- C\n").unwrap();
        assert_eq!(graph.edges[0].label.as_deref(), Some("hello world"));
        assert_eq!(graph.edges[1].label.as_deref(), Some("text"));
        assert_eq!(graph.edges[1].end_arrow, ArrowHead::None);
    }

    #[test]
    fn parse_dotted_and_thick_edges_carry_style() {
        let graph = parse("graph LR\n    A -.-> B\n    B ==> C\n").unwrap();
        assert!(graph.edges[0].is_dashed());
        assert_eq!(
            graph.edges[1].style.as_ref().and_then(|s| s.stroke_width),
            Some(THICK_STROKE_WIDTH)
        );
    }

    #[test]
    fn parse_chained_edges() {
        let graph = parse("graph LR\n    A --> B --> C\n").unwrap();
        let ids: Vec<_> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A->B", "B->C"]);
    }

    #[test]
    fn parse_ampersand_fan_out() {
        let graph = parse("graph TD\n    A --> B & C\n").unwrap();
        let ids: Vec<_> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A->B", "A->C"]);
    }

    #[test]
    fn parse_no_space_edges() {
        let graph = parse("graph TD\n    A-->B\n").unwrap();
        assert_eq!(graph.edges[0].id, "A->B");
    }

    #[test]
    fn later_declaration_refines_node() {
        let graph = parse("graph TD\n    A --> B\n    A{Decide}\n").unwrap();
        assert_eq!(graph.nodes[0].label, "Decide");
        assert_eq!(graph.nodes[0].shape, NodeShape::Diamond);
    }

    #[test]
    fn bare_reference_does_not_reset_label() {
        let graph = parse("graph TD\n    A[Start] --> B\n    A --> C\n").unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].label, "Start");
    }

    #[test]
    fn duplicate_edges_collapse() {
        let graph = parse("graph TD\n    A --> B\n    A --> B\n").unwrap();
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn parse_subgraph_with_label() {
        let graph = parse(
            "graph TD\n    subgraph backend [Backend Services]\n        A[API] --> B[DB]\n    end\n",
        )
        .unwrap();
        assert_eq!(graph.groups.len(), 1);
        assert_eq!(graph.groups[0].id, "backend");
        assert_eq!(graph.groups[0].label, "Backend Services");
        assert_eq!(graph.groups[0].children, vec!["A", "B"]);
        assert_eq!(graph.nodes[0].group.as_deref(), Some("backend"));
    }

    #[test]
    fn parse_subgraph_free_text_title() {
        let graph = parse("graph TD\n    subgraph Backend Services\n        A --> B\n    end\n").unwrap();
        assert_eq!(graph.groups[0].id, "backend_services");
        assert_eq!(graph.groups[0].label, "Backend Services");
    }

    #[test]
    fn punctuated_subgraph_title_gets_a_readable_id() {
        let graph =
            parse("graph TD\n    subgraph \"API (v2)\"\n        A --> B\n    end\n").unwrap();
        assert_eq!(graph.groups[0].id, "api_v2");
        assert_eq!(graph.groups[0].label, "API (v2)");
        assert_eq!(slug("--", 3), "subgraph_3");
    }

    #[test]
    fn single_member_subgraph_is_dropped() {
        let graph = parse("graph TD\n    subgraph Group\n        A\n    end\n").unwrap();
        assert!(graph.groups.is_empty());
        assert_eq!(graph.nodes[0].group, None);
    }

    #[test]
    fn outer_nodes_stay_outside_subgraph() {
        let graph = parse(
            "graph TD\n    C\n    subgraph Backend\n        A --> B\n    end\n    C --> A\n",
        )
        .unwrap();
        assert_eq!(graph.groups[0].children, vec!["A", "B"]);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn directives_are_skipped() {
        let graph = parse(
            "graph TD\n    A --> B\n    style A fill:#f9f\n    classDef hot fill:#f00\n    class A hot\n    click A callback\n",
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn directive_keyword_can_be_a_node_id() {
        let graph = parse("graph TD\n    class --> B\n    style\n    class A hot\n").unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["class", "B", "style"]);
        assert_eq!(graph.edges[0].id, "class->B");
    }

    #[test]
    fn quot_escape_is_decoded() {
        let graph = parse("graph TD\n    A[\"say #quot;hi#quot;\"]\n").unwrap();
        assert_eq!(graph.nodes[0].label, "say \"hi\"");
    }

    #[test]
    fn line_without_identifier_is_error() {
        let err = parse("graph TD\n    A --> B\n    --> C\n").unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn dangling_link_is_error() {
        let err = parse("graph TD\n    A -->\n").unwrap_err();
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn malformed_shape_falls_back_to_rectangle() {
        let graph = parse("graph TD\n    A[unclosed\n").unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, "A");
        assert_eq!(graph.nodes[0].label, "A");
        assert_eq!(graph.nodes[0].shape, NodeShape::Rectangle);
    }

    #[test]
    fn trailing_semicolons_are_accepted() {
        let graph = parse("graph TD;\n    A --> B;\n").unwrap();
        assert_eq!(graph.edges.len(), 1);
    }
}
