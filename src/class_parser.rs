use tracing::trace;
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::prelude::*;
use winnow::token::{rest, take_until, take_while};

use crate::graph::{
    ArrowHead, ClassMember, ClassSections, DiagramType, Direction, GraphEdge, GraphIR, GraphNode,
    NodeShape, StrokeStyle, StyleHints, Visibility,
};
use crate::parser::{Line, after_keyword, strip_quotes, unescape};

/// Head and stroke implied by a class relation token.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Relation {
    start: ArrowHead,
    end: ArrowHead,
    dashed: bool,
}

impl Relation {
    const fn new(start: ArrowHead, end: ArrowHead, dashed: bool) -> Self {
        Self { start, end, dashed }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RelationLine {
    from: String,
    to: String,
    relation: Relation,
    label: Option<String>,
}

enum ClassLine {
    Relation(RelationLine),
    Member(String, String),
}

/// Parses `classDiagram` text, and `erDiagram` text when `diagram_type` is
/// [`DiagramType::Er`].
pub(crate) fn parse_class(lines: &[Line<'_>], diagram_type: DiagramType) -> GraphIR {
    let mut graph = GraphIR::empty(diagram_type, Direction::TD);
    let mut current: Option<String> = None;

    for line in lines.iter().skip(1) {
        let text = line.text;

        if let Some(owner) = current.clone() {
            if text.starts_with('}') {
                current = None;
            } else if !text.starts_with("<<") {
                add_member(&mut graph, &owner, text, diagram_type);
            }
            continue;
        }

        if let Some(rest) = after_keyword(text, "direction") {
            if let Ok(direction) = rest.parse() {
                graph.direction = direction;
            }
            continue;
        }
        if text.starts_with("<<") {
            continue;
        }
        if let Some(rest) = after_keyword(text, "class") {
            if let Some((name, label, opens_block)) = class_header(rest) {
                let node = ensure_class(&mut graph, &name);
                if let Some(label) = label {
                    node.label = label;
                }
                if opens_block {
                    current = Some(name);
                }
                continue;
            }
        }

        let mut input = text;
        if let Ok((name, true)) = entity_header.parse_next(&mut input) {
            ensure_class(&mut graph, &name);
            current = Some(name);
            continue;
        }

        let mut input = text;
        let parsed = alt((
            relation_line.map(ClassLine::Relation),
            er_relationship.map(ClassLine::Relation),
            explicit_member.map(|(owner, member)| ClassLine::Member(owner, member)),
        ))
        .parse_next(&mut input);
        match parsed {
            Ok(ClassLine::Relation(rel)) => push_relation(&mut graph, rel),
            Ok(ClassLine::Member(owner, member)) => {
                ensure_class(&mut graph, &owner);
                add_member(&mut graph, &owner, &member, diagram_type);
            }
            Err(_) => {
                let mut input = text;
                if let Ok((name, false)) = entity_header.parse_next(&mut input) {
                    if input.trim().is_empty() {
                        ensure_class(&mut graph, &name);
                        continue;
                    }
                }
                trace!(line = line.number, text, "skipping class line");
            }
        }
    }

    graph
}

fn ensure_class<'g>(graph: &'g mut GraphIR, name: &str) -> &'g mut GraphNode {
    let idx = match graph.nodes.iter().position(|n| n.id == name) {
        Some(idx) => idx,
        None => {
            let mut node = GraphNode::new(name, name, NodeShape::Rectangle);
            node.sections = Some(ClassSections::default());
            graph.nodes.push(node);
            graph.nodes.len() - 1
        }
    };
    &mut graph.nodes[idx]
}

fn add_member(graph: &mut GraphIR, owner: &str, text: &str, diagram_type: DiagramType) {
    let node = ensure_class(graph, owner);
    let sections = node.sections.get_or_insert_with(ClassSections::default);
    if diagram_type == DiagramType::Er {
        let text = text.trim();
        if !text.is_empty() {
            sections.attributes.push(ClassMember::new(text));
        }
        return;
    }
    match parse_member(text) {
        Some((member, true)) => sections.methods.push(member),
        Some((member, false)) => sections.attributes.push(member),
        None => {}
    }
}

fn push_relation(graph: &mut GraphIR, rel: RelationLine) {
    ensure_class(graph, &rel.from);
    ensure_class(graph, &rel.to);
    let mut edge = GraphEdge::new(&rel.from, &rel.to);
    edge.id = format!("{}_{}", edge.id, graph.edges.len());
    edge.label = rel.label;
    edge.start_arrow = rel.relation.start;
    edge.end_arrow = rel.relation.end;
    if rel.relation.dashed {
        edge.style = Some(StyleHints::stroke(StrokeStyle::Dashed));
    }
    graph.edges.push(edge);
}

/// Splits a member line into the member and whether it is a method.
///
/// A leading `+ - # ~` sets visibility; a trailing `$` marks it static and
/// a trailing `*` abstract. Parentheses make it a method.
pub fn parse_member(text: &str) -> Option<(ClassMember, bool)> {
    let mut text = text.trim();
    let visibility = text.chars().next().and_then(Visibility::from_marker);
    if visibility.is_some() {
        text = text[1..].trim_start();
    }

    let mut is_static = false;
    let mut is_abstract = false;
    loop {
        if let Some(t) = text.strip_suffix('$') {
            is_static = true;
            text = t.trim_end();
        } else if let Some(t) = text.strip_suffix('*') {
            is_abstract = true;
            text = t.trim_end();
        } else {
            break;
        }
    }

    if text.is_empty() {
        return None;
    }
    let is_method = text.contains('(');
    Some((
        ClassMember {
            text: text.to_string(),
            visibility,
            is_static,
            is_abstract,
        },
        is_method,
    ))
}

/// `Name`, `Name["Label"]` and an optional opening brace.
fn class_header(text: &str) -> Option<(String, Option<String>, bool)> {
    let mut input = text;
    let name = identifier.parse_next(&mut input).ok()?;
    let label = opt(class_label).parse_next(&mut input).ok()?;
    let rest = input.trim();
    let opens_block = rest.starts_with('{');
    if !(rest.is_empty() || opens_block || rest.starts_with('~') || rest.starts_with("<<")) {
        return None;
    }
    Some((
        name.to_string(),
        label.map(|l| unescape(strip_quotes(l.trim()))),
        opens_block,
    ))
}

fn class_label<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    delimited("[", take_until(0.., "]"), "]").parse_next(input)
}

/// `ENTITY {` (opens a block) or a bare `ENTITY` line.
fn entity_header(input: &mut &str) -> winnow::Result<(String, bool)> {
    let name = er_identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let opens = opt("{").parse_next(input)?.is_some();
    Ok((name.to_string(), opens))
}

fn explicit_member(input: &mut &str) -> winnow::Result<(String, String)> {
    let owner = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let member = preceded(":", rest).parse_next(input)?;
    Ok((owner.to_string(), member.trim().to_string()))
}

fn relation_line(input: &mut &str) -> winnow::Result<RelationLine> {
    let from = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    opt(cardinality_label).parse_next(input)?;
    let relation = relation_token.parse_next(input)?;
    space0.parse_next(input)?;
    opt(cardinality_label).parse_next(input)?;
    let to = identifier.parse_next(input)?;
    let label = relation_label.parse_next(input)?;
    Ok(RelationLine {
        from: from.to_string(),
        to: to.to_string(),
        relation,
        label,
    })
}

/// `"1"` / `"*"` multiplicities next to a relation are accepted and dropped.
fn cardinality_label<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    let text = delimited("\"", take_until(0.., "\""), "\"").parse_next(input)?;
    space0.parse_next(input)?;
    Ok(text)
}

fn relation_label(input: &mut &str) -> winnow::Result<Option<String>> {
    space0.parse_next(input)?;
    let text = opt(preceded(":", rest)).parse_next(input)?;
    if !input.trim().is_empty() {
        return Err(winnow::error::ParserError::from_input(input));
    }
    Ok(text
        .map(|t: &str| unescape(strip_quotes(t.trim())))
        .filter(|t| !t.is_empty()))
}

fn relation_token(input: &mut &str) -> winnow::Result<Relation> {
    use ArrowHead as H;
    alt((
        "<|--".value(Relation::new(H::Triangle, H::None, false)),
        "<|..".value(Relation::new(H::TriangleOutline, H::None, true)),
        "--|>".value(Relation::new(H::None, H::Triangle, false)),
        "..|>".value(Relation::new(H::None, H::TriangleOutline, true)),
        "*--".value(Relation::new(H::Diamond, H::None, false)),
        "--*".value(Relation::new(H::None, H::Diamond, false)),
        "o--".value(Relation::new(H::DiamondOutline, H::None, false)),
        "--o".value(Relation::new(H::None, H::DiamondOutline, false)),
        "<-->".value(Relation::new(H::Arrow, H::Arrow, false)),
        "-->".value(Relation::new(H::None, H::Arrow, false)),
        "<--".value(Relation::new(H::Arrow, H::None, false)),
        "..>".value(Relation::new(H::None, H::Arrow, true)),
        "<..".value(Relation::new(H::Arrow, H::None, true)),
        "--".value(Relation::new(H::None, H::None, false)),
        "..".value(Relation::new(H::None, H::None, true)),
    ))
    .parse_next(input)
}

/// `A ||--o{ B : label`. Cardinality ends map onto arrowheads so they
/// survive the canvas round trip.
fn er_relationship(input: &mut &str) -> winnow::Result<RelationLine> {
    let from = er_identifier.parse_next(input)?;
    space1.parse_next(input)?;
    let left = take_while(2, |c: char| matches!(c, '|' | 'o' | '}')).parse_next(input)?;
    let dashed = alt(("--".value(false), "..".value(true))).parse_next(input)?;
    let right = take_while(2, |c: char| matches!(c, '|' | 'o' | '{')).parse_next(input)?;
    space1.parse_next(input)?;
    let to = er_identifier.parse_next(input)?;
    let label = relation_label.parse_next(input)?;
    Ok(RelationLine {
        from: from.to_string(),
        to: to.to_string(),
        relation: Relation::new(cardinality_head(left), cardinality_head(right), dashed),
        label,
    })
}

/// `||` exactly one, `o|` zero or one, `}|` one or more, `}o` zero or more
/// (mirrored on the right-hand side).
pub(crate) fn cardinality_head(token: &str) -> ArrowHead {
    match token {
        "||" => ArrowHead::Bar,
        "o|" | "|o" => ArrowHead::Dot,
        "}|" | "|{" => ArrowHead::Triangle,
        "}o" | "o{" => ArrowHead::TriangleOutline,
        _ => ArrowHead::None,
    }
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

fn er_identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}
