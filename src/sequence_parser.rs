use tracing::trace;
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;
use winnow::token::{rest, take_while};

use crate::graph::{
    ArrowHead, DiagramType, Direction, GraphEdge, GraphIR, GraphNode, NodeShape, StrokeStyle,
    StyleHints,
};
use crate::parser::{Line, after_keyword, strip_quotes, unescape};

/// Lines that shape how a sequence renders but carry no nodes or messages.
const IGNORED_KEYWORDS: [&str; 17] = [
    "Note", "note", "activate", "deactivate", "autonumber", "loop", "alt", "else", "opt", "par",
    "and", "critical", "break", "rect", "end", "title", "box",
];

#[derive(Debug, Clone, PartialEq)]
struct Participant {
    id: String,
    alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct Message {
    from: String,
    to: String,
    dashed: bool,
    head: ArrowHead,
    text: Option<String>,
}

enum SequenceLine {
    Participant(Participant),
    Message(Message),
}

pub(crate) fn parse_sequence(lines: &[Line<'_>]) -> GraphIR {
    let mut graph = GraphIR::empty(DiagramType::Sequence, Direction::LR);
    let mut message_index = 0;

    for line in lines.iter().skip(1) {
        if IGNORED_KEYWORDS
            .iter()
            .any(|k| after_keyword(line.text, k).is_some())
        {
            continue;
        }
        let mut input = line.text;
        let parsed = alt((
            participant_decl.map(SequenceLine::Participant),
            message.map(SequenceLine::Message),
        ))
        .parse_next(&mut input);

        match parsed {
            Ok(SequenceLine::Participant(p)) => {
                let label = p.alias.unwrap_or_else(|| p.id.clone());
                match graph.node_mut(&p.id) {
                    Some(node) => node.label = label,
                    None => graph.nodes.push(GraphNode::new(&p.id, label, NodeShape::Rectangle)),
                }
            }
            Ok(SequenceLine::Message(m)) => {
                for id in [&m.from, &m.to] {
                    if !graph.contains_node(id) {
                        graph.nodes.push(GraphNode::new(id, id, NodeShape::Rectangle));
                    }
                }
                let mut edge = GraphEdge::new(&m.from, &m.to);
                edge.id = format!("{}_{message_index}", edge.id);
                edge.label = m.text;
                edge.end_arrow = m.head;
                if m.dashed {
                    edge.style = Some(StyleHints::stroke(StrokeStyle::Dashed));
                }
                graph.edges.push(edge);
                message_index += 1;
            }
            Err(_) => trace!(line = line.number, text = line.text, "skipping sequence line"),
        }
    }

    graph
}

fn participant_decl(input: &mut &str) -> winnow::Result<Participant> {
    alt(("participant", "actor")).parse_next(input)?;
    space1.parse_next(input)?;
    let id = identifier.parse_next(input)?;
    let alias = opt(preceded((space1, "as", space1), rest)).parse_next(input)?;
    space0.parse_next(input)?;
    if !input.is_empty() {
        return Err(winnow::error::ParserError::from_input(input));
    }

    Ok(Participant {
        id: id.to_string(),
        alias: alias
            .map(|a: &str| unescape(strip_quotes(a.trim())))
            .filter(|a| !a.is_empty()),
    })
}

fn message(input: &mut &str) -> winnow::Result<Message> {
    let from = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let (dashed, head) = arrow.parse_next(input)?;
    opt(alt(("+", "-"))).parse_next(input)?;
    space0.parse_next(input)?;
    let to = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let text = opt(preceded(":", rest)).parse_next(input)?;
    if !input.trim().is_empty() {
        return Err(winnow::error::ParserError::from_input(input));
    }

    Ok(Message {
        from: from.to_string(),
        to: to.to_string(),
        dashed,
        head,
        text: text
            .map(|t: &str| unescape(t.trim()))
            .filter(|t| !t.is_empty()),
    })
}

/// Returns whether the line is dashed and which head it ends in.
fn arrow(input: &mut &str) -> winnow::Result<(bool, ArrowHead)> {
    let dashed = alt(("--".value(true), "-".value(false))).parse_next(input)?;
    let head = alt((
        ">>".value(ArrowHead::Arrow),
        ">".value(ArrowHead::None),
        "x".value(ArrowHead::Bar),
        ")".value(ArrowHead::TriangleOutline),
    ))
    .parse_next(input)?;
    Ok((dashed, head))
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_identifier_stops_at_arrow() {
        let mut input = "Alice->>Bob";
        assert_eq!(identifier(&mut input).unwrap(), "Alice");
        assert_eq!(input, "->>Bob");
    }

    #[test]
    fn parse_arrow_variants() {
        let cases = [
            ("->", false, ArrowHead::None),
            ("->>", false, ArrowHead::Arrow),
            ("-->", true, ArrowHead::None),
            ("-->>", true, ArrowHead::Arrow),
            ("-x", false, ArrowHead::Bar),
            ("--x", true, ArrowHead::Bar),
            ("-)", false, ArrowHead::TriangleOutline),
            ("--)", true, ArrowHead::TriangleOutline),
        ];
        for (text, dashed, head) in cases {
            let mut input = text;
            assert_eq!(arrow(&mut input).unwrap(), (dashed, head), "for {text}");
            assert_eq!(input, "");
        }
    }

    #[test]
    fn parse_participant_with_alias() {
        let mut input = "participant A as \"Alice Smith\"";
        let p = participant_decl(&mut input).unwrap();
        assert_eq!(p.id, "A");
        assert_eq!(p.alias.as_deref(), Some("Alice Smith"));

        let mut input = "actor B as Bob";
        assert_eq!(participant_decl(&mut input).unwrap().alias.as_deref(), Some("Bob"));
    }

    #[test]
    fn parse_message_with_activation_modifier() {
        let mut input = "Alice->>+Bob: Hello";
        let m = message(&mut input).unwrap();
        assert_eq!(m.from, "Alice");
        assert_eq!(m.to, "Bob");
        assert_eq!(m.text.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_message_without_text() {
        let mut input = "A->>B";
        assert_eq!(message(&mut input).unwrap().text, None);
    }

    #[test]
    fn participants_keep_declaration_order() {
        let graph = parse(
            "sequenceDiagram\n    participant B as Bob\n    participant A as Alice\n    A->>B: hi\n    B->>C: fwd\n",
        )
        .unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert_eq!(graph.nodes[0].label, "Bob");
        assert_eq!(graph.nodes[2].label, "C");
    }

    #[test]
    fn messages_get_indexed_ids() {
        let graph = parse("sequenceDiagram\n    A->>B: one\n    A->>B: two\n    B-->>A: back\n").unwrap();
        let ids: Vec<_> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A->B_0", "A->B_1", "B->A_2"]);
        assert!(!graph.edges[0].is_dashed());
        assert!(graph.edges[2].is_dashed());
    }

    #[test]
    fn notes_and_blocks_are_discarded() {
        let graph = parse(
            "sequenceDiagram\n    autonumber\n    Note over A,B: chatting\n    loop Every minute\n        A->>B: ping\n    end\n    activate B\n",
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }
}
