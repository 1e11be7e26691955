use tracing::trace;
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::prelude::*;
use winnow::token::{rest, take_until, take_while};

use crate::graph::{DiagramType, Direction, GraphEdge, GraphIR, GraphNode, NodeShape};
use crate::parser::{Line, after_keyword, strip_quotes, unescape};

/// Node id shared by the `[*]` start and end pseudo-states.
pub const START_END_ID: &str = "start_end";
pub const START_END_LABEL: &str = "Start/End";
const PSEUDO_STATE: &str = "[*]";

#[derive(Debug, PartialEq)]
enum StateLine {
    Declaration {
        id: String,
        label: Option<String>,
        shape: Option<NodeShape>,
    },
    Transition {
        from: String,
        to: String,
        label: Option<String>,
    },
    Description {
        id: String,
        text: String,
    },
}

pub(crate) fn parse_state(lines: &[Line<'_>]) -> GraphIR {
    let mut graph = GraphIR::empty(DiagramType::State, Direction::TD);

    for line in lines.iter().skip(1) {
        let text = line.text;
        if let Some(rest) = after_keyword(text, "direction") {
            if let Ok(direction) = rest.parse() {
                graph.direction = direction;
            }
            continue;
        }
        if text.starts_with('}') || after_keyword(text, "note").is_some() {
            continue;
        }

        let mut input = text;
        let parsed = alt((state_declaration, transition, description)).parse_next(&mut input);
        match parsed {
            Ok(StateLine::Declaration { id, label, shape }) => {
                let node = ensure_state(&mut graph, &id);
                if let Some(label) = label {
                    node.label = label;
                }
                if let Some(shape) = shape {
                    node.shape = shape;
                }
            }
            Ok(StateLine::Transition { from, to, label }) => {
                let from = ensure_state(&mut graph, &from).id.clone();
                let to = ensure_state(&mut graph, &to).id.clone();
                let mut edge = GraphEdge::new(&from, &to);
                edge.id = format!("{}_{}", edge.id, graph.edges.len());
                edge.label = label;
                graph.edges.push(edge);
            }
            Ok(StateLine::Description { id, text }) => {
                ensure_state(&mut graph, &id).label = text;
            }
            Err(_) => trace!(line = line.number, text, "skipping state line"),
        }
    }

    graph
}

fn ensure_state<'g>(graph: &'g mut GraphIR, name: &str) -> &'g mut GraphNode {
    let id = if name == PSEUDO_STATE { START_END_ID } else { name };
    let idx = match graph.nodes.iter().position(|n| n.id == id) {
        Some(idx) => idx,
        None => {
            let node = if id == START_END_ID {
                GraphNode::new(id, START_END_LABEL, NodeShape::Circle)
            } else {
                GraphNode::new(id, id, NodeShape::Rounded)
            };
            graph.nodes.push(node);
            graph.nodes.len() - 1
        }
    };
    &mut graph.nodes[idx]
}

/// `state "Label" as S1`, `state S1`, `state S1 {` and `state S1 <<choice>>`.
fn state_declaration(input: &mut &str) -> winnow::Result<StateLine> {
    "state".parse_next(input)?;
    space1.parse_next(input)?;
    let quoted = opt((
        delimited("\"", take_until(0.., "\""), "\""),
        (space1, "as", space1),
    ))
    .parse_next(input)?;
    let id = state_id.parse_next(input)?;
    space0.parse_next(input)?;
    let stereotype = opt(delimited("<<", take_until(1.., ">>"), ">>")).parse_next(input)?;
    space0.parse_next(input)?;
    opt("{").parse_next(input)?;
    if !input.trim().is_empty() {
        return Err(winnow::error::ParserError::from_input(input));
    }

    Ok(StateLine::Declaration {
        id: id.to_string(),
        label: quoted.map(|(label, _)| unescape(label)),
        shape: stereotype.map(|s: &str| match s {
            "choice" => NodeShape::Diamond,
            _ => NodeShape::Rectangle,
        }),
    })
}

fn transition(input: &mut &str) -> winnow::Result<StateLine> {
    let from = state_ref.parse_next(input)?;
    space0.parse_next(input)?;
    "-->".parse_next(input)?;
    space0.parse_next(input)?;
    let to = state_ref.parse_next(input)?;
    space0.parse_next(input)?;
    let label = opt(preceded(":", rest)).parse_next(input)?;
    if !input.trim().is_empty() {
        return Err(winnow::error::ParserError::from_input(input));
    }

    Ok(StateLine::Transition {
        from: from.to_string(),
        to: to.to_string(),
        label: label
            .map(|l: &str| unescape(strip_quotes(l.trim())))
            .filter(|l| !l.is_empty()),
    })
}

fn description(input: &mut &str) -> winnow::Result<StateLine> {
    let id = state_id.parse_next(input)?;
    space0.parse_next(input)?;
    let text = preceded(":", rest).parse_next(input)?;
    Ok(StateLine::Description {
        id: id.to_string(),
        text: unescape(text.trim()),
    })
}

fn state_ref<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    alt((PSEUDO_STATE, state_id)).parse_next(input)
}

fn state_id<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_transition_with_label() {
        let mut input = "Idle --> Running : start";
        assert_eq!(
            transition(&mut input).unwrap(),
            StateLine::Transition {
                from: "Idle".to_string(),
                to: "Running".to_string(),
                label: Some("start".to_string()),
            }
        );
    }

    #[test]
    fn parse_state_alias() {
        let mut input = "state \"Waiting for input\" as Waiting";
        assert_eq!(
            state_declaration(&mut input).unwrap(),
            StateLine::Declaration {
                id: "Waiting".to_string(),
                label: Some("Waiting for input".to_string()),
                shape: None,
            }
        );
    }

    #[test]
    fn pseudo_state_becomes_start_end_circle() {
        let graph = parse("stateDiagram-v2\n    [*] --> Idle\n    Idle --> [*]\n").unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![START_END_ID, "Idle"]);
        assert_eq!(graph.nodes[0].label, START_END_LABEL);
        assert_eq!(graph.nodes[0].shape, NodeShape::Circle);
        assert_eq!(graph.nodes[1].shape, NodeShape::Rounded);
        let edge_ids: Vec<_> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(edge_ids, vec!["start_end->Idle_0", "Idle->start_end_1"]);
    }

    #[test]
    fn descriptions_and_declarations_set_labels() {
        let graph = parse(
            "stateDiagram\n    direction LR\n    state \"Still\" as S1\n    S2 : Moving fast\n    S1 --> S2\n    state Choice <<choice>>\n",
        )
        .unwrap();
        assert_eq!(graph.direction, Direction::LR);
        assert_eq!(graph.node("S1").unwrap().label, "Still");
        assert_eq!(graph.node("S2").unwrap().label, "Moving fast");
        assert_eq!(graph.node("Choice").unwrap().shape, NodeShape::Diamond);
    }

    #[test]
    fn composite_state_lines_are_tolerated() {
        let graph = parse(
            "stateDiagram-v2\n    state Active {\n        Idle --> Busy\n    }\n    note right of Idle : hi\n",
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 1);
    }
}
