//! Diagram text → [`GraphIR`]. The first content line selects the grammar.

use tracing::debug;

use crate::class_parser;
use crate::error::DiagramSyntaxError;
use crate::graph::{DiagramType, Direction, GraphIR};
use crate::graph_parser;
use crate::sequence_parser;
use crate::state_parser;

/// A trimmed, non-blank, non-comment source line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Line<'a> {
    pub number: usize,
    pub text: &'a str,
}

const COMMENT_MARKER: &str = "%%";

pub fn parse(input: &str) -> Result<GraphIR, DiagramSyntaxError> {
    let lines = content_lines(input);
    let Some(header) = lines.first() else {
        return Ok(GraphIR::empty(DiagramType::Flowchart, Direction::TD));
    };

    let keyword = header
        .text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let graph = if keyword.starts_with("sequencediagram") {
        sequence_parser::parse_sequence(&lines)
    } else if keyword.starts_with("classdiagram") {
        class_parser::parse_class(&lines, DiagramType::Class)
    } else if keyword.starts_with("statediagram") {
        state_parser::parse_state(&lines)
    } else if keyword.starts_with("erdiagram") {
        class_parser::parse_class(&lines, DiagramType::Er)
    } else if keyword.starts_with("gantt") {
        GraphIR::empty(DiagramType::Gantt, Direction::LR)
    } else if keyword.starts_with("mindmap") {
        GraphIR::empty(DiagramType::Mindmap, Direction::LR)
    } else if keyword.starts_with("c4") {
        let mut graph = graph_parser::parse_flowchart(&lines[1..], true)?;
        graph.diagram_type = DiagramType::C4;
        graph
    } else if keyword == "graph" || keyword == "flowchart" {
        let direction = graph_parser::header_direction(header)?;
        let mut graph = graph_parser::parse_flowchart(&lines[1..], false)?;
        graph.direction = direction;
        graph
    } else {
        let first_word = header.text.split_whitespace().next().unwrap_or_default();
        return Err(DiagramSyntaxError::at_line(
            header.number,
            format!("unknown diagram type: {}", snippet(first_word)),
        ));
    };

    debug!(
        diagram = graph.diagram_type.as_str(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        groups = graph.groups.len(),
        "parsed diagram text"
    );
    Ok(graph)
}

/// Trimmed lines with blanks, `%%` comments and a leading `---` front-matter
/// block removed.
pub(crate) fn content_lines(input: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut in_front_matter = false;
    for (idx, raw) in input.lines().enumerate() {
        let text = raw.trim();
        if text == "---" && (in_front_matter || lines.is_empty()) {
            in_front_matter = !in_front_matter;
            continue;
        }
        if in_front_matter || text.is_empty() || text.starts_with(COMMENT_MARKER) {
            continue;
        }
        lines.push(Line {
            number: idx + 1,
            text,
        });
    }
    lines
}

/// Short form of a line for error messages.
pub(crate) fn snippet(text: &str) -> String {
    if text.chars().count() > 40 {
        let cut: String = text.chars().take(40).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Removes one pair of surrounding double quotes.
pub(crate) fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Decodes the Mermaid entities `#quot;` and `#35;` (a literal `#`). Any
/// other `#` is kept as is.
pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('#') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        if let Some(after) = rest.strip_prefix("#quot;") {
            out.push('"');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("#35;") {
            out.push('#');
            rest = after;
        } else {
            out.push('#');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn escape(text: &str) -> String {
    text.replace('#', "#35;").replace('"', "#quot;")
}

/// Returns the rest of `text` when it starts with `word` followed by
/// whitespace or the end of the line.
pub(crate) fn after_keyword<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(word)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_input_is_empty_flowchart() {
        let graph = parse("").unwrap();
        assert_eq!(graph.diagram_type, DiagramType::Flowchart);
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn only_comments_is_empty() {
        let graph = parse("%% nothing here\n\n   %% still nothing\n").unwrap();
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn bare_header_is_empty() {
        let graph = parse("graph TD").unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn unknown_header_is_syntax_error() {
        let err = parse("this is not a diagram").unwrap_err();
        assert_eq!(err.line, Some(1));
        assert!(err.message.contains("unknown diagram type"), "got: {err}");
        assert!(err.message.contains("this"), "got: {err}");
    }

    #[test]
    fn comment_before_header_is_skipped() {
        let graph = parse("%% title\nsequenceDiagram\n  A->>B: hi\n").unwrap();
        assert_eq!(graph.diagram_type, DiagramType::Sequence);
    }

    #[test]
    fn front_matter_is_skipped() {
        let graph = parse("---\ntitle: Demo\n---\ngraph LR\n  A --> B\n").unwrap();
        assert_eq!(graph.direction, Direction::LR);
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn dispatches_each_header() {
        let cases = [
            ("classDiagram\n class A", DiagramType::Class),
            ("stateDiagram-v2\n A --> B", DiagramType::State),
            ("erDiagram\n A ||--o{ B : has", DiagramType::Er),
            ("gantt\n title x", DiagramType::Gantt),
            ("mindmap\n root", DiagramType::Mindmap),
            ("C4Context\n A --> B", DiagramType::C4),
            ("flowchart LR\n A --> B", DiagramType::Flowchart),
        ];
        for (text, expected) in cases {
            assert_eq!(parse(text).unwrap().diagram_type, expected, "for {text:?}");
        }
    }

    #[test]
    fn gantt_and_mindmap_are_empty() {
        assert!(parse("gantt\n  section A\n  task :a1, 2024-01-01, 3d").unwrap().nodes.is_empty());
        assert!(parse("mindmap\n  root\n    child").unwrap().nodes.is_empty());
    }

    #[test]
    fn snippet_truncates_long_lines() {
        let long = "x".repeat(50);
        assert_eq!(snippet(&long), format!("{}...", "x".repeat(40)));
    }

    #[test]
    fn entities_invert_escape() {
        for text in ["say \"hi\"", "literal #quot; entity", "C# #35;", "#"] {
            assert_eq!(unescape(&escape(text)), text);
        }
        assert_eq!(unescape("#1 #quot;x#quot;"), "#1 \"x\"");
    }

    #[test]
    fn after_keyword_requires_boundary() {
        assert_eq!(after_keyword("subgraph one", "subgraph"), Some("one"));
        assert_eq!(after_keyword("subgraph", "subgraph"), Some(""));
        assert_eq!(after_keyword("subgraphs", "subgraph"), None);
    }
}
