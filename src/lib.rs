pub mod canvas;
pub mod canvas_parser;
pub mod class_layout;
pub mod class_parser;
pub mod diff;
pub mod error;
pub mod generator;
pub mod graph;
pub mod graph_layout;
pub mod graph_parser;
pub mod layout;
pub mod parser;
pub mod reconcile;
pub mod sequence_layout;
pub mod sequence_parser;
pub mod serializer;
pub mod state_parser;
pub mod text_metrics;

pub use canvas::{BoardStyle, Element};
pub use error::DiagramSyntaxError;
pub use graph::GraphIR;
pub use layout::LayoutOptions;
pub use reconcile::{ReconcileOptions, reconcile, reconcile_with_options};

/// Diagram text for a canvas. Containers without identity metadata are
/// described under derived ids.
pub fn describe(elements: &[Element], compact: bool) -> String {
    let graph = canvas_parser::parse(elements);
    if compact {
        serializer::serialize_compact(&graph)
    } else {
        serializer::serialize(&graph)
    }
}

/// Parses diagram text and writes it back in canonical form.
pub fn format(text: &str, compact: bool) -> Result<String, DiagramSyntaxError> {
    let graph = parser::parse(text)?;
    Ok(if compact {
        serializer::serialize_compact(&graph)
    } else {
        serializer::serialize(&graph)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn format_unknown_diagram_type_returns_error() {
        let err = format("classyDiagram\n  Foo\n", false).unwrap_err();
        assert!(
            err.message.contains("unknown diagram type"),
            "error should mention unknown diagram type, got: {err}"
        );
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn format_is_stable() {
        let once = format("graph LR\n  A-->B\n", false).unwrap();
        assert_eq!(format(&once, false).unwrap(), once);
    }

    #[test]
    fn describe_empty_canvas_is_an_empty_flowchart() {
        assert_eq!(describe(&[], false), "graph TD\n");
    }

    #[test]
    fn describe_reads_back_a_reconciled_canvas() {
        let elements = reconcile("graph LR\n    A --> B\n", &[]).unwrap();
        let text = describe(&elements, true);
        assert_eq!(text, "graph LR\n  A --> B\n");
    }
}
