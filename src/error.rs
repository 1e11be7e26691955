use thiserror::Error;

/// The single error the engine surfaces: the text could not be recognized as
/// a diagram, or a flowchart line could not be read as nodes or edges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("diagram syntax error{}: {message}", line_suffix(.line))]
pub struct DiagramSyntaxError {
    /// 1-based line of the offending input, when known.
    pub line: Option<usize>,
    pub message: String,
}

impl DiagramSyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}
