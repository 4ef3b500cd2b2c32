use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Coarse class of a failed render, surfaced to consumers as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    UnknownCommand,
    IncompleteExpression,
    SyntaxError,
    InvalidDimensions,
    Unknown,
}

/// Why one math segment could not be rendered.
///
/// Failures are per segment: the consumer decides whether to show the
/// fallback text or an inline error marker.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Unknown LaTeX command")]
    #[diagnostic(code(render::unknown_command))]
    UnknownCommand { message: String },

    #[error("Incomplete expression")]
    #[diagnostic(code(render::incomplete))]
    IncompleteExpression { message: String },

    #[error("Syntax error: {message}")]
    #[diagnostic(code(render::syntax))]
    SyntaxError { message: String },

    #[error("Invalid dimensions: {width}x{height}")]
    #[diagnostic(code(render::dimensions))]
    InvalidDimensions { width: i32, height: i32 },

    #[error("{message}")]
    #[diagnostic(code(render::unknown))]
    Unknown { message: String },
}

/// Substring rules for classifying engine messages, checked in order.
const CLASSIFIERS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::UnknownCommand,
        &[
            "unknown symbol",
            "unknown command",
            "undefined control sequence",
            "unknown control sequence",
            "unknown primitive command",
            "unknown mathematical environment",
            // pulldown-latex spells it this way
            "unkown mathematical environment",
        ],
    ),
    (
        ErrorCategory::IncompleteExpression,
        &["missing", "end of input", "unbalanced"],
    ),
    (ErrorCategory::SyntaxError, &["expected"]),
];

impl RenderError {
    /// Classify a raw engine failure message. First matching rule wins.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let category = CLASSIFIERS
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
            .map_or(ErrorCategory::Unknown, |(category, _)| *category);

        let message = message.to_owned();
        match category {
            ErrorCategory::UnknownCommand => Self::UnknownCommand { message },
            ErrorCategory::IncompleteExpression => Self::IncompleteExpression { message },
            ErrorCategory::SyntaxError => Self::SyntaxError { message },
            _ if message.trim().is_empty() => Self::Unknown {
                message: "Unknown rendering error".to_owned(),
            },
            _ => Self::Unknown { message },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownCommand { .. } => ErrorCategory::UnknownCommand,
            Self::IncompleteExpression { .. } => ErrorCategory::IncompleteExpression,
            Self::SyntaxError { .. } => ErrorCategory::SyntaxError,
            Self::InvalidDimensions { .. } => ErrorCategory::InvalidDimensions,
            Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }
}

/// Failure reported by a [`crate::engine::MathEngine`] before classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_order() {
        assert_eq!(
            RenderError::classify("Unknown symbol or command or predefined TeXFormula: 'foo'")
                .category(),
            ErrorCategory::UnknownCommand
        );
        assert_eq!(
            RenderError::classify("Missing close brace").category(),
            ErrorCategory::IncompleteExpression
        );
        assert_eq!(
            RenderError::classify("expected a group").category(),
            ErrorCategory::SyntaxError
        );
        // "missing" outranks "expected"
        assert_eq!(
            RenderError::classify("expected argument, missing brace").category(),
            ErrorCategory::IncompleteExpression
        );
        assert_eq!(
            RenderError::classify("parsing error: unknown primitive command found").category(),
            ErrorCategory::UnknownCommand
        );
        assert_eq!(
            RenderError::classify("parsing error: unkown mathematical environment found")
                .category(),
            ErrorCategory::UnknownCommand
        );
        assert_eq!(
            RenderError::classify("font cache exploded").category(),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            RenderError::classify("unknown command \\foo").to_string(),
            "Unknown LaTeX command"
        );
        assert_eq!(
            RenderError::classify("expected `}`").to_string(),
            "Syntax error: expected `}`"
        );
        assert_eq!(
            RenderError::InvalidDimensions {
                width: 0,
                height: 12
            }
            .to_string(),
            "Invalid dimensions: 0x12"
        );
        assert_eq!(RenderError::classify("").to_string(), "Unknown rendering error");
        assert_eq!(RenderError::classify("boom").to_string(), "boom");
    }
}
