//! Error types shared by latex-view crates.

use miette::Diagnostic;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {message}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue {
        var: &'static str,
        value: String,
        message: String,
    },

    #[error("cache budget must be greater than zero")]
    #[diagnostic(
        code(config::cache_budget),
        help("set LATEX_VIEW_CACHE_BYTES to a positive byte count")
    )]
    ZeroCacheBudget,

    #[error("{field} must be a positive number, got {value}")]
    #[diagnostic(code(config::non_positive))]
    NonPositive { field: &'static str, value: f32 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Color(#[from] ColorError),
}

/// Colour string parsing errors
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("invalid colour {input:?}")]
    #[diagnostic(
        code(color::invalid),
        help("use #RRGGBB or #AARRGGBB hex notation")
    )]
    Invalid { input: String },
}
