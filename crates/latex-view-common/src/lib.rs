//! Shared plumbing for the latex-view crates: configuration, colour parsing,
//! error types, timing helpers and (behind the `telemetry` feature) tracing
//! subscriber setup.

pub mod color;
pub mod config;
pub mod error;
pub mod perf;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::color::parse_hex_color;
pub use crate::config::RenderConfig;
pub use crate::error::{ColorError, ConfigError};
