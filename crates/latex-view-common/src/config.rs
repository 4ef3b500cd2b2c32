use serde::{Deserialize, Serialize};

use crate::color::parse_hex_color;
use crate::error::ConfigError;

/// Rendering configuration shared by the pipeline and the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Byte budget of the render cache.
    pub cache_budget_bytes: usize,
    /// Base text size of the surrounding prose.
    pub text_size: f32,
    /// Text colour as a `#RRGGBB` / `#AARRGGBB` string.
    pub text_color: String,
    /// Multiplier applied to `text_size` for native math renders.
    pub native_scale: f32,
    /// Multiplier applied to `text_size` for fallback text.
    pub fallback_scale: f32,
    /// Always show math through the plain-text fallback.
    pub use_fallback: bool,
}

impl RenderConfig {
    /// 20 MiB, enough for a few hundred typical inline formulas.
    pub const DEFAULT_CACHE_BYTES: usize = 20 * 1024 * 1024;

    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `LATEX_VIEW_CACHE_BYTES`: render cache budget in bytes (default: 20 MiB)
    /// - `LATEX_VIEW_TEXT_SIZE`: base text size (default: 16)
    /// - `LATEX_VIEW_TEXT_COLOR`: text colour (default: #333333)
    /// - `LATEX_VIEW_NATIVE_SCALE`: native render size multiplier (default: 2.5)
    /// - `LATEX_VIEW_FALLBACK_SCALE`: fallback text size multiplier (default: 0.9)
    /// - `LATEX_VIEW_USE_FALLBACK`: `true`/`false` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`RenderConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("LATEX_VIEW_CACHE_BYTES") {
            config.cache_budget_bytes = parse_var("LATEX_VIEW_CACHE_BYTES", &value)?;
        }
        if let Some(value) = lookup("LATEX_VIEW_TEXT_SIZE") {
            config.text_size = parse_var("LATEX_VIEW_TEXT_SIZE", &value)?;
        }
        if let Some(value) = lookup("LATEX_VIEW_TEXT_COLOR") {
            config.text_color = value;
        }
        if let Some(value) = lookup("LATEX_VIEW_NATIVE_SCALE") {
            config.native_scale = parse_var("LATEX_VIEW_NATIVE_SCALE", &value)?;
        }
        if let Some(value) = lookup("LATEX_VIEW_FALLBACK_SCALE") {
            config.fallback_scale = parse_var("LATEX_VIEW_FALLBACK_SCALE", &value)?;
        }
        if let Some(value) = lookup("LATEX_VIEW_USE_FALLBACK") {
            config.use_fallback = parse_var("LATEX_VIEW_USE_FALLBACK", &value)?;
        }

        config.validate()?;
        tracing::debug!(?config, "render configuration loaded");
        Ok(config)
    }

    /// Check budgets and sizes, and that the colour parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_budget_bytes == 0 {
            return Err(ConfigError::ZeroCacheBudget);
        }
        for (field, value) in [
            ("text_size", self.text_size),
            ("native_scale", self.native_scale),
            ("fallback_scale", self.fallback_scale),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        parse_hex_color(&self.text_color)?;
        Ok(())
    }

    /// Text colour as packed ARGB.
    pub fn color_argb(&self) -> Result<u32, ConfigError> {
        Ok(parse_hex_color(&self.text_color)?)
    }

    /// Size hint for native math renders.
    pub fn native_size(&self) -> f32 {
        self.text_size * self.native_scale
    }

    /// Size used for fallback text.
    pub fn fallback_size(&self) -> f32 {
        self.text_size * self.fallback_scale
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cache_budget_bytes: Self::DEFAULT_CACHE_BYTES,
            text_size: 16.0,
            text_color: "#333333".to_owned(),
            native_scale: 2.5,
            fallback_scale: 0.9,
            use_fallback: true,
        }
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value: value.to_owned(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.native_size(), 40.0);
        assert_eq!(config.color_argb(), Ok(0xFF33_3333));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = RenderConfig::from_lookup(lookup_from(&[
            ("LATEX_VIEW_CACHE_BYTES", "4096"),
            ("LATEX_VIEW_TEXT_SIZE", "12"),
            ("LATEX_VIEW_FALLBACK_SCALE", "0.5"),
            ("LATEX_VIEW_USE_FALLBACK", "false"),
        ]))
        .unwrap();
        assert_eq!(config.fallback_size(), 6.0);
        assert_eq!(config.cache_budget_bytes, 4096);
        assert_eq!(config.text_size, 12.0);
        assert!(!config.use_fallback);
        assert_eq!(config.text_color, "#333333");
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = RenderConfig::from_lookup(lookup_from(&[("LATEX_VIEW_CACHE_BYTES", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "LATEX_VIEW_CACHE_BYTES",
                ..
            }
        ));
    }

    #[test]
    fn validation_rejects_zero_budget_and_bad_colour() {
        let err = RenderConfig::from_lookup(lookup_from(&[("LATEX_VIEW_CACHE_BYTES", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCacheBudget);

        let err = RenderConfig::from_lookup(lookup_from(&[("LATEX_VIEW_TEXT_COLOR", "red")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Color(_)));
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: RenderConfig =
            serde_json::from_str(r##"{"text_color": "#000000", "use_fallback": false}"##).unwrap();
        assert_eq!(config.text_color, "#000000");
        assert!(!config.use_fallback);
        assert_eq!(config.cache_budget_bytes, RenderConfig::DEFAULT_CACHE_BYTES);
    }
}
