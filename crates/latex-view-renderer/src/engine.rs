//! Render engines: the CPU-bound step that turns notation into an artifact.

use pulldown_latex::{
    Parser, Storage,
    config::{DisplayMode, RenderConfig as MathMlConfig},
    mathml::push_mathml,
};

use crate::error::EngineError;
use crate::fallback::format_for_display;
use crate::types::{Artifact, RenderRequest};

/// Something that can render one math segment.
///
/// Called on the blocking thread pool, so implementations may take their
/// time but must not assume an async context.
pub trait MathEngine: Send + Sync + 'static {
    fn render(&self, request: &RenderRequest) -> Result<Artifact, EngineError>;
}

/// LaTeX via pulldown-latex to MathML, with an estimated layout box.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulldownEngine;

/// Average glyph advance relative to the size hint.
const GLYPH_ADVANCE: f32 = 0.6;
/// Line height relative to the size hint.
const LINE_HEIGHT: f32 = 1.2;
/// Commands that stack content vertically and need a taller box.
const STACKED: &[&str] = &[r"\frac", r"\dfrac", r"\sum", r"\int", r"\prod", r"\binom"];

impl MathEngine for PulldownEngine {
    fn render(&self, request: &RenderRequest) -> Result<Artifact, EngineError> {
        let mathml = render_mathml(&request.notation)?;
        let (width, height) = measure(request);

        let markup = format!(
            r#"<span class="math" style="color:#{:06x};font-size:{}px">{}</span>"#,
            request.color_hint & 0x00FF_FFFF,
            request.size_hint,
            mathml
        );
        Ok(Artifact::new(width, height, markup))
    }
}

/// Render notation to a MathML string.
pub fn render_mathml(latex: &str) -> Result<String, EngineError> {
    let storage = Storage::new();
    let parser = Parser::new(latex, &storage);
    let config = MathMlConfig {
        display_mode: DisplayMode::Inline,
        ..Default::default()
    };

    // Collect first so every parse error is reported, not only the first.
    // Each error renders with a multi-line context box; only the headline is
    // kept.
    let events: Vec<_> = parser.collect();
    let errors: Vec<String> = events
        .iter()
        .filter_map(|e| e.as_ref().err().map(|err| headline(&err.to_string())))
        .collect();
    if !errors.is_empty() {
        return Err(EngineError::new(errors.join("; ")));
    }

    let mut mathml = String::new();
    push_mathml(&mut mathml, events.into_iter(), config)
        .map_err(|e| EngineError::new(e.to_string()))?;
    Ok(mathml)
}

fn headline(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim_end().to_owned()
}

/// Estimated box for the rendered notation, wrapped at `max_width`.
///
/// Not typographically exact; it only has to be stable for a given request
/// and zero when nothing visible would be drawn.
fn measure(request: &RenderRequest) -> (i32, i32) {
    let glyphs = format_for_display(&request.notation)
        .chars()
        .filter(|c| !c.is_whitespace())
        .count();
    let natural = (glyphs as f32 * GLYPH_ADVANCE * request.size_hint).ceil();
    if natural <= 0.0 {
        return (0, 0);
    }

    let (width, lines) = match request.max_width as f32 {
        max if max > 0.0 && natural > max => (max, (natural / max).ceil()),
        _ => (natural, 1.0),
    };
    let stacked = STACKED.iter().any(|cmd| request.notation.contains(cmd));
    let line_height = LINE_HEIGHT * request.size_hint * if stacked { 2.0 } else { 1.0 };

    (width as i32, (line_height * lines).ceil() as i32)
}
