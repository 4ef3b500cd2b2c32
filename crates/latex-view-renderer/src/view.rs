//! Turning a whole content string into displayable blocks.
//!
//! Text passes through verbatim; each math segment is rendered natively or
//! shown as fallback text. A failing segment falls back on its own and never
//! affects its siblings.

use std::collections::{BTreeMap, HashMap};

use latex_view_common::{ConfigError, RenderConfig, perf};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::engine::MathEngine;
use crate::error::RenderError;
use crate::fallback::format_for_display;
use crate::pipeline::RenderPipeline;
use crate::segment::{SegmentKind, has_latex, segment};
use crate::slot::DisplayMode;
use crate::types::{RenderRequest, RenderResult, RenderedMath};

/// Resolved style for one composition pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewStyle {
    pub native_size: f32,
    pub fallback_size: f32,
    pub color: u32,
    pub use_fallback: bool,
    pub max_width: u32,
}

impl ViewStyle {
    pub fn from_config(config: &RenderConfig, max_width: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            native_size: config.native_size(),
            fallback_size: config.fallback_size(),
            color: config.color_argb()?,
            use_fallback: config.use_fallback,
            max_width,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComposedBlock {
    Text(String),
    Math {
        display: DisplayMode,
        notation: String,
        body: MathBody,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MathBody {
    Native(RenderedMath),
    /// Plain-text approximation, with the render failure that caused it if
    /// native rendering was attempted.
    Fallback {
        text: String,
        error: Option<RenderError>,
    },
}

impl MathBody {
    fn fallback(notation: &str, error: Option<RenderError>) -> Self {
        MathBody::Fallback {
            text: format_for_display(notation),
            error,
        }
    }
}

/// Flat, serialisable summary of a composed block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockSummary {
    Text { text: String },
    Native { display: DisplayMode, width: u32, height: u32 },
    Fallback { display: DisplayMode, text: String, error: Option<String> },
}

impl ComposedBlock {
    pub fn summary(&self) -> BlockSummary {
        match self {
            ComposedBlock::Text(text) => BlockSummary::Text { text: text.clone() },
            ComposedBlock::Math {
                display,
                body: MathBody::Native(math),
                ..
            } => BlockSummary::Native {
                display: *display,
                width: math.width,
                height: math.height,
            },
            ComposedBlock::Math {
                display,
                body: MathBody::Fallback { text, error },
                ..
            } => BlockSummary::Fallback {
                display: *display,
                text: text.clone(),
                error: error.as_ref().map(ToString::to_string),
            },
        }
    }
}

/// Compose `content` into blocks.
///
/// Content without math comes back as a single text block. Math segments
/// are rendered concurrently, one task each, unless the style asks for
/// fallback text only.
pub async fn compose<E: MathEngine>(
    content: &str,
    style: &ViewStyle,
    pipeline: &RenderPipeline<E>,
) -> Vec<ComposedBlock> {
    if !has_latex(content) {
        return if content.is_empty() {
            Vec::new()
        } else {
            vec![ComposedBlock::Text(content.to_owned())]
        };
    }

    let _timing = perf::TimingGuard::new("latex_view: compose");
    let mut blocks = Vec::new();
    let mut renders = JoinSet::new();
    let mut task_blocks = HashMap::new();

    for piece in segment(content) {
        let display = match piece.kind {
            SegmentKind::Text => {
                blocks.push(ComposedBlock::Text(piece.content.into_owned()));
                continue;
            }
            SegmentKind::InlineMath => DisplayMode::Inline,
            SegmentKind::BlockMath => DisplayMode::Block,
        };

        let notation = piece.content.into_owned();
        if !style.use_fallback {
            let index = blocks.len();
            let pipeline = pipeline.clone();
            let request = RenderRequest::new(
                notation.clone(),
                style.native_size,
                style.color,
                style.max_width,
            );
            let task = renders.spawn(async move { pipeline.render(request).await });
            task_blocks.insert(task.id(), index);
        }
        // Stays as fallback text unless a native render replaces it below.
        blocks.push(ComposedBlock::Math {
            display,
            body: MathBody::fallback(&notation, None),
            notation,
        });
    }

    let mut outcomes = BTreeMap::new();
    while let Some(joined) = renders.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                tracing::warn!(target: "latex_view::render", error = %e, "math render task failed");
                let error = RenderError::Unknown {
                    message: e.to_string(),
                };
                (e.id(), RenderResult::Error(error))
            }
        };
        if let Some(index) = task_blocks.get(&id) {
            outcomes.insert(*index, result);
        }
    }

    for (index, result) in outcomes {
        if let Some(ComposedBlock::Math { notation, body, .. }) = blocks.get_mut(index) {
            *body = match result {
                RenderResult::Success(math) => MathBody::Native(math),
                RenderResult::Error(error) => {
                    tracing::debug!(
                        target: "latex_view::render",
                        %error,
                        notation = %notation,
                        "native render failed, using fallback text"
                    );
                    MathBody::fallback(notation, Some(error))
                }
            };
        }
    }

    blocks
}
