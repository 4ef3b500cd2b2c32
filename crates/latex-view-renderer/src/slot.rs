//! One on-screen math segment: `Idle -> Rendering -> Rendered | Failed`.
//!
//! A slot re-renders when its notation or style changes, cancels whatever it
//! had in flight when it does, and cancels silently when dropped. Results
//! are published under the slot lock and only while their token is live, so
//! a superseded render can never overwrite (or be reported after) a newer
//! one.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::{MathEngine, PulldownEngine};
use crate::error::RenderError;
use crate::pipeline::RenderPipeline;
use crate::types::{RenderRequest, RenderResult, RenderedMath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DisplayMode {
    /// Flows with the surrounding text.
    #[default]
    Inline,
    /// Centered on its own line.
    Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Rendering,
    Rendered(RenderedMath),
    Failed(RenderError),
}

/// Events for the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SlotEvent {
    #[serde(rename_all = "camelCase")]
    RenderComplete { width: u32, height: u32 },
    #[serde(rename_all = "camelCase")]
    RenderError {
        error: String,
        source_notation: String,
    },
}

/// Initial style of a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotOptions {
    pub text_size: f32,
    pub text_color: u32,
    pub display: DisplayMode,
    /// Width to lay out against until the slot has been sized.
    pub fallback_width: u32,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            text_size: 40.0,
            text_color: 0xFF00_0000,
            display: DisplayMode::Inline,
            fallback_width: 1080,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: SlotState,
    in_flight: Option<CancellationToken>,
    has_rendered: bool,
}

/// Renders a single piece of notation through a [`RenderPipeline`] and
/// reports the outcome as [`SlotEvent`]s.
///
/// Rendering spawns onto the ambient tokio runtime, so setters that trigger
/// a render must be called from within one.
pub struct MathSlot<E: MathEngine = PulldownEngine> {
    pipeline: RenderPipeline<E>,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<SlotEvent>,
    notation: String,
    text_size: f32,
    text_color: u32,
    display: DisplayMode,
    width: u32,
    fallback_width: u32,
}

impl<E: MathEngine> MathSlot<E> {
    pub fn new(
        pipeline: RenderPipeline<E>,
        options: SlotOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SlotEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let slot = Self {
            pipeline,
            shared: Arc::new(Mutex::new(Shared::default())),
            events,
            notation: String::new(),
            text_size: options.text_size,
            text_color: options.text_color,
            display: options.display,
            width: 0,
            fallback_width: options.fallback_width,
        };
        (slot, rx)
    }

    pub fn state(&self) -> SlotState {
        self.shared.lock().state.clone()
    }

    pub fn notation(&self) -> &str {
        &self.notation
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    /// Re-renders when the notation changed or nothing has been shown yet.
    pub fn set_latex(&mut self, notation: impl Into<String>) {
        let notation = notation.into();
        let has_rendered = self.shared.lock().has_rendered;
        if notation != self.notation || !has_rendered {
            self.notation = notation;
            self.render();
        }
    }

    pub fn set_text_size(&mut self, size: f32) {
        if size != self.text_size {
            self.text_size = size;
            if !self.notation.is_empty() {
                self.render();
            }
        }
    }

    pub fn set_text_color(&mut self, color: u32) {
        if color != self.text_color {
            self.text_color = color;
            if !self.notation.is_empty() {
                self.render();
            }
        }
    }

    /// Alignment only; the artifact does not depend on it.
    pub fn set_display_mode(&mut self, display: DisplayMode) {
        self.display = display;
    }

    /// New layout width. Re-renders only when an already sized slot changes
    /// width.
    pub fn resize(&mut self, width: u32) {
        let previous = std::mem::replace(&mut self.width, width);
        if width > 0 && previous > 0 && previous != width && !self.notation.is_empty() {
            self.render();
        }
    }

    fn max_width(&self) -> u32 {
        if self.width > 0 {
            self.width
        } else {
            self.fallback_width
        }
    }

    fn render(&mut self) {
        if self.notation.is_empty() {
            let mut shared = self.shared.lock();
            if let Some(previous) = shared.in_flight.take() {
                previous.cancel();
            }
            shared.state = SlotState::Idle;
            return;
        }

        let token = CancellationToken::new();
        {
            let mut shared = self.shared.lock();
            if let Some(previous) = shared.in_flight.replace(token.clone()) {
                tracing::trace!(target: "latex_view::slot", "superseding in-flight render");
                previous.cancel();
            }
            shared.state = SlotState::Rendering;
        }

        let request = RenderRequest::new(
            self.notation.clone(),
            self.text_size,
            self.text_color,
            self.max_width(),
        );
        let pipeline = self.pipeline.clone();
        let shared = self.shared.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let notation = request.notation.clone();
            let Some(result) = pipeline.render_cancellable(request, &token).await else {
                return;
            };

            let mut shared = shared.lock();
            if token.is_cancelled() {
                tracing::trace!(target: "latex_view::slot", "dropping superseded result");
                return;
            }
            shared.in_flight = None;
            shared.has_rendered = true;

            let event = match result {
                RenderResult::Success(math) => {
                    let event = SlotEvent::RenderComplete {
                        width: math.width,
                        height: math.height,
                    };
                    shared.state = SlotState::Rendered(math);
                    event
                }
                RenderResult::Error(error) => {
                    let event = SlotEvent::RenderError {
                        error: error.to_string(),
                        source_notation: notation,
                    };
                    shared.state = SlotState::Failed(error);
                    event
                }
            };
            // The receiver may be gone; the state above is still current.
            let _ = events.send(event);
        });
    }
}

impl<E: MathEngine> Drop for MathSlot<E> {
    fn drop(&mut self) {
        if let Some(token) = self.shared.lock().in_flight.take() {
            tracing::trace!(target: "latex_view::slot", "slot dropped, cancelling render");
            token.cancel();
        }
    }
}
