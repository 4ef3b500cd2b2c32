//! latex-view renderer
//!
//! Finds `$…$` and `$$…$$` math in prose, renders each segment off the async
//! runtime through a pluggable [`MathEngine`], and memoizes the results in a
//! byte-bounded LRU cache. When native rendering is off or fails, segments
//! degrade to a readable plain-text approximation.
//!

pub mod cache;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod segment;
pub mod slot;
pub mod types;
pub mod view;

pub use cache::RenderCache;
pub use engine::{MathEngine, PulldownEngine};
pub use error::{EngineError, ErrorCategory, RenderError};
pub use fallback::format_for_display;
pub use pipeline::{PipelineStats, RenderPipeline};
pub use segment::{Segment, SegmentKind, has_latex, segment};
pub use slot::{DisplayMode, MathSlot, SlotEvent, SlotOptions, SlotState};
pub use types::{Artifact, CacheKey, RenderPayload, RenderRequest, RenderResult, RenderedMath};
pub use view::{BlockSummary, ComposedBlock, MathBody, ViewStyle, compose};
