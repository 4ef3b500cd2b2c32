//! End-to-end composition with the pulldown engine.

use std::sync::Arc;

use latex_view_common::RenderConfig;
use latex_view_common::telemetry::{self, TelemetryConfig};
use latex_view_renderer::{
    BlockSummary, ComposedBlock, DisplayMode, ErrorCategory, MathBody, PulldownEngine,
    RenderCache, RenderPipeline, RenderRequest, RenderResult, ViewStyle, compose,
};

fn native_style() -> ViewStyle {
    telemetry::init(TelemetryConfig::from_env("latex-view-tests"));

    let config = RenderConfig {
        use_fallback: false,
        ..RenderConfig::default()
    };
    ViewStyle::from_config(&config, 480).unwrap()
}

#[tokio::test]
async fn renders_mixed_content_natively() {
    let pipeline = RenderPipeline::new(PulldownEngine, Arc::new(RenderCache::new(1 << 20)));
    let content = "Area: $\\pi r^2$, and\n$$\\frac{a}{b}$$\ncosts $5.";
    let blocks = compose(content, &native_style(), &pipeline).await;

    assert_eq!(blocks.len(), 5);
    assert_eq!(blocks[0], ComposedBlock::Text("Area: ".into()));
    assert!(matches!(
        blocks[1],
        ComposedBlock::Math {
            display: DisplayMode::Inline,
            body: MathBody::Native(_),
            ..
        }
    ));
    let ComposedBlock::Math {
        display: DisplayMode::Block,
        body: MathBody::Native(fraction),
        ..
    } = &blocks[3]
    else {
        panic!("expected native block math, got {:?}", blocks[3]);
    };
    let markup = std::str::from_utf8(&fraction.artifact.data).unwrap();
    assert!(markup.contains("<mfrac"));
    assert_eq!(blocks[4], ComposedBlock::Text("\ncosts $5.".into()));

    // Second pass is served entirely from cache.
    compose(content, &native_style(), &pipeline).await;
    assert_eq!(pipeline.stats().renders_performed(), 2);
    assert_eq!(pipeline.stats().cache_hits(), 2);
}

#[tokio::test]
async fn broken_notation_falls_back_with_an_error() {
    let pipeline = RenderPipeline::new(PulldownEngine, Arc::new(RenderCache::new(1 << 20)));
    let blocks = compose(r"ok $x$ then $\frac{a$", &native_style(), &pipeline).await;

    let summaries: Vec<_> = blocks.iter().map(ComposedBlock::summary).collect();
    assert!(matches!(summaries[1], BlockSummary::Native { .. }));
    let BlockSummary::Fallback { text, error, .. } = &summaries[3] else {
        panic!("expected fallback, got {:?}", summaries[3]);
    };
    assert_eq!(text, "frac{a");
    assert!(error.is_some());
}

#[tokio::test]
async fn tiny_cache_still_renders() {
    let pipeline = RenderPipeline::new(PulldownEngine, Arc::new(RenderCache::new(64)));
    let blocks = compose("$x + y$", &native_style(), &pipeline).await;
    assert!(matches!(
        blocks[0],
        ComposedBlock::Math {
            body: MathBody::Native(_),
            ..
        }
    ));
    // Larger than the whole budget, so never stored.
    assert!(pipeline.cache().is_empty());
}

#[tokio::test]
async fn unknown_commands_are_classified() {
    let pipeline = RenderPipeline::new(PulldownEngine, Arc::new(RenderCache::new(1 << 20)));
    let result = pipeline
        .render(RenderRequest::new(r"\oops", 40.0, 0xFF33_3333, 480))
        .await;
    let RenderResult::Error(error) = result else {
        panic!("expected failure, got {result:?}");
    };
    assert_eq!(error.category(), ErrorCategory::UnknownCommand);

    let blocks = compose(r"try $\oops$", &native_style(), &pipeline).await;
    let BlockSummary::Fallback { error, .. } = blocks[1].summary() else {
        panic!("expected fallback, got {:?}", blocks[1]);
    };
    assert_eq!(error.as_deref(), Some("Unknown LaTeX command"));
}
