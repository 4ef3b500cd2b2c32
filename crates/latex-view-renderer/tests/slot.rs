//! Slot lifecycle against an engine whose renders can be held open.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use latex_view_renderer::{
    Artifact, EngineError, MathEngine, MathSlot, RenderCache, RenderPipeline, RenderRequest,
    SlotEvent, SlotOptions, SlotState,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Notation starting with `slow` blocks until the test opens the gate,
/// `bad` fails, anything else renders at 10px per byte.
struct GatedEngine {
    gate: Mutex<std_mpsc::Receiver<()>>,
    calls: AtomicUsize,
}

impl MathEngine for GatedEngine {
    fn render(&self, request: &RenderRequest) -> Result<Artifact, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.notation.starts_with("slow") {
            let _ = self
                .gate
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5));
        }
        if request.notation == "bad" {
            return Err(EngineError::new("Unknown command: bad"));
        }
        Ok(Artifact::new(
            request.notation.len() as i32 * 10,
            request.max_width.min(1000) as i32 / 10,
            request.notation.clone().into_bytes(),
        ))
    }
}

struct Harness {
    pipeline: RenderPipeline<GatedEngine>,
    gate: std_mpsc::Sender<()>,
}

impl Harness {
    fn new() -> Self {
        let (gate, rx) = std_mpsc::channel();
        let engine = GatedEngine {
            gate: Mutex::new(rx),
            calls: AtomicUsize::new(0),
        };
        Self {
            pipeline: RenderPipeline::new(engine, Arc::new(RenderCache::new(1 << 16))),
            gate,
        }
    }

    fn slot(&self) -> (MathSlot<GatedEngine>, UnboundedReceiver<SlotEvent>) {
        MathSlot::new(self.pipeline.clone(), SlotOptions::default())
    }

    fn open_gate(&self) {
        let _ = self.gate.send(());
    }

    fn engine_calls(&self) -> usize {
        self.pipeline.engine().calls.load(Ordering::SeqCst)
    }
}

async fn next_event(rx: &mut UnboundedReceiver<SlotEvent>) -> SlotEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for slot event")
        .expect("event channel closed")
}

async fn assert_quiet(rx: &mut UnboundedReceiver<SlotEvent>) {
    if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected event {event:?}");
    }
}

#[tokio::test]
async fn renders_and_reports_dimensions() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("x^2");
    assert_eq!(slot.state(), SlotState::Rendering);

    assert_eq!(
        next_event(&mut rx).await,
        SlotEvent::RenderComplete {
            width: 30,
            height: 100
        }
    );
    let SlotState::Rendered(math) = slot.state() else {
        panic!("expected rendered state, got {:?}", slot.state());
    };
    assert_eq!((math.width, math.height), (30, 100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn newer_notation_supersedes_in_flight_render() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();

    slot.set_latex("slow first");
    slot.set_latex("second");

    assert_eq!(
        next_event(&mut rx).await,
        SlotEvent::RenderComplete {
            width: 60,
            height: 100
        }
    );
    harness.open_gate();
    assert_quiet(&mut rx).await;

    let SlotState::Rendered(math) = slot.state() else {
        panic!("expected rendered state, got {:?}", slot.state());
    };
    assert_eq!(math.width, 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_a_slot_silences_it() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("slow one");
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(slot);
    harness.open_gate();

    let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("channel should close once the slot is gone");
    assert_eq!(closed, None);
}

#[tokio::test]
async fn same_notation_after_render_is_a_no_op() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("y");
    next_event(&mut rx).await;

    slot.set_latex("y");
    assert_quiet(&mut rx).await;
    assert_eq!(harness.engine_calls(), 1);
    assert!(matches!(slot.state(), SlotState::Rendered(_)));
}

#[tokio::test]
async fn empty_notation_stays_idle() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("");
    assert_eq!(slot.state(), SlotState::Idle);
    assert_quiet(&mut rx).await;
    assert_eq!(harness.engine_calls(), 0);

    slot.set_text_size(12.0);
    assert_eq!(slot.state(), SlotState::Idle);
}

#[tokio::test]
async fn failures_carry_the_source_notation() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("bad");

    let event = next_event(&mut rx).await;
    assert_eq!(
        event,
        SlotEvent::RenderError {
            error: "Unknown LaTeX command".into(),
            source_notation: "bad".into(),
        }
    );
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        serde_json::json!({
            "type": "renderError",
            "error": "Unknown LaTeX command",
            "sourceNotation": "bad",
        })
    );
    assert!(matches!(slot.state(), SlotState::Failed(_)));
}

#[tokio::test]
async fn style_changes_rerender() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("z");
    next_event(&mut rx).await;

    slot.set_text_color(0xFFFF_0000);
    next_event(&mut rx).await;
    slot.set_text_size(20.0);
    next_event(&mut rx).await;
    assert_eq!(harness.engine_calls(), 3);

    // Unchanged values do nothing.
    slot.set_text_size(20.0);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn first_sizing_does_not_rerender() {
    let harness = Harness::new();
    let (mut slot, mut rx) = harness.slot();
    slot.set_latex("w");
    next_event(&mut rx).await;

    slot.resize(300);
    assert_quiet(&mut rx).await;

    slot.resize(500);
    assert_eq!(
        next_event(&mut rx).await,
        SlotEvent::RenderComplete {
            width: 10,
            height: 50
        }
    );
    assert_eq!(harness.engine_calls(), 2);
}

#[tokio::test]
async fn slots_share_the_pipeline_cache() {
    let harness = Harness::new();
    let (mut a, mut rx_a) = harness.slot();
    let (mut b, mut rx_b) = harness.slot();

    a.set_latex(r"\alpha");
    next_event(&mut rx_a).await;
    b.set_latex(r"\alpha");
    next_event(&mut rx_b).await;

    assert_eq!(harness.engine_calls(), 1);
    assert_eq!(harness.pipeline.stats().cache_hits(), 1);
}
