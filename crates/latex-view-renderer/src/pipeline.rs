//! Asynchronous, memoized rendering of math segments.
//!
//! Each distinct request is rendered at most once while its artifact stays
//! cached: concurrent requests for the same key wait on a per-key lock and
//! then read the cache. Engine work runs on the blocking pool, cache lookups
//! run inline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use latex_view_common::perf;
use tokio::sync::{Mutex as KeyLock, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::cache::RenderCache;
use crate::engine::{MathEngine, PulldownEngine};
use crate::error::RenderError;
use crate::types::{CacheKey, RenderRequest, RenderResult, RenderedMath};

type InFlight = DashMap<CacheKey, Arc<KeyLock<()>>>;

/// Counters for observing the render path.
#[derive(Debug, Default)]
pub struct PipelineStats {
    renders: AtomicU64,
    cache_hits: AtomicU64,
}

impl PipelineStats {
    /// Engine invocations so far.
    pub fn renders_performed(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    /// Requests answered from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }
}

pub struct RenderPipeline<E = PulldownEngine> {
    engine: Arc<E>,
    cache: Arc<RenderCache>,
    in_flight: Arc<InFlight>,
    stats: Arc<PipelineStats>,
}

impl RenderPipeline<PulldownEngine> {
    /// Pulldown engine backed by the process-wide cache.
    pub fn shared() -> Self {
        Self::new(PulldownEngine, RenderCache::shared())
    }
}

impl<E: MathEngine> RenderPipeline<E> {
    pub fn new(engine: E, cache: Arc<RenderCache>) -> Self {
        Self {
            engine: Arc::new(engine),
            cache,
            in_flight: Arc::new(DashMap::new()),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn cache(&self) -> &Arc<RenderCache> {
        &self.cache
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Render `request`, answering from the cache when possible.
    pub async fn render(&self, request: RenderRequest) -> RenderResult {
        let never = CancellationToken::new();
        match self.render_cancellable(request, &never).await {
            Some(result) => result,
            None => RenderResult::Error(RenderError::Unknown {
                message: "render cancelled".to_owned(),
            }),
        }
    }

    /// Render `request` unless `cancel` fires first.
    ///
    /// Returns `None` once cancelled; the token is checked on entry and again
    /// before a result is handed back. Engine work that already started
    /// still finishes and is cached, its result just isn't delivered.
    pub async fn render_cancellable(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Option<RenderResult> {
        if cancel.is_cancelled() {
            tracing::trace!(target: "latex_view::render", "cancelled before start");
            return None;
        }

        let key = request.cache_key();
        if let Some(result) = self.cached(&key) {
            return Some(result);
        }

        let lock = self.in_flight.entry(key).or_default().clone();
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = lock.lock_owned() => Some(guard),
        };
        let Some(guard) = guard else {
            release_key(&self.in_flight, &key);
            tracing::trace!(target: "latex_view::render", ?key, "cancelled while waiting on key");
            return None;
        };

        // Whoever held the key lock before us may have produced it already.
        if let Some(result) = self.cached(&key) {
            drop(guard);
            release_key(&self.in_flight, &key);
            return Some(result);
        }

        let engine = self.engine.clone();
        let cache = self.cache.clone();
        let stats = self.stats.clone();
        let in_flight = self.in_flight.clone();
        let job = tokio::task::spawn_blocking(move || {
            // Releases the key even if the engine panics.
            let _held = HeldKey {
                guard: Some(guard),
                in_flight,
                key,
            };
            produce(engine.as_ref(), &request, key, &cache, &stats)
        });

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::trace!(
                    target: "latex_view::render",
                    ?key,
                    "cancelled mid-render, result will be cached but not delivered"
                );
                return None;
            }
            joined = job => joined,
        };

        let result = joined.unwrap_or_else(|e| {
            tracing::warn!(target: "latex_view::render", ?key, error = %e, "render task failed");
            RenderResult::Error(RenderError::Unknown {
                message: e.to_string(),
            })
        });

        if cancel.is_cancelled() {
            return None;
        }
        Some(result)
    }

    fn cached(&self, key: &CacheKey) -> Option<RenderResult> {
        let artifact = self.cache.get(key)?;
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: "latex_view::render", ?key, "cache hit");
        Some(RenderedMath::from_artifact(artifact).into())
    }
}

impl<E> Clone for RenderPipeline<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            cache: self.cache.clone(),
            in_flight: self.in_flight.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RenderPipeline<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Run the engine, validate and cache. Runs on the blocking pool.
fn produce<E: MathEngine>(
    engine: &E,
    request: &RenderRequest,
    key: CacheKey,
    cache: &RenderCache,
    stats: &PipelineStats,
) -> RenderResult {
    stats.renders.fetch_add(1, Ordering::Relaxed);
    let rendered = perf::measure("latex_view: engine render", || engine.render(request));

    let artifact = match rendered {
        Ok(artifact) => Arc::new(artifact),
        Err(e) => {
            let error = RenderError::classify(&e.message);
            tracing::debug!(
                target: "latex_view::render",
                ?key,
                category = ?error.category(),
                engine_message = %e,
                "render failed"
            );
            return RenderResult::Error(error);
        }
    };

    match RenderedMath::from_artifact(artifact) {
        Ok(math) => {
            cache.insert(key, math.artifact.clone());
            tracing::debug!(
                target: "latex_view::render",
                ?key,
                width = math.width,
                height = math.height,
                bytes = math.artifact.byte_size(),
                "rendered"
            );
            RenderResult::Success(math)
        }
        Err(error) => {
            tracing::debug!(target: "latex_view::render", ?key, %error, "rejected artifact");
            RenderResult::Error(error)
        }
    }
}

/// Key lock held by a running render.
struct HeldKey {
    guard: Option<OwnedMutexGuard<()>>,
    in_flight: Arc<InFlight>,
    key: CacheKey,
}

impl Drop for HeldKey {
    fn drop(&mut self) {
        // The guard owns a handle to the lock, so it goes first.
        drop(self.guard.take());
        release_key(&self.in_flight, &self.key);
    }
}

/// Forget the key lock once nobody else is queued on it.
fn release_key(in_flight: &InFlight, key: &CacheKey) {
    in_flight.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
}
