//! Trace context and the explicit span stack.
//!
//! A `TraceContext` tracks the active trace id, active span id and active
//! parent id for one logical request. Opening a span pushes a `Frame` that
//! remembers the caller's position; closing it pops the frame and restores
//! that position exactly.
//!
//! Clones of a `TraceContext` share state, so every wrapper taking part in
//! one call tree must hold a clone of the same context. Independent requests
//! must use independent contexts (`TraceContext::new` or `isolated`).

use rand::Rng;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::span::{ParentId, SpanId, TraceId};

/// Exclusive upper bound for generated ids (62-bit positive integers).
const ID_UPPER_BOUND: u64 = 1 << 62;

/// Draw a uniformly random id in `1..2^62`.
pub fn random_id() -> u64 {
    rand::thread_rng().gen_range(1..ID_UPPER_BOUND)
}

/// Source of ids, optionally backed by an external tracer.
///
/// The defaults generate random ids and report no externally active trace
/// or span.
pub trait IdSource: Send + Sync + fmt::Debug {
    /// Generate a fresh span or trace id.
    fn next_id(&self) -> u64 {
        random_id()
    }

    /// Trace id of an externally active trace, if any.
    fn active_trace_id(&self) -> Option<u64> {
        None
    }

    /// Span id of an externally active span, if any.
    fn active_span_id(&self) -> Option<u64> {
        None
    }
}

/// Default id source: random ids, no external tracer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {}

/// Caller position saved when a span opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub span_id_before_entry: Option<SpanId>,
    pub parent_id_before_entry: ParentId,
}

#[derive(Debug, Default)]
struct StackState {
    trace_id: Option<TraceId>,
    active_span_id: Option<SpanId>,
    active_parent_id: ParentId,
    frames: Vec<Frame>,
}

/// Per-request tracing state: trace id plus the explicit frame stack.
#[derive(Clone)]
pub struct TraceContext {
    state: Arc<Mutex<StackState>>,
    ids: Arc<dyn IdSource>,
}

impl TraceContext {
    /// Create a fresh context with random ids.
    pub fn new() -> Self {
        Self::with_id_source(Arc::new(RandomIds))
    }

    /// Create a fresh context that delegates id generation to `ids`.
    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StackState::default())),
            ids,
        }
    }

    /// Create a new, independent context sharing this context's id source.
    pub fn isolated(&self) -> Self {
        Self::with_id_source(Arc::clone(&self.ids))
    }

    fn lock(&self) -> MutexGuard<'_, StackState> {
        // The state is always left consistent between statements, so a
        // poisoned lock can be recovered.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new span. The returned guard closes it when dropped.
    pub fn enter(&self) -> SpanGuard {
        let mut state = self.lock();
        let current = state
            .active_span_id
            .or_else(|| self.ids.active_span_id().map(SpanId));
        let depth = state.frames.len();

        let frame = Frame {
            span_id_before_entry: state.active_span_id,
            parent_id_before_entry: state.active_parent_id,
        };
        state.frames.push(frame);

        let parent_id = ParentId::from(current);
        let span_id = SpanId(self.ids.next_id());
        state.active_parent_id = parent_id;
        state.active_span_id = Some(span_id);

        SpanGuard {
            context: self.clone(),
            span_id,
            parent_id,
            depth,
        }
    }

    /// Close the span opened at `depth`, restoring the caller's position.
    ///
    /// Frames above `depth` that were never closed are discarded.
    fn exit_to(&self, depth: usize) {
        let mut state = self.lock();
        if state.frames.len() <= depth {
            return;
        }
        state.frames.truncate(depth + 1);
        if let Some(frame) = state.frames.pop() {
            state.active_span_id = frame.span_id_before_entry;
            state.active_parent_id = frame.parent_id_before_entry;
        }
    }

    /// Id of the innermost open span.
    pub fn active_span_id(&self) -> Option<SpanId> {
        self.lock().active_span_id
    }

    /// Parent of the innermost open span, `Root` when none is open.
    pub fn active_parent_id(&self) -> ParentId {
        self.lock().active_parent_id
    }

    /// Number of currently open spans.
    pub fn depth(&self) -> usize {
        self.lock().frames.len()
    }

    /// Whether a span opened now would sit at the trace root.
    pub fn is_root(&self) -> bool {
        self.lock().active_span_id.is_none() && self.ids.active_span_id().is_none()
    }

    /// Trace id, established on first use and reused until `reset`.
    pub fn trace_id(&self) -> TraceId {
        let mut state = self.lock();
        if let Some(id) = state.trace_id {
            return id;
        }
        let id = TraceId(
            self.ids
                .active_trace_id()
                .unwrap_or_else(|| self.ids.next_id()),
        );
        state.trace_id = Some(id);
        id
    }

    /// Forget the trace id and any open frames, starting a new session.
    pub fn reset(&self) {
        *self.lock() = StackState::default();
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TraceContext")
            .field("trace_id", &state.trace_id)
            .field("active_span_id", &state.active_span_id)
            .field("active_parent_id", &state.active_parent_id)
            .field("depth", &state.frames.len())
            .field("ids", &self.ids)
            .finish()
    }
}

/// An open span. Dropping it restores the context to where it was before
/// `enter`.
#[must_use = "the span closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SpanGuard {
    context: TraceContext,
    span_id: SpanId,
    parent_id: ParentId,
    depth: usize,
}

impl SpanGuard {
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn parent_id(&self) -> ParentId {
        self.parent_id
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.context.exit_to(self.depth);
    }
}
