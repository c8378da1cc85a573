//! Span model and trace-context stack for LLM Observability instrumentation.
//!
//! This crate holds the types shared by every instrumentor: the span record
//! submitted to the backend, the per-request `TraceContext` that links nested
//! spans to their parents, and the wire envelope spans are submitted in.
//!
//! # Span Hierarchy
//!
//! ```text
//! workflow (parent_id = "undefined")
//!   ├─ retrieval
//!   │    └─ embedding
//!   └─ llm
//! ```
//!
//! # Usage
//!
//! 1. Create one `TraceContext` per logical request.
//! 2. Call `TraceContext::enter` when a unit of work starts; keep the guard
//!    alive for the duration of the work.
//! 3. Build a `Span` from the guard's ids and submit it inside a `SpanBatch`.

pub mod context;
pub mod payload;
pub mod span;

pub use context::{random_id, Frame, IdSource, RandomIds, SpanGuard, TraceContext};
pub use payload::SpanBatch;
pub use span::{
    Document, Message, Metrics, ParentId, Span, SpanId, SpanIo, SpanKind, SpanMeta, SpanMetadata,
    TraceId, ROOT_PARENT_ID,
};
