//! LLM Observability instrumentation for model, assistant and vector-search
//! calls.
//!
//! Each instrumentor is a decorator: it implements the same trait as the
//! value it wraps, opens a span around every call and exports the finished
//! span through an `Exporter`.
//!
//! # Span Kinds
//!
//! ```text
//! InstrumentedLlm           chat / complete -> llm, embed -> embedding, summarize -> task
//! InstrumentedAssistant     run -> agent, run_tool -> tool
//! InstrumentedVectorSearch  similarity_search -> retrieval, everything else -> workflow
//! ```
//!
//! # Usage
//!
//! 1. Build an `LlmObsConfig` (usually `LlmObsConfig::from_env()`).
//! 2. Create a `Tracer` with `Tracer::for_intake(config)?`, or pair any
//!    `Config` with any `Exporter` through `Tracer::new`. Spans are always
//!    submitted under the config's `ml_app`.
//! 3. Use one tracer per logical request (`Tracer::isolated`) and clone it
//!    into every wrapper taking part in that request.
//! 4. Call the wrapped values through their usual traits.
//!
//! When the configuration reports tracing as disabled, every wrapper calls
//! straight through and nothing is exported.

pub mod assistant;
pub mod config;
pub mod emitter;
pub mod error;
pub mod export;
pub mod llm;
pub mod tracer;
pub mod vectorsearch;

pub use assistant::{
    run_conversation, Assistant, AssistantMessage, InstrumentedAssistant, RunState, ToolCall,
};
pub use config::{Config, ConfigError, LlmObsConfig, LlmObsConfigBuilder};
pub use emitter::{ExportFailurePolicy, SpanEmitter, SpanTiming};
pub use error::{Error, Result};
pub use export::{ExportError, Exporter, HttpExporter, InMemoryExporter};
pub use llm::{
    ChatMessage, ChatParams, CompleteParams, ContentPart, EmbedParams, ImageUrl, InstrumentedLlm,
    Llm, LlmRequest, LlmResponse, MessageContent, SummarizeParams,
};
pub use tracer::{ActiveSpan, Annotations, Tracer};
pub use vectorsearch::{InstrumentedVectorSearch, VectorSearch};

pub use llmobs_span as span;
