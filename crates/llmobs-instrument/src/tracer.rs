//! The tracer handle shared by every instrumentor of one call tree.
//!
//! A `Tracer` bundles the configuration, the span emitter and the trace
//! context. Clone it into every wrapper that takes part in the same logical
//! request so their spans nest; call `isolated` to get a tracer with a fresh
//! context for an independent request.
//!
//! # Example
//!
//! ```rust,no_run
//! use llmobs_instrument::{InMemoryExporter, LlmObsConfig, Tracer};
//!
//! # async fn demo() -> llmobs_instrument::Result<()> {
//! let tracer = Tracer::new(LlmObsConfig::from_env(), InMemoryExporter::new());
//!
//! let answer = tracer
//!     .workflow("plan_trip", Some("Lisbon in May"), async {
//!         Ok("book the 9am train".to_string())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use llmobs_span::{
    IdSource, Metrics, SpanGuard, SpanIo, SpanKind, SpanMeta, SpanMetadata, TraceContext,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, ConfigError, LlmObsConfig};
use crate::emitter::{ExportFailurePolicy, SpanEmitter, SpanTiming};
use crate::error::Result;
use crate::export::{Exporter, HttpExporter};

/// Input, output and measurements extracted for one span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub input: Option<SpanIo>,
    pub output: Option<SpanIo>,
    pub metadata: Option<SpanMetadata>,
    pub metrics: Option<Metrics>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: Option<SpanIo>) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Option<SpanIo>) -> Self {
        self.output = output;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<SpanMetadata>) -> Self {
        self.metadata = metadata.and_then(SpanMetadata::non_empty);
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Metrics>) -> Self {
        self.metrics = metrics.and_then(Metrics::non_empty);
        self
    }
}

/// Handle for opening, timing and exporting spans.
#[derive(Clone)]
pub struct Tracer {
    emitter: SpanEmitter,
    context: TraceContext,
}

impl Tracer {
    /// Create a tracer with a fresh trace context.
    pub fn new(config: impl Config + 'static, exporter: impl Exporter + 'static) -> Self {
        Self::from_parts(Arc::new(config), Arc::new(exporter), TraceContext::new())
    }

    pub fn from_parts(
        config: Arc<dyn Config>,
        exporter: Arc<dyn Exporter>,
        context: TraceContext,
    ) -> Self {
        Self {
            emitter: SpanEmitter::new(config, exporter),
            context,
        }
    }

    /// Create a tracer that submits to the intake of the configured site.
    ///
    /// Fails when the API key or the application name is missing.
    pub fn for_intake(config: LlmObsConfig) -> std::result::Result<Self, ConfigError> {
        config.require_ml_app()?;
        let exporter = HttpExporter::new(&config)?;
        Ok(Self::new(config, exporter))
    }

    /// Use `ids` for trace and span ids, e.g. to follow an external tracer.
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.context = TraceContext::with_id_source(ids);
        self
    }

    pub fn with_export_policy(mut self, policy: ExportFailurePolicy) -> Self {
        self.emitter = self.emitter.with_policy(policy);
        self
    }

    /// A tracer sharing configuration and exporter but with its own context.
    pub fn isolated(&self) -> Self {
        Self {
            emitter: self.emitter.clone(),
            context: self.context.isolated(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.emitter.config().enabled()
    }

    pub fn ml_app(&self) -> &str {
        self.emitter.config().ml_app()
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Open a span. It closes when the returned value is finished or dropped.
    pub fn start_span(&self, name: impl Into<String>, kind: SpanKind) -> ActiveSpan<'_> {
        let guard = self.context.enter();
        let start_ns = Utc::now()
            .timestamp_nanos_opt()
            .and_then(|ns| u64::try_from(ns).ok())
            .unwrap_or_default();

        ActiveSpan {
            tracer: self,
            guard,
            name: name.into(),
            kind,
            start_ns,
            started: Instant::now(),
        }
    }

    /// Trace `op` as a workflow span.
    pub async fn workflow<T, F>(&self, name: &str, input: Option<&str>, op: F) -> Result<T>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        self.traced(name, SpanKind::Workflow, input, op).await
    }

    /// Trace `op` as an agent span.
    pub async fn agent<T, F>(&self, name: &str, input: Option<&str>, op: F) -> Result<T>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        self.traced(name, SpanKind::Agent, input, op).await
    }

    async fn traced<T, F>(
        &self,
        name: &str,
        kind: SpanKind,
        input: Option<&str>,
        op: F,
    ) -> Result<T>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        if !self.enabled() {
            return op.await;
        }

        let span = self.start_span(name, kind);
        let output = span.track(op).await?;
        let annotations = Annotations::new()
            .with_input(input.map(SpanIo::value))
            .with_output(value_of(&output));
        span.finish(annotations).await?;

        Ok(output)
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.enabled())
            .field("emitter", &self.emitter)
            .field("context", &self.context)
            .finish()
    }
}

/// Render an arbitrary output as a span value: strings verbatim, anything
/// else as JSON text. Unit and null outputs are not recorded.
fn value_of<T: Serialize>(output: &T) -> Option<SpanIo> {
    match serde_json::to_value(output).ok()? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(SpanIo::value(s)),
        other => Some(SpanIo::value(other.to_string())),
    }
}

/// A span that has been entered but not yet exported.
#[must_use = "the span closes without being exported when dropped"]
pub struct ActiveSpan<'a> {
    tracer: &'a Tracer,
    guard: SpanGuard,
    name: String,
    kind: SpanKind,
    start_ns: u64,
    started: Instant,
}

impl ActiveSpan<'_> {
    pub fn guard(&self) -> &SpanGuard {
        &self.guard
    }

    /// Await the wrapped operation, logging its failure.
    ///
    /// A failed operation produces no span: propagating the error with `?`
    /// drops this value, which closes the span without exporting it.
    pub async fn track<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        op.await.map_err(|e| {
            tracing::debug!(
                span_id = %self.guard.span_id(),
                kind = %self.kind,
                span_name = %self.name,
                error = %e,
                "Operation failed, dropping span"
            );
            e
        })
    }

    /// Export the span with `annotations`, then close it.
    pub async fn finish(self, annotations: Annotations) -> Result<()> {
        let duration_ns = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let meta = SpanMeta {
            kind: self.kind,
            input: annotations.input,
            output: annotations.output,
            metadata: annotations.metadata,
        };
        let timing = SpanTiming {
            start_ns: self.start_ns,
            duration_ns,
        };

        self.tracer
            .emitter
            .record_span(&self.guard, &self.name, timing, meta, annotations.metrics)
            .await
    }
}
