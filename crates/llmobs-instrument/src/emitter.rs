//! Span assembly and hand-off to the exporter.
//!
//! The emitter turns an open span (its guard plus timing and annotations)
//! into a `Span` record and exports it as a one-element batch under the
//! configured `ml_app`. What happens when the export fails is governed by
//! `ExportFailurePolicy`.

use llmobs_span::{Metrics, Span, SpanGuard, SpanKind, SpanMeta};
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::export::Exporter;

/// Behaviour when a span cannot be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFailurePolicy {
    /// Return the export error to the caller in place of the operation's
    /// result.
    #[default]
    Propagate,
    /// Log the export error and keep the operation's result.
    Log,
}

/// Timing of a span, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanTiming {
    pub start_ns: u64,
    pub duration_ns: u64,
}

/// Builds span records and exports them.
#[derive(Clone)]
pub struct SpanEmitter {
    config: Arc<dyn Config>,
    exporter: Arc<dyn Exporter>,
    policy: ExportFailurePolicy,
}

impl SpanEmitter {
    pub fn new(config: Arc<dyn Config>, exporter: Arc<dyn Exporter>) -> Self {
        Self {
            config,
            exporter,
            policy: ExportFailurePolicy::default(),
        }
    }

    /// Configuration spans are tagged and gated by.
    pub fn config(&self) -> &dyn Config {
        self.config.as_ref()
    }

    pub fn with_policy(mut self, policy: ExportFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ExportFailurePolicy {
        self.policy
    }

    /// Build the span for `guard` and export it.
    ///
    /// The span id and parent id come from the guard, which holds the ids
    /// assigned when the span was entered. Empty metrics are dropped.
    pub async fn record_span(
        &self,
        guard: &SpanGuard,
        name: &str,
        timing: SpanTiming,
        meta: SpanMeta,
        metrics: Option<Metrics>,
    ) -> Result<()> {
        let span = Span {
            name: name.to_string(),
            span_id: guard.span_id(),
            trace_id: guard.context().trace_id(),
            parent_id: guard.parent_id(),
            start_ns: timing.start_ns,
            duration: timing.duration_ns,
            meta,
            metrics: metrics.and_then(Metrics::non_empty),
        };
        let kind: SpanKind = span.kind();
        let span_id = span.span_id;

        let ml_app = self.config.ml_app();
        match self.exporter.export(ml_app, std::slice::from_ref(&span)).await {
            Ok(()) => {
                tracing::debug!(%span_id, %kind, span_name = name, "Exported span");
                Ok(())
            }
            Err(e) => match self.policy {
                ExportFailurePolicy::Propagate => Err(e.into()),
                ExportFailurePolicy::Log => {
                    tracing::warn!(
                        %span_id,
                        %kind,
                        span_name = name,
                        error = %e,
                        "Failed to export span"
                    );
                    Ok(())
                }
            },
        }
    }
}

impl fmt::Debug for SpanEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanEmitter")
            .field("ml_app", &self.config.ml_app())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
