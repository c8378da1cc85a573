//! In-memory exporter
//!
//! Records every exported batch in submission order. Clones share the same
//! buffer, so a test can hand one clone to a `Tracer` and inspect another.

use async_trait::async_trait;
use llmobs_span::{Span, SpanBatch, SpanKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ExportError, Exporter};

#[derive(Debug, Default)]
struct Recorded {
    batches: Vec<SpanBatch>,
    failure: Option<String>,
}

/// Exporter that keeps spans in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryExporter {
    inner: Arc<Mutex<Recorded>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent export fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    /// Accept exports again.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Batches exported so far, oldest first, with the ml_app each was
    /// submitted under.
    pub fn batches(&self) -> Vec<SpanBatch> {
        self.lock().batches.clone()
    }

    /// All spans exported so far, oldest first.
    pub fn spans(&self) -> Vec<Span> {
        self.lock()
            .batches
            .iter()
            .flat_map(|batch| batch.spans().iter().cloned())
            .collect()
    }

    /// Exported spans of one kind, oldest first.
    pub fn spans_of_kind(&self, kind: SpanKind) -> Vec<Span> {
        self.spans()
            .into_iter()
            .filter(|span| span.kind() == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().batches.iter().map(SpanBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().batches.clear();
    }
}

#[async_trait]
impl Exporter for InMemoryExporter {
    async fn export(&self, ml_app: &str, spans: &[Span]) -> Result<(), ExportError> {
        let mut recorded = self.lock();
        if let Some(message) = &recorded.failure {
            return Err(ExportError::Http(message.clone()));
        }
        recorded.batches.push(SpanBatch::new(ml_app, spans.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmobs_span::{ParentId, SpanId, SpanMeta, TraceId};

    fn span(kind: SpanKind) -> Span {
        Span {
            name: kind.to_string(),
            span_id: SpanId(1),
            trace_id: TraceId(2),
            parent_id: ParentId::Root,
            start_ns: 0,
            duration: 0,
            meta: SpanMeta::new(kind),
            metrics: None,
        }
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let exporter = InMemoryExporter::new();
        exporter.export("app", &[span(SpanKind::Embedding)]).await.unwrap();
        exporter.export("app", &[span(SpanKind::Retrieval)]).await.unwrap();

        let names: Vec<String> = exporter.spans().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["embedding", "retrieval"]);
        assert_eq!(exporter.spans_of_kind(SpanKind::Retrieval).len(), 1);
    }

    #[tokio::test]
    async fn test_batches_keep_ml_app() {
        let exporter = InMemoryExporter::new();
        exporter.export("checkout", &[span(SpanKind::Llm)]).await.unwrap();
        exporter.export("search", &[span(SpanKind::Task)]).await.unwrap();

        let apps: Vec<String> = exporter
            .batches()
            .into_iter()
            .map(|batch| batch.data.attributes.ml_app)
            .collect();
        assert_eq!(apps, vec!["checkout", "search"]);
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let exporter = InMemoryExporter::new();
        exporter.fail_with("intake down");

        let err = exporter.export("app", &[span(SpanKind::Llm)]).await.unwrap_err();
        assert!(err.to_string().contains("intake down"));
        assert!(exporter.is_empty());

        exporter.recover();
        exporter.export("app", &[span(SpanKind::Llm)]).await.unwrap();
        assert_eq!(exporter.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_buffer() {
        let exporter = InMemoryExporter::new();
        let handle = exporter.clone();
        exporter.export("app", &[span(SpanKind::Task)]).await.unwrap();

        assert_eq!(handle.len(), 1);
        handle.clear();
        assert!(exporter.is_empty());
    }
}
