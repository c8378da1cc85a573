//! Wire envelope for submitting spans to the LLM Observability intake.

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// Value of `data.type` for span submissions.
pub const SPAN_EVENT_TYPE: &str = "span";

/// Request body for the span intake endpoint.
///
/// ```json
/// {"data": {"type": "span", "attributes": {"ml_app": "...", "spans": [...]}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanBatch {
    pub data: SpanBatchData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanBatchData {
    #[serde(rename = "type")]
    pub event_type: String,
    pub attributes: SpanBatchAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanBatchAttributes {
    /// Logical application the spans are grouped under.
    pub ml_app: String,
    pub spans: Vec<Span>,
}

impl SpanBatch {
    /// Wrap `spans` for submission under `ml_app`.
    pub fn new(ml_app: impl Into<String>, spans: Vec<Span>) -> Self {
        Self {
            data: SpanBatchData {
                event_type: SPAN_EVENT_TYPE.to_string(),
                attributes: SpanBatchAttributes {
                    ml_app: ml_app.into(),
                    spans,
                },
            },
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.data.attributes.spans
    }

    pub fn len(&self) -> usize {
        self.data.attributes.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.attributes.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Message, Metrics, ParentId, SpanId, SpanIo, SpanKind, SpanMeta, TraceId};
    use serde_json::json;

    fn chat_span() -> Span {
        Span {
            name: "chat".to_string(),
            span_id: SpanId(123),
            trace_id: TraceId(456),
            parent_id: ParentId::Root,
            start_ns: 1_700_000_000_000_000_000,
            duration: 1_234_567,
            meta: SpanMeta {
                kind: SpanKind::Llm,
                input: Some(SpanIo::messages(vec![Message::new("hi", "user")])),
                output: Some(SpanIo::messages(vec![Message::new("hello", "assistant")])),
                metadata: None,
            },
            metrics: Some(Metrics {
                input_tokens: Some(1),
                output_tokens: Some(4),
                total_tokens: Some(5),
            }),
        }
    }

    #[test]
    fn test_batch_envelope_shape() {
        let batch = SpanBatch::new("my-app", vec![chat_span()]);

        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            json!({
                "data": {
                    "type": "span",
                    "attributes": {
                        "ml_app": "my-app",
                        "spans": [{
                            "name": "chat",
                            "span_id": "123",
                            "trace_id": "456",
                            "parent_id": "undefined",
                            "start_ns": 1_700_000_000_000_000_000u64,
                            "duration": 1_234_567,
                            "meta": {
                                "kind": "llm",
                                "input": {"messages": [{"content": "hi", "role": "user"}]},
                                "output": {"messages": [{"content": "hello", "role": "assistant"}]}
                            },
                            "metrics": {"input_tokens": 1, "output_tokens": 4, "total_tokens": 5}
                        }]
                    }
                }
            })
        );
    }

    #[test]
    fn test_batch_accessors() {
        let batch = SpanBatch::new("my-app", vec![chat_span(), chat_span()]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert_eq!(batch.spans()[0].name, "chat");

        assert!(SpanBatch::new("my-app", Vec::new()).is_empty());
    }

    #[test]
    fn test_batch_deserializes_from_wire() {
        let json = serde_json::to_string(&SpanBatch::new("my-app", vec![chat_span()])).unwrap();
        let parsed: SpanBatch = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.data.event_type, SPAN_EVENT_TYPE);
        assert_eq!(parsed.spans()[0], chat_span());
    }
}
