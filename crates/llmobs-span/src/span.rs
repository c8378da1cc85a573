//! Core span types for the LLM Observability trace model.
//!
//! Defines `Span`, `SpanKind` and the input/output/metrics payloads attached
//! to each span. Every optional field is omitted from the serialized form
//! when absent; nothing is ever emitted as `null`.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Sentinel used on the wire for the parent of a root span.
pub const ROOT_PARENT_ID: &str = "undefined";

macro_rules! decimal_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map(Self).map_err(de::Error::custom)
            }
        }
    };
}

decimal_id!(
    /// Identifier of a single span, unique within its trace.
    SpanId
);

decimal_id!(
    /// Identifier shared by every span of one trace.
    TraceId
);

/// Parent linkage of a span: either the trace root or an enclosing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParentId {
    #[default]
    Root,
    Span(SpanId),
}

impl ParentId {
    pub fn is_root(&self) -> bool {
        matches!(self, ParentId::Root)
    }

    pub fn span_id(&self) -> Option<SpanId> {
        match self {
            ParentId::Root => None,
            ParentId::Span(id) => Some(*id),
        }
    }
}

impl From<Option<SpanId>> for ParentId {
    fn from(id: Option<SpanId>) -> Self {
        id.map_or(ParentId::Root, ParentId::Span)
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentId::Root => f.write_str(ROOT_PARENT_ID),
            ParentId::Span(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for ParentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == ROOT_PARENT_ID {
            return Ok(ParentId::Root);
        }
        raw.parse()
            .map(|id| ParentId::Span(SpanId(id)))
            .map_err(de::Error::custom)
    }
}

/// Category of a span. Drives how the backend renders and validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Workflow,
    Agent,
    Tool,
    Llm,
    Embedding,
    Task,
    Retrieval,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Workflow => "workflow",
            SpanKind::Agent => "agent",
            SpanKind::Tool => "tool",
            SpanKind::Llm => "llm",
            SpanKind::Embedding => "embedding",
            SpanKind::Task => "task",
            SpanKind::Retrieval => "retrieval",
        }
    }

    /// Whether the backend accepts this kind at the root of a trace.
    pub fn is_valid_root(&self) -> bool {
        !matches!(self, SpanKind::Retrieval)
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message reduced to its content and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub role: String,
}

impl Message {
    pub fn new(content: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: role.into(),
        }
    }
}

/// A retrieved document as reported on a retrieval span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// Input or output payload of a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpanIo {
    Messages { messages: Vec<Message> },
    Documents { documents: Vec<Document> },
    Value { value: String },
}

impl SpanIo {
    pub fn value(value: impl Into<String>) -> Self {
        SpanIo::Value {
            value: value.into(),
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        SpanIo::Messages { messages }
    }

    pub fn documents(documents: Vec<Document>) -> Self {
        SpanIo::Documents { documents }
    }
}

/// Model call parameters recorded alongside LLM spans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
}

impl SpanMetadata {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.max_tokens.is_none()
            && self.model_name.is_none()
            && self.model_provider.is_none()
    }

    /// Returns `None` when no field is set, so the key is dropped entirely.
    pub fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

/// Token usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Metrics {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }

    pub fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

/// The `meta` object of a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanMeta {
    pub kind: SpanKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<SpanIo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<SpanIo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SpanMetadata>,
}

impl SpanMeta {
    pub fn new(kind: SpanKind) -> Self {
        Self {
            kind,
            input: None,
            output: None,
            metadata: None,
        }
    }
}

/// A single completed span, ready for export.
///
/// `duration` is in nanoseconds; `start_ns` is nanoseconds since the Unix
/// epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub name: String,
    pub span_id: SpanId,
    pub trace_id: TraceId,
    pub parent_id: ParentId,
    pub start_ns: u64,
    pub duration: u64,
    pub meta: SpanMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

impl Span {
    pub fn kind(&self) -> SpanKind {
        self.meta.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_span() -> Span {
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
    fn test_span_wire_shape() {
        let value = serde_json::to_value(sample_span()).unwrap();

        assert_eq!(
            value,
            json!({
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
            })
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let mut span = sample_span();
        span.meta.input = None;
        span.meta.output = None;
        span.metrics = None;
        span.parent_id = ParentId::Span(SpanId(99));

        let json = serde_json::to_string(&span).unwrap();
        assert!(!json.contains("null"));
        assert!(!json.contains("metrics"));
        assert!(!json.contains("input"));
        assert!(json.contains("\"parent_id\":\"99\""));
    }

    #[test]
    fn test_document_omits_missing_fields() {
        let doc = Document {
            text: Some("response".to_string()),
            score: Some(json!(0.9)),
            id: Some(json!("1")),
            name: None,
        };

        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"text": "response", "score": 0.9, "id": "1"})
        );
    }

    #[test]
    fn test_parent_id_roundtrip() {
        let root: ParentId = serde_json::from_str("\"undefined\"").unwrap();
        assert!(root.is_root());

        let child: ParentId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(child.span_id(), Some(SpanId(42)));

        assert!(serde_json::from_str::<ParentId>("\"nope\"").is_err());
    }

    #[test]
    fn test_empty_metrics_and_metadata_collapse() {
        assert_eq!(Metrics::default().non_empty(), None);
        assert_eq!(SpanMetadata::default().non_empty(), None);

        let metrics = Metrics {
            total_tokens: Some(5),
            ..Default::default()
        };
        assert_eq!(metrics.non_empty(), Some(metrics));
    }

    #[test]
    fn test_retrieval_is_not_a_valid_root() {
        assert!(!SpanKind::Retrieval.is_valid_root());
        assert!(SpanKind::Workflow.is_valid_root());
        assert_eq!(SpanKind::Embedding.to_string(), "embedding");
    }
}
