//! LLM call instrumentation
//!
//! `InstrumentedLlm` wraps any `Llm` and reports `chat`, `complete`, `embed`
//! and `summarize` calls as spans:
//!
//! | call | span kind |
//! |---|---|
//! | `chat`, `complete` | `llm` |
//! | `embed` | `embedding` |
//! | `summarize` | `task` |
//!
//! Input is taken from the call parameters, output and token counts from the
//! response. Responses expose what they have through `LlmResponse`; anything
//! a response type does not support is simply omitted from the span.

use async_trait::async_trait;
use llmobs_span::{Message, Metrics, SpanIo, SpanKind, SpanMetadata};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::Result;
use crate::tracer::{Annotations, Tracer};

/// Image reference inside a content chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One chunk of multi-part message content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image_url: None,
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            text: None,
            image_url: Some(ImageUrl { url: url.into() }),
        }
    }

    /// Text of the chunk, or its image URL when it carries no text.
    fn flattened(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.image_url.as_ref().map(|image| image.url.as_str()))
    }
}

/// Message content: plain text or a list of chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to a single string; chunks are joined with no separator.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => {
                parts.iter().filter_map(ContentPart::flattened).collect()
            }
        }
    }
}

/// A chat message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: MessageContent) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", MessageContent::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new("assistant", MessageContent::Text(text.into()))
    }

    /// Reduce to the `{content, role}` pair reported on spans.
    pub fn to_span_message(&self) -> Message {
        Message::new(self.content.flatten(), self.role.clone())
    }
}

/// Parameters of a chat call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatParams {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatParams {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Parameters of a completion call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompleteParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Parameters of an embedding call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl EmbedParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }
}

/// Parameters of a summarization call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeParams {
    pub text: String,
}

impl SummarizeParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One LLM call, by kind.
#[derive(Debug, Clone, Copy)]
pub enum LlmRequest<'a> {
    Chat(&'a ChatParams),
    Complete(&'a CompleteParams),
    Embed(&'a EmbedParams),
    Summarize(&'a SummarizeParams),
}

impl LlmRequest<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            LlmRequest::Chat(_) => "chat",
            LlmRequest::Complete(_) => "complete",
            LlmRequest::Embed(_) => "embed",
            LlmRequest::Summarize(_) => "summarize",
        }
    }

    pub fn kind(&self) -> SpanKind {
        match self {
            LlmRequest::Chat(_) | LlmRequest::Complete(_) => SpanKind::Llm,
            LlmRequest::Embed(_) => SpanKind::Embedding,
            LlmRequest::Summarize(_) => SpanKind::Task,
        }
    }

    pub fn input(&self) -> SpanIo {
        match self {
            LlmRequest::Chat(params) => SpanIo::messages(
                params
                    .messages
                    .iter()
                    .map(ChatMessage::to_span_message)
                    .collect(),
            ),
            LlmRequest::Complete(params) => SpanIo::value(params.prompt.clone()),
            LlmRequest::Embed(params) => SpanIo::value(params.text.clone()),
            LlmRequest::Summarize(params) => SpanIo::value(params.text.clone()),
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        match self {
            LlmRequest::Chat(params) => params.temperature,
            LlmRequest::Complete(params) => params.temperature,
            LlmRequest::Embed(_) | LlmRequest::Summarize(_) => None,
        }
    }

    pub fn max_tokens(&self) -> Option<u32> {
        match self {
            LlmRequest::Chat(params) => params.max_tokens,
            LlmRequest::Complete(params) => params.max_tokens,
            LlmRequest::Embed(_) | LlmRequest::Summarize(_) => None,
        }
    }
}

/// What an LLM response can report. Every query defaults to "not available".
pub trait LlmResponse: Send + Sync {
    /// First completion as `{content, role}`.
    fn completion(&self) -> Option<Message> {
        None
    }

    fn embeddings(&self) -> Option<&[Vec<f32>]> {
        None
    }

    fn embedding(&self) -> Option<&[f32]> {
        self.embeddings()
            .and_then(|all| all.first())
            .map(Vec::as_slice)
    }

    fn model(&self) -> Option<&str> {
        None
    }

    fn prompt_tokens(&self) -> Option<u64> {
        None
    }

    fn completion_tokens(&self) -> Option<u64> {
        None
    }

    fn total_tokens(&self) -> Option<u64> {
        None
    }
}

/// A language model client.
#[async_trait]
pub trait Llm: Send + Sync {
    type Response: LlmResponse;

    async fn chat(&self, params: &ChatParams) -> Result<Self::Response>;

    async fn complete(&self, params: &CompleteParams) -> Result<Self::Response>;

    async fn embed(&self, params: &EmbedParams) -> Result<Self::Response>;

    async fn summarize(&self, params: &SummarizeParams) -> Result<Self::Response>;
}

/// Provider name derived from a response type: the last path segment with
/// any trailing `Response` removed, e.g. `OpenAIResponse` becomes `OpenAI`.
pub fn model_provider<R: ?Sized>() -> Option<String> {
    let full = std::any::type_name::<R>();
    let path = full.split('<').next().unwrap_or(full);
    let name = path.rsplit("::").next().unwrap_or(path);
    let provider = name.strip_suffix("Response").unwrap_or(name);
    (!provider.is_empty()).then(|| provider.to_string())
}

/// Output of a response: first completion, else first embedding.
pub fn response_output<R: LlmResponse + ?Sized>(response: &R) -> Option<SpanIo> {
    if let Some(message) = response.completion() {
        return Some(SpanIo::messages(vec![message]));
    }
    response
        .embedding()
        .map(|embedding| SpanIo::value(format!("{embedding:?}")))
}

pub fn response_metrics<R: LlmResponse + ?Sized>(response: &R) -> Metrics {
    Metrics {
        input_tokens: response.prompt_tokens(),
        output_tokens: response.completion_tokens(),
        total_tokens: response.total_tokens(),
    }
}

fn annotate<R: LlmResponse>(request: &LlmRequest<'_>, response: &R) -> Annotations {
    let metadata = SpanMetadata {
        temperature: request.temperature(),
        max_tokens: request.max_tokens(),
        model_name: response.model().map(str::to_string),
        model_provider: model_provider::<R>(),
    };

    Annotations::new()
        .with_input(Some(request.input()))
        .with_output(response_output(response))
        .with_metadata(Some(metadata))
        .with_metrics(Some(response_metrics(response)))
}

/// `Llm` decorator that reports every call as a span.
#[derive(Debug, Clone)]
pub struct InstrumentedLlm<L> {
    inner: L,
    tracer: Tracer,
}

impl<L: Llm> InstrumentedLlm<L> {
    pub fn new(inner: L, tracer: Tracer) -> Self {
        Self { inner, tracer }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    async fn traced<F>(&self, request: LlmRequest<'_>, op: F) -> Result<L::Response>
    where
        F: Future<Output = Result<L::Response>> + Send,
    {
        if !self.tracer.enabled() {
            return op.await;
        }

        let span = self.tracer.start_span(request.name(), request.kind());
        let response = span.track(op).await?;
        span.finish(annotate(&request, &response)).await?;

        Ok(response)
    }
}

#[async_trait]
impl<L: Llm> Llm for InstrumentedLlm<L> {
    type Response = L::Response;

    async fn chat(&self, params: &ChatParams) -> Result<Self::Response> {
        self.traced(LlmRequest::Chat(params), self.inner.chat(params))
            .await
    }

    async fn complete(&self, params: &CompleteParams) -> Result<Self::Response> {
        self.traced(LlmRequest::Complete(params), self.inner.complete(params))
            .await
    }

    async fn embed(&self, params: &EmbedParams) -> Result<Self::Response> {
        self.traced(LlmRequest::Embed(params), self.inner.embed(params))
            .await
    }

    async fn summarize(&self, params: &SummarizeParams) -> Result<Self::Response> {
        self.traced(LlmRequest::Summarize(params), self.inner.summarize(params))
            .await
    }
}
