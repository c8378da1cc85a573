//! Assistant (agent) instrumentation
//!
//! `InstrumentedAssistant` reports a conversation run as an `agent` span and
//! each tool invocation as a `tool` span. Both carry the conversation's
//! aggregate token counts.
//!
//! A run is a loop over two primitives: `step` (one model turn) and
//! `run_tool`. The loop lives in `run_conversation` and calls `run_tool`
//! through the assistant it is given, so when the decorator drives the loop
//! against itself, tool spans nest under the agent span.

use async_trait::async_trait;
use llmobs_span::{Message, Metrics, SpanIo, SpanKind};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracer::{Annotations, Tracer};

/// Lifecycle state of an assistant conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Ready,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
}

/// One message of an assistant conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl AssistantMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Text and image reference joined by a space, trimmed.
    pub fn extract_content(&self) -> String {
        let image_url = self.image_url.as_deref().unwrap_or_default();
        format!("{} {}", self.content, image_url).trim().to_string()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A conversational assistant that runs the model and executes tools.
#[async_trait]
pub trait Assistant: Send + Sync {
    fn messages(&self) -> &[AssistantMessage];

    fn state(&self) -> RunState;

    /// Tool calls requested by the latest model turn and not yet executed.
    fn pending_tool_calls(&self) -> Vec<ToolCall>;

    fn total_prompt_tokens(&self) -> Option<u64> {
        None
    }

    fn total_completion_tokens(&self) -> Option<u64> {
        None
    }

    fn total_tokens(&self) -> Option<u64> {
        None
    }

    /// Send the conversation to the model and append its reply.
    ///
    /// Leaves the state `Completed`, `RequiresAction` or `Failed`.
    async fn step(&mut self) -> Result<()>;

    /// Execute one tool call and append its result to the conversation.
    async fn run_tool(&mut self, tool_call: &ToolCall) -> Result<()>;

    /// Process the conversation until it completes or needs input.
    async fn run(&mut self, auto_tool_execution: bool) -> Result<()> {
        run_conversation(self, auto_tool_execution).await
    }
}

/// Drive `assistant` until the conversation completes, fails, or waits on
/// tool calls that are not executed automatically.
pub async fn run_conversation<A>(assistant: &mut A, auto_tool_execution: bool) -> Result<()>
where
    A: Assistant + ?Sized,
{
    if assistant.messages().is_empty() {
        tracing::warn!("No messages to process");
        return Ok(());
    }

    loop {
        assistant.step().await?;
        match assistant.state() {
            RunState::Completed | RunState::Failed => return Ok(()),
            RunState::RequiresAction if auto_tool_execution => {
                let calls = assistant.pending_tool_calls();
                if calls.is_empty() {
                    return Err(Error::operation(
                        "assistant requires action but has no pending tool calls",
                    ));
                }
                for call in &calls {
                    assistant.run_tool(call).await?;
                }
            }
            RunState::RequiresAction => return Ok(()),
            RunState::Ready | RunState::InProgress => {
                return Err(Error::operation("model turn left the conversation unresolved"));
            }
        }
    }
}

fn conversation(messages: &[AssistantMessage]) -> SpanIo {
    SpanIo::messages(
        messages
            .iter()
            .map(|message| Message::new(message.extract_content(), message.role.clone()))
            .collect(),
    )
}

fn last_content(messages: &[AssistantMessage]) -> Option<SpanIo> {
    messages
        .last()
        .map(|message| SpanIo::value(message.extract_content()))
}

fn token_metrics<A: Assistant + ?Sized>(assistant: &A) -> Metrics {
    Metrics {
        input_tokens: assistant.total_prompt_tokens(),
        output_tokens: assistant.total_completion_tokens(),
        total_tokens: assistant.total_tokens(),
    }
}

/// `Assistant` decorator that reports runs and tool calls as spans.
#[derive(Debug, Clone)]
pub struct InstrumentedAssistant<A> {
    inner: A,
    tracer: Tracer,
}

impl<A: Assistant> InstrumentedAssistant<A> {
    pub fn new(inner: A, tracer: Tracer) -> Self {
        Self { inner, tracer }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }
}

#[async_trait]
impl<A: Assistant> Assistant for InstrumentedAssistant<A> {
    fn messages(&self) -> &[AssistantMessage] {
        self.inner.messages()
    }

    fn state(&self) -> RunState {
        self.inner.state()
    }

    fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.inner.pending_tool_calls()
    }

    fn total_prompt_tokens(&self) -> Option<u64> {
        self.inner.total_prompt_tokens()
    }

    fn total_completion_tokens(&self) -> Option<u64> {
        self.inner.total_completion_tokens()
    }

    fn total_tokens(&self) -> Option<u64> {
        self.inner.total_tokens()
    }

    async fn step(&mut self) -> Result<()> {
        self.inner.step().await
    }

    async fn run(&mut self, auto_tool_execution: bool) -> Result<()> {
        if !self.tracer.enabled() {
            return self.inner.run(auto_tool_execution).await;
        }

        let tracer = self.tracer.clone();
        let input = conversation(self.inner.messages());
        let span = tracer.start_span("run", SpanKind::Agent);
        span.track(run_conversation(self, auto_tool_execution)).await?;

        // An unfinished run has no answer yet.
        let output = match self.inner.state() {
            RunState::Completed => last_content(self.inner.messages()),
            _ => None,
        };
        let annotations = Annotations::new()
            .with_input(Some(input))
            .with_output(output)
            .with_metrics(Some(token_metrics(&self.inner)));
        span.finish(annotations).await
    }

    async fn run_tool(&mut self, tool_call: &ToolCall) -> Result<()> {
        if !self.tracer.enabled() {
            return self.inner.run_tool(tool_call).await;
        }

        let request = serde_json::to_string(tool_call).ok();
        let name = request.clone().unwrap_or_else(|| tool_call.name.clone());
        let span = self.tracer.start_span(name, SpanKind::Tool);
        span.track(self.inner.run_tool(tool_call)).await?;

        let annotations = Annotations::new()
            .with_input(request.map(SpanIo::value))
            .with_output(last_content(self.inner.messages()))
            .with_metrics(Some(token_metrics(&self.inner)));
        span.finish(annotations).await
    }
}
