//! Vector-search instrumentation
//!
//! `InstrumentedVectorSearch` wraps a `VectorSearch` store:
//!
//! | call | span kind | input | output |
//! |---|---|---|---|
//! | `add_texts`, `update_texts` | `workflow` | none | none |
//! | `similarity_search` | `retrieval` | query | documents |
//! | `similarity_search_with_hyde` | `workflow` | query | none |
//! | `ask` | `workflow` | question | none |
//!
//! A retrieval span may not be a trace root. A `similarity_search` made
//! outside any span is therefore enclosed in a `workflow` span of the same
//! name.

pub mod documents;

use async_trait::async_trait;
use llmobs_span::{SpanIo, SpanKind};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatParams, CompleteParams, Llm, LlmResponse};
use crate::tracer::{Annotations, Tracer};

pub use documents::{document_text, to_document, to_documents, VECTOR_ATTRIBUTES};

/// Default number of results fetched per search.
pub const DEFAULT_K: usize = 4;

/// Separator between retrieved passages in an answer context.
const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Response type of a store's language model.
pub type LlmResponseOf<V> = <<V as VectorSearch>::Llm as Llm>::Response;

/// Prompt asking the model for a hypothetical passage answering `question`.
pub fn hyde_prompt(question: &str) -> String {
    format!("Please write a passage to answer the question\n\nQuestion: {question}\n\nPassage:")
}

/// Retrieval-augmented prompt over `context`.
pub fn rag_prompt(question: &str, context: &str) -> String {
    format!("Context:\n{context}\n---\nQuestion: {question}\n---\nAnswer:")
}

/// A vector store backed by a language model.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    type Llm: Llm;

    fn llm(&self) -> &Self::Llm;

    async fn add_texts(&self, texts: &[String]) -> Result<()>;

    async fn update_texts(&self, texts: &[String], ids: &[String]) -> Result<()>;

    /// Records nearest to `query`, best first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Value>>;

    /// Search with a model-written passage in place of the raw query.
    async fn similarity_search_with_hyde(&self, query: &str, k: usize) -> Result<Vec<Value>> {
        hyde_search(self, query, k).await
    }

    /// Answer `question` from the `k` closest records.
    async fn ask(&self, question: &str, k: usize) -> Result<LlmResponseOf<Self>> {
        answer(self, question, k).await
    }
}

/// Hypothetical-document search: complete the HyDE prompt, then search with
/// the completion.
pub async fn hyde_search<V>(store: &V, query: &str, k: usize) -> Result<Vec<Value>>
where
    V: VectorSearch + ?Sized,
{
    let params = CompleteParams::new(hyde_prompt(query));
    let response = store.llm().complete(&params).await?;
    let passage = response
        .completion()
        .map(|message| message.content)
        .ok_or_else(|| Error::operation("completion response carried no passage"))?;

    store.similarity_search(&passage, k).await
}

/// Retrieval-augmented answer: search for `question`, then chat over the
/// retrieved passages.
pub async fn answer<V>(store: &V, question: &str, k: usize) -> Result<LlmResponseOf<V>>
where
    V: VectorSearch + ?Sized,
{
    let results = store.similarity_search(question, k).await?;
    let context = results
        .iter()
        .map(document_text)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    let params = ChatParams::new(vec![ChatMessage::user(rag_prompt(question, &context))]);
    store.llm().chat(&params).await
}

/// `VectorSearch` decorator that reports store operations as spans.
///
/// The composite operations run against the decorator itself, so the
/// searches they make are traced as nested spans. The store's model should
/// be an `InstrumentedLlm` sharing the same `Tracer` for model calls to be
/// traced too.
#[derive(Debug, Clone)]
pub struct InstrumentedVectorSearch<V> {
    inner: V,
    tracer: Tracer,
}

impl<V: VectorSearch> InstrumentedVectorSearch<V> {
    pub fn new(inner: V, tracer: Tracer) -> Self {
        Self { inner, tracer }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }

    pub fn into_inner(self) -> V {
        self.inner
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Value>> {
        let span = self.tracer.start_span("similarity_search", SpanKind::Retrieval);
        let results = span.track(self.inner.similarity_search(query, k)).await?;

        let annotations = Annotations::new()
            .with_input(Some(SpanIo::value(query)))
            .with_output(Some(SpanIo::documents(to_documents(&results))));
        span.finish(annotations).await?;

        Ok(results)
    }
}

#[async_trait]
impl<V: VectorSearch> VectorSearch for InstrumentedVectorSearch<V> {
    type Llm = V::Llm;

    fn llm(&self) -> &Self::Llm {
        self.inner.llm()
    }

    async fn add_texts(&self, texts: &[String]) -> Result<()> {
        if !self.tracer.enabled() {
            return self.inner.add_texts(texts).await;
        }

        let span = self.tracer.start_span("add_texts", SpanKind::Workflow);
        span.track(self.inner.add_texts(texts)).await?;
        span.finish(Annotations::new()).await
    }

    async fn update_texts(&self, texts: &[String], ids: &[String]) -> Result<()> {
        if !self.tracer.enabled() {
            return self.inner.update_texts(texts, ids).await;
        }

        let span = self.tracer.start_span("update_texts", SpanKind::Workflow);
        span.track(self.inner.update_texts(texts, ids)).await?;
        span.finish(Annotations::new()).await
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Value>> {
        if !self.tracer.enabled() {
            return self.inner.similarity_search(query, k).await;
        }

        if !self.tracer.context().is_root() {
            return self.retrieve(query, k).await;
        }

        let span = self.tracer.start_span("similarity_search", SpanKind::Workflow);
        let results = span.track(self.retrieve(query, k)).await?;
        span.finish(Annotations::new().with_input(Some(SpanIo::value(query))))
            .await?;

        Ok(results)
    }

    async fn similarity_search_with_hyde(&self, query: &str, k: usize) -> Result<Vec<Value>> {
        if !self.tracer.enabled() {
            return self.inner.similarity_search_with_hyde(query, k).await;
        }

        let span = self
            .tracer
            .start_span("similarity_search_with_hyde", SpanKind::Workflow);
        let results = span.track(hyde_search(self, query, k)).await?;
        span.finish(Annotations::new().with_input(Some(SpanIo::value(query))))
            .await?;

        Ok(results)
    }

    async fn ask(&self, question: &str, k: usize) -> Result<LlmResponseOf<Self>> {
        if !self.tracer.enabled() {
            return self.inner.ask(question, k).await;
        }

        let span = self.tracer.start_span("ask", SpanKind::Workflow);
        let response = span.track(answer(self, question, k)).await?;
        span.finish(Annotations::new().with_input(Some(SpanIo::value(question))))
            .await?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmObsConfig;
    use crate::export::InMemoryExporter;
    use crate::llm::{EmbedParams, SummarizeParams};
    use llmobs_span::{Message, ParentId};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct EchoResponse {
        completion: Option<String>,
    }

    impl LlmResponse for EchoResponse {
        fn completion(&self) -> Option<Message> {
            self.completion
                .as_ref()
                .map(|content| Message::new(content.clone(), "assistant"))
        }
    }

    /// Replies with the last prompt it received.
    #[derive(Debug, Default)]
    struct EchoLlm {
        prompts: Mutex<Vec<String>>,
    }

    impl EchoLlm {
        fn echo(&self, prompt: String) -> Result<EchoResponse> {
            self.prompts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(prompt.clone());
            Ok(EchoResponse {
                completion: Some(prompt),
            })
        }
    }

    #[async_trait]
    impl Llm for EchoLlm {
        type Response = EchoResponse;

        async fn chat(&self, params: &ChatParams) -> Result<EchoResponse> {
            let prompt = params
                .messages
                .last()
                .map(|m| m.content.flatten())
                .unwrap_or_default();
            self.echo(prompt)
        }

        async fn complete(&self, params: &CompleteParams) -> Result<EchoResponse> {
            self.echo(params.prompt.clone())
        }

        async fn embed(&self, _params: &EmbedParams) -> Result<EchoResponse> {
            Ok(EchoResponse::default())
        }

        async fn summarize(&self, params: &SummarizeParams) -> Result<EchoResponse> {
            self.echo(params.text.clone())
        }
    }

    #[derive(Debug, Default)]
    struct StaticStore {
        llm: EchoLlm,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorSearch for StaticStore {
        type Llm = EchoLlm;

        fn llm(&self) -> &EchoLlm {
            &self.llm
        }

        async fn add_texts(&self, _texts: &[String]) -> Result<()> {
            Ok(())
        }

        async fn update_texts(&self, _texts: &[String], _ids: &[String]) -> Result<()> {
            Ok(())
        }

        async fn similarity_search(&self, query: &str, _k: usize) -> Result<Vec<Value>> {
            self.queries
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(query.to_string());
            Ok(vec![
                json!({"id": "1", "score": 0.9, "content": "Lisbon is in Portugal"}),
                json!({"id": "2", "score": 0.5, "content": "Porto is in Portugal"}),
            ])
        }
    }

    fn instrumented() -> (InstrumentedVectorSearch<StaticStore>, InMemoryExporter) {
        let exporter = InMemoryExporter::new();
        let config = LlmObsConfig::builder().ml_app("test").build();
        let tracer = Tracer::new(config, exporter.clone());
        (InstrumentedVectorSearch::new(StaticStore::default(), tracer), exporter)
    }

    #[test]
    fn test_prompts() {
        assert_eq!(
            hyde_prompt("why?"),
            "Please write a passage to answer the question\n\nQuestion: why?\n\nPassage:"
        );
        assert_eq!(
            rag_prompt("why?", "because"),
            "Context:\nbecause\n---\nQuestion: why?\n---\nAnswer:"
        );
    }

    #[tokio::test]
    async fn test_default_ask_builds_rag_prompt() {
        let store = StaticStore::default();
        let response = store.ask("where is Lisbon?", DEFAULT_K).await.unwrap();

        let expected = rag_prompt(
            "where is Lisbon?",
            "Lisbon is in Portugal\n---\nPorto is in Portugal",
        );
        assert_eq!(response.completion, Some(expected));
    }

    #[tokio::test]
    async fn test_default_hyde_searches_with_passage() {
        let store = StaticStore::default();
        store.similarity_search_with_hyde("why?", 2).await.unwrap();

        let queries = store.queries.lock().unwrap().clone();
        assert_eq!(queries, vec![hyde_prompt("why?")]);
    }

    #[tokio::test]
    async fn test_root_search_is_wrapped_in_workflow() {
        let (store, exporter) = instrumented();
        let results = store.similarity_search("what?", DEFAULT_K).await.unwrap();
        assert_eq!(results.len(), 2);

        let spans = exporter.spans();
        assert_eq!(spans.len(), 2);
        let (retrieval, workflow) = (&spans[0], &spans[1]);
        assert_eq!(retrieval.kind(), SpanKind::Retrieval);
        assert_eq!(workflow.kind(), SpanKind::Workflow);
        assert_eq!(workflow.parent_id, ParentId::Root);
        assert_eq!(retrieval.parent_id, ParentId::Span(workflow.span_id));
        assert_eq!(workflow.name, "similarity_search");
        assert_eq!(workflow.meta.output, None);
        assert_eq!(retrieval.meta.input, Some(SpanIo::value("what?")));

        let Some(SpanIo::Documents { documents }) = &retrieval.meta.output else {
            panic!("retrieval output should hold documents");
        };
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].text.as_deref(), Some("Lisbon is in Portugal"));
    }

    #[tokio::test]
    async fn test_nested_search_is_plain_retrieval() {
        let (store, exporter) = instrumented();
        store
            .tracer()
            .workflow("session", None, async {
                store.similarity_search("what?", 1).await.map(|_| ())
            })
            .await
            .unwrap();

        let kinds: Vec<SpanKind> = exporter.spans().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![SpanKind::Retrieval, SpanKind::Workflow]);
    }

    #[tokio::test]
    async fn test_add_and_update_texts_record_no_io() {
        let (store, exporter) = instrumented();
        store.add_texts(&["hello".to_string()]).await.unwrap();
        store
            .update_texts(&["hello".to_string()], &["1".to_string()])
            .await
            .unwrap();

        let spans = exporter.spans();
        assert_eq!(spans.len(), 2);
        for (span, name) in spans.iter().zip(["add_texts", "update_texts"]) {
            assert_eq!(span.name, name);
            assert_eq!(span.kind(), SpanKind::Workflow);
            assert_eq!(span.meta.input, None);
            assert_eq!(span.meta.output, None);
        }
    }

    #[tokio::test]
    async fn test_ask_nests_retrieval_under_workflow() {
        let (store, exporter) = instrumented();
        store.ask("what?", DEFAULT_K).await.unwrap();

        let spans = exporter.spans();
        assert_eq!(spans.len(), 2);
        let (retrieval, ask) = (&spans[0], &spans[1]);
        assert_eq!(ask.name, "ask");
        assert_eq!(ask.meta.input, Some(SpanIo::value("what?")));
        assert_eq!(retrieval.parent_id, ParentId::Span(ask.span_id));
        assert!(store.tracer().context().is_root());
    }
}
