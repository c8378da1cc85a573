//! LLM Observability intake HTTP exporter
//!
//! Posts span batches to `{base_url}/trace/spans` with the `DD-API-KEY`
//! header. A failed submission is reported to the caller once; there is no
//! retry and nothing is persisted.

use async_trait::async_trait;
use llmobs_span::{Span, SpanBatch};
use reqwest::Client;
use std::fmt;
use std::time::Duration;

use super::{ExportError, Exporter};
use crate::config::{ConfigError, LlmObsConfig};

const API_KEY_HEADER: &str = "DD-API-KEY";

/// HTTP exporter for the span intake API
#[derive(Clone)]
pub struct HttpExporter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpExporter {
    /// Create an exporter for the configured site.
    pub fn new(config: &LlmObsConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_base_url(
            config.intake_url(),
            config.require_api_key()?,
            config.request_timeout_ms,
        ))
    }

    /// Create an exporter against an explicit intake base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Full URL spans are posted to
    pub fn spans_url(&self) -> String {
        format!("{}/trace/spans", self.base_url)
    }
}

#[async_trait]
impl Exporter for HttpExporter {
    async fn export(&self, ml_app: &str, spans: &[Span]) -> Result<(), ExportError> {
        let batch = SpanBatch::new(ml_app, spans.to_vec());
        let body = serde_json::to_vec(&batch)?;

        let response = self
            .client
            .post(self.spans_url())
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ExportError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                spans = spans.len(),
                ml_app,
                status = status.as_u16(),
                "Submitted spans"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ExportError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl fmt::Debug for HttpExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpExporter")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
