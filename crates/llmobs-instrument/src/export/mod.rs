//! Span exporters
//!
//! An `Exporter` receives completed spans and delivers them. Two
//! implementations ship with the crate:
//!
//! - `http` - submits spans to the LLM Observability intake API
//! - `memory` - keeps spans in memory for tests and local inspection

pub mod http;
pub mod memory;

pub use http::HttpExporter;
pub use memory::InMemoryExporter;

use async_trait::async_trait;
use llmobs_span::Span;
use thiserror::Error;

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Intake rejected spans with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to serialize spans: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Delivers completed spans.
///
/// Called once per completed span by the instrumentors; implementations may
/// batch internally. `ml_app` is read from the tracer's `Config` on every
/// call and names the application the spans are grouped under.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, ml_app: &str, spans: &[Span]) -> Result<(), ExportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_display() {
        let err = ExportError::Rejected {
            status: 403,
            body: "Forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Intake rejected spans with status 403: Forbidden"
        );
    }
}
