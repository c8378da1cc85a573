//! Error types for instrumented calls
//!
//! An instrumented call can fail because the wrapped operation failed, or
//! because its span could not be exported.

use thiserror::Error;

use crate::config::ConfigError;
use crate::export::ExportError;

/// Main error type for instrumented operations
#[derive(Error, Debug)]
pub enum Error {
    /// The wrapped LLM, assistant or vector-search operation failed
    #[error(transparent)]
    Operation(#[from] anyhow::Error),

    /// The span was built but could not be delivered
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    /// Tracing was enabled without the settings it needs
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Create an operation error from a message
    pub fn operation<M>(msg: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        Error::Operation(anyhow::Error::msg(msg))
    }

    /// Check if this error came from span export rather than the wrapped call
    pub fn is_export_error(&self) -> bool {
        matches!(self, Error::Export(_))
    }
}

/// Result type alias for instrumented operations
pub type Result<T> = std::result::Result<T, Error>;
