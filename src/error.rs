//! Error taxonomy for the CA lifecycle engine
//!
//! Every failure names the step that failed and carries the underlying cause.
//! Re-requesting an artifact that already exists is never an error: the
//! existing artifact is loaded and returned instead.

use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the key store, issuance engine, CRL manager and ledger
#[derive(Debug, Error)]
pub enum CaError {
    /// Missing or invalid caller-supplied field
    #[error("Validation failed: {0}")]
    Validation(String),

    /// File open/read/write failure
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Key generation, signing or encoding failure
    #[error("{context}: {source}")]
    Crypto {
        context: String,
        #[source]
        source: BoxedCause,
    },

    /// Referenced artifact or record is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Metadata store failure
    #[error("Metadata store error while {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaError {
    pub fn validation(message: impl Into<String>) -> Self {
        CaError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CaError::NotFound(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CaError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn crypto<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedCause>,
    {
        CaError::Crypto {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn database(context: impl Into<String>, source: rusqlite::Error) -> Self {
        CaError::Database {
            context: context.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CaError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CaError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CaError>;
