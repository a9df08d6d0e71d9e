use crate::decode::DecodeError;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the deck service and its components.
#[derive(Error, Debug)]
pub enum DeckError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// No reasoning-service credential is configured.
    #[error("no API credential configured")]
    NoCredential,

    /// Generation was requested with an empty section list.
    #[error("sections must not be empty")]
    EmptyInput,

    /// A generation stage failed with a descriptive message.
    #[error("generation stage '{stage}' failed: {message}")]
    Generation { stage: &'static str, message: String },

    /// The reasoning-service reply could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The operation was cancelled via the cancellation flag.
    #[error("operation was cancelled")]
    Cancelled,

    /// Invalid configuration detected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code. The `retry_after` field
    /// is populated from the `Retry-After` response header when present.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// A download handle does not resolve to an exported file.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Filesystem failure while writing or reading an artifact.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// XML serialization failed while building a document part.
    #[error("XML write failed: {0}")]
    Xml(String),

    /// Archive assembly failed.
    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for DeckError {
    fn from(err: anyhow::Error) -> Self {
        DeckError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
