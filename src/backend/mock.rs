//! Mock backend for testing without a live reasoning service.
//!
//! [`MockBackend`] returns pre-configured replies in order, allowing
//! deterministic tests of both generation stages, including structured
//! tool-style results and transport failures.
//!
//! # Example
//!
//! ```
//! use deckgen::backend::MockBackend;
//!
//! let mock = MockBackend::fixed("{\"slides\": []}");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, CompletionRequest, CompletionResponse, StructuredCall};
use crate::error::Result;
use crate::DeckError;

/// One canned reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A free-text reply.
    Text(String),
    /// A structured tool-style reply tagged with a schema name.
    Structured {
        name: String,
        input: serde_json::Value,
    },
    /// A transport failure with the given HTTP status.
    Error(u16),
}

/// A test backend that returns canned replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend with the given canned replies.
    ///
    /// Replies are returned in order. When exhausted, cycles from the beginning.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the same text reply.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Text(text.into())])
    }

    /// Create a mock that always returns the same structured reply.
    pub fn structured(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::new(vec![MockReply::Structured {
            name: name.into(),
            input,
        }])
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        match self.next_reply() {
            MockReply::Text(text) => Ok(CompletionResponse {
                text,
                structured: None,
                status: 200,
                metadata: None,
            }),
            MockReply::Structured { name, input } => Ok(CompletionResponse {
                text: String::new(),
                structured: Some(StructuredCall { name, input }),
                status: 200,
                metadata: None,
            }),
            MockReply::Error(status) => Err(DeckError::HttpError {
                status,
                body: "mock error".into(),
                retry_after: None,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
