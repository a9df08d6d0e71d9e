//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over reasoning-service providers,
//! translating between normalized [`CompletionRequest`]/[`CompletionResponse`]
//! types and provider-specific HTTP APIs. Built-in implementations:
//! [`AnthropicBackend`] and the test-only [`MockBackend`].

pub mod anthropic;
pub mod backoff;
pub mod mock;

pub use anthropic::AnthropicBackend;
pub use backoff::BackoffConfig;
pub use mock::MockBackend;

use crate::error::Result;
use crate::DeckError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Type alias for the callback invoked before each transport retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, std::time::Duration, &str) + Send)>;

/// A normalized completion request — provider-agnostic.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier (e.g. `"claude-sonnet-4-20250514"`).
    pub model: String,

    /// Optional system prompt.
    pub system: Option<String>,

    /// The user prompt text.
    pub prompt: String,

    /// For retry: prior conversation history (original prompt + bad reply +
    /// correction). Empty for initial calls.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    pub temperature: f64,

    /// Token ceiling for the reply.
    pub max_tokens: u32,

    /// When set, the provider is asked to answer through this tool-style
    /// schema instead of free text.
    pub tool: Option<ToolSpec>,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

/// A tool-style structured-output schema declaration.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Schema name the provider must tag its result with.
    pub name: String,
    /// What the tool is for, shown to the model.
    pub description: String,
    /// JSON Schema for the structured payload.
    pub input_schema: serde_json::Value,
}

/// A structured result extracted from a provider reply.
#[derive(Debug, Clone)]
pub struct StructuredCall {
    /// The schema name the provider tagged the result with.
    pub name: String,
    /// The structured payload.
    pub input: serde_json::Value,
}

/// A normalized completion response.
#[derive(Debug)]
pub struct CompletionResponse {
    /// Concatenated free-text content.
    pub text: String,

    /// The first structured result in the reply, if any.
    pub structured: Option<StructuredCall>,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, model info).
    /// Stored as raw JSON — each provider returns different fields.
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over reasoning-service providers.
///
/// Implementors translate between the normalized
/// [`CompletionRequest`]/[`CompletionResponse`] and the provider's HTTP API.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a completion call.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Check whether a [`DeckError`] is retryable based on the backoff config.
///
/// Retryable conditions:
/// - [`DeckError::HttpError`] with a status in `config.retryable_statuses`
/// - [`DeckError::Request`] (connection/transport errors)
pub fn is_retryable(error: &DeckError, config: &BackoffConfig) -> bool {
    match error {
        DeckError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        DeckError::Request(_) => true,
        _ => false,
    }
}

/// Execute a backend call with transport-level retry and exponential backoff.
///
/// Wraps [`Backend::complete`] with automatic retry on transient failures
/// (429, 5xx, connection errors). Uses the [`BackoffConfig`] to determine
/// delay strategy and retry count. The cancellation flag is checked before
/// each attempt and again after each backoff sleep.
///
/// Returns the first successful response, or the last error if all retries
/// are exhausted.
///
/// # Arguments
///
/// * `backend` — The provider backend to call
/// * `client` — HTTP client for making requests
/// * `base_url` — Base URL for the API
/// * `request` — The normalized completion request
/// * `config` — Backoff configuration
/// * `cancel` — Optional cancellation flag
/// * `on_retry` — Optional callback invoked before each retry with (attempt, delay, reason)
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &CompletionRequest,
    config: &BackoffConfig,
    cancel: Option<&std::sync::atomic::AtomicBool>,
    mut on_retry: RetryCallback<'_>,
) -> Result<CompletionResponse> {
    let mut last_error: Option<DeckError> = None;

    for attempt in 0..=config.max_retries {
        if let Some(flag) = cancel {
            if flag.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(DeckError::Cancelled);
            }
        }

        // Wait for backoff delay (not on first attempt)
        if attempt > 0 {
            let delay = if let Some(DeckError::HttpError {
                retry_after: Some(ra),
                ..
            }) = &last_error
            {
                if config.respect_retry_after {
                    *ra
                } else {
                    config.delay_for_attempt(attempt - 1)
                }
            } else {
                config.delay_for_attempt(attempt - 1)
            };

            let reason = last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();

            if let Some(ref mut cb) = on_retry {
                cb(attempt, delay, &reason);
            }

            tokio::time::sleep(delay).await;

            // Check cancellation after sleep
            if let Some(flag) = cancel {
                if flag.load(std::sync::atomic::Ordering::Relaxed) {
                    return Err(DeckError::Cancelled);
                }
            }
        }

        match backend.complete(client, base_url, request).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt < config.max_retries && is_retryable(&e, config) {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    // Should not reach here, but just in case
    Err(last_error.unwrap_or(DeckError::Other(
        "backoff loop exited unexpectedly".into(),
    )))
}
