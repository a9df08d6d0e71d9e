//! Two-stage deck generation.
//!
//! [`Generator`] carries the HTTP client, provider backend, retry policy,
//! and sampling parameters, and drives the pipeline: one outline call plans
//! the deck as title/message-line pairs, then one structured-output call per
//! slide fills in evidence bullets, fanned out with bounded concurrency.

mod body;
mod outline;
pub(crate) mod prompt;

pub use body::PLACEHOLDER_BULLET;

use crate::backend::{
    with_backoff, AnthropicBackend, Backend, BackoffConfig, CompletionRequest, CompletionResponse,
};
use crate::error::Result;
use crate::model::{Section, SlidesState};
use crate::DeckError;
use reqwest::Client;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tracing::{info, warn};

/// Model used for both stages unless overridden.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Deck generator shared across requests.
///
/// Constructed once at startup and shared behind an `Arc`; every field is
/// read-only after [`build`](GeneratorBuilder::build).
///
/// # Example
///
/// ```
/// use deckgen::generate::Generator;
///
/// let generator = Generator::builder("https://api.anthropic.com")
///     .anthropic_with_key("sk-ant-xxxxx")
///     .concurrency(2)
///     .build();
/// ```
pub struct Generator {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) backoff: BackoffConfig,
    pub(crate) model: String,
    pub(crate) temperature: f64,
    pub(crate) max_tokens: u32,
    pub(crate) concurrency: usize,
    pub(crate) outline_retries: u32,
    pub(crate) cancellation: Option<Arc<AtomicBool>>,
}

impl Generator {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> GeneratorBuilder {
        GeneratorBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            backoff: None,
            model: None,
            temperature: None,
            max_tokens: None,
            concurrency: None,
            outline_retries: None,
            cancellation: None,
            timeout: None,
        }
    }

    /// Generate a full deck from free-text sections.
    ///
    /// Stage 1 plans the outline; stage 2 expands every planned slide into
    /// evidence bullets. A slide whose expansion fails is kept as a
    /// placeholder rather than failing the deck; only cancellation aborts
    /// the whole run.
    pub async fn generate(&self, sections: &[Section]) -> Result<SlidesState> {
        if sections.iter().all(|s| s.content.trim().is_empty()) {
            return Err(DeckError::EmptyInput);
        }
        self.check_cancelled()?;

        let planned = outline::generate_outline(self, sections).await?;
        let slides = body::expand_outline(self, &planned, sections).await?;

        info!(slides = slides.len(), "deck generated");
        Ok(SlidesState::new(slides))
    }

    /// Base request with this generator's model and sampling parameters.
    pub(crate) fn request(&self, prompt: String) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            system: None,
            prompt,
            messages: Vec::new(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tool: None,
        }
    }

    /// Execute one backend call with transport-level retry.
    pub(crate) async fn call(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut on_retry = |attempt: u32, delay: Duration, reason: &str| {
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason,
                "transport retry"
            );
        };

        with_backoff(
            &self.backend,
            &self.client,
            &self.base_url,
            request,
            &self.backoff,
            self.cancel_flag(),
            Some(&mut on_retry),
        )
        .await
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return an error if cancellation has been requested.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(DeckError::Cancelled);
        }
        Ok(())
    }

    /// Get a reference to the cancellation AtomicBool, if set.
    pub fn cancel_flag(&self) -> Option<&AtomicBool> {
        self.cancellation.as_deref()
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("backoff", &self.backoff)
            .field("concurrency", &self.concurrency)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Builder for [`Generator`].
pub struct GeneratorBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    concurrency: Option<usize>,
    outline_retries: Option<u32>,
    cancellation: Option<Arc<AtomicBool>>,
    timeout: Option<Duration>,
}

impl GeneratorBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the provider backend. Default: [`AnthropicBackend`] without a key.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use the Anthropic backend with API key authentication.
    pub fn anthropic_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.backend = Some(Arc::new(AnthropicBackend::new().with_api_key(api_key)));
        self
    }

    /// Set the transport retry configuration. Default: [`BackoffConfig::standard()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Set the model identifier. Default: [`DEFAULT_MODEL`].
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature. Default: 0.7.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the reply token ceiling. Default: 2000.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Cap on concurrent per-slide body calls. Default: 4.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Correction re-asks allowed when the outline reply fails to decode.
    /// Default: 2.
    pub fn outline_retries(mut self, retries: u32) -> Self {
        self.outline_retries = Some(retries);
        self
    }

    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the request timeout. Default: 120 seconds.
    ///
    /// If a custom `Client` is provided via `.client()`, this setting is
    /// ignored (the custom client's own timeout applies).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the generator.
    pub fn build(self) -> Generator {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(120));
        let client = self.client.unwrap_or_else(|| {
            Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client")
        });
        Generator {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(AnthropicBackend::new())),
            backoff: self.backoff.unwrap_or_else(BackoffConfig::standard),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(0.7),
            max_tokens: self.max_tokens.unwrap_or(2000),
            concurrency: self.concurrency.unwrap_or(4),
            outline_retries: self.outline_retries.unwrap_or(2),
            cancellation: self.cancellation,
        }
    }
}

/// Strip known provider path suffixes from a base URL.
/// This prevents double-pathing when the backend appends its own path.
/// e.g., "https://api.anthropic.com/v1/messages" -> "https://api.anthropic.com"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in &["/v1/messages", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
