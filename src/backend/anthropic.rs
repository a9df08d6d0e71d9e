//! Backend for the Anthropic Messages API.
//!
//! Endpoint: `/v1/messages`. Authentication is an `x-api-key` header plus a
//! pinned `anthropic-version`. Replies arrive as a list of content blocks;
//! free text lives in `"text"` blocks and structured results in `"tool_use"`
//! blocks carrying a schema name and payload. [`AnthropicBackend`] surfaces
//! both so callers can enforce their own schema-name checks.

use super::{Backend, CompletionRequest, CompletionResponse, Role, StructuredCall};
use crate::error::Result;
use crate::DeckError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// API version sent with every request.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend for the Anthropic Messages API.
///
/// # Example
///
/// ```
/// use deckgen::backend::AnthropicBackend;
///
/// let backend = AnthropicBackend::new().with_api_key("sk-ant-...");
/// ```
#[derive(Clone)]
pub struct AnthropicBackend {
    /// Optional API key. If set, sent as `x-api-key: {key}`.
    pub(crate) api_key: Option<String>,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.len() > 6 {
                        format!("{}***", &k[..6])
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .finish()
    }
}

impl AnthropicBackend {
    /// Create a new backend without authentication.
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the messages array for the request.
    ///
    /// The system prompt is NOT part of this array — the Messages API takes
    /// it as a top-level `system` field.
    fn build_messages(request: &CompletionRequest) -> Vec<Value> {
        let mut messages = Vec::new();

        // Prior conversation history (for correction retries)
        for msg in &request.messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": msg.content}));
        }

        // Current user prompt (only if no messages in history)
        if request.messages.is_empty() {
            messages.push(json!({"role": "user", "content": request.prompt}));
        }

        messages
    }

    /// Build the request body for `/v1/messages`.
    fn build_body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": Self::build_messages(request),
        });

        if let Some(ref sys) = request.system {
            if !sys.is_empty() {
                body["system"] = json!(sys);
            }
        }

        if let Some(ref tool) = request.tool {
            body["tools"] = json!([{
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            }]);
            // Force the model to answer through the declared schema
            body["tool_choice"] = json!({"type": "tool", "name": tool.name});
        }

        body
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        if let Ok(secs) = value.trim().parse::<u64>() {
            return Some(std::time::Duration::from_secs(secs));
        }
        None
    }

    /// Build the reqwest request with authentication headers.
    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client
            .post(url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);

        if let Some(ref key) = self.api_key {
            req = req.header("x-api-key", key.as_str());
        }

        req
    }

    /// Walk the reply's content blocks: concatenate text blocks, keep the
    /// first tool_use block as the structured result.
    fn parse_content(json_resp: &Value) -> (String, Option<StructuredCall>) {
        let mut text = String::new();
        let mut structured = None;

        if let Some(blocks) = json_resp.get("content").and_then(|c| c.as_array()) {
            for block in blocks {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                            text.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        if structured.is_none() {
                            let name = block
                                .get("name")
                                .and_then(|n| n.as_str())
                                .unwrap_or_default()
                                .to_string();
                            let input = block.get("input").cloned().unwrap_or(Value::Null);
                            structured = Some(StructuredCall { name, input });
                        }
                    }
                    _ => {}
                }
            }
        }

        (text, structured)
    }

    /// Extract metadata from a reply.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        if let Some(v) = json_resp.get("usage") {
            meta.insert("usage".into(), v.clone());
        }
        if let Some(v) = json_resp.get("model") {
            meta.insert("model".into(), v.clone());
        }
        if let Some(v) = json_resp.get("stop_reason") {
            meta.insert("stop_reason".into(), v.clone());
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

impl Default for AnthropicBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        let base = base_url.trim_end_matches('/');
        let url = format!("{}/v1/messages", base);
        let body = Self::build_body(request);

        let resp = self
            .build_http_request(client, &url, &body)
            .send()
            .await
            .map_err(DeckError::Request)?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(DeckError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }

        let json_resp: Value = resp.json().await?;
        let (text, structured) = Self::parse_content(&json_resp);

        Ok(CompletionResponse {
            text,
            structured,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
