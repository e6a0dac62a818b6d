//! OpenAI-compatible completion client
//!
//! Works with any provider exposing an OpenAI-compatible
//! `/chat/completions` endpoint (OpenAI, Azure, LocalAI, etc.). One request,
//! one non-streaming response; no retry.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use kgb_core::LlmSettings;
use reqwest::header::{self, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

pub mod extractor;

pub use extractor::OpenAIExtractor;

/// OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    base_url: Url,
    api_key: SecretString,
    http: reqwest::Client,
    default_model: String,
    temperature: Option<f32>,
}

/// Configuration for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (e.g. "https://api.openai.com/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: SecretString,
    /// Default model to use for requests
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Sampling temperature, provider default when unset
    pub temperature: Option<f32>,
}

impl ClientConfig {
    /// Build a client configuration from the `[llm]` settings
    pub fn from_settings(settings: &LlmSettings, api_key: SecretString) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key,
            default_model: settings.model.clone(),
            timeout_seconds: settings.timeout_seconds,
            temperature: settings.temperature,
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// ID of the model to use
    pub model: String,
    /// List of messages in the conversation
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Always false; replies are read in one piece
    pub stream: bool,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Content of the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
        }
    }
}

/// Role of the message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique ID of the response
    pub id: String,
    /// Model used for generation
    pub model: String,
    /// List of generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Generated choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Index of the choice
    pub index: i32,
    /// Generated message
    pub message: Message,
    /// Reason for finishing (e.g. "stop", "length")
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: i32,
    /// Tokens in the completion
    pub completion_tokens: i32,
    /// Total tokens used
    pub total_tokens: i32,
}

/// API error response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Detailed error information
    pub error: ErrorDetail,
}

/// Detailed error information
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    /// Error code
    pub code: Option<String>,
}

impl OpenAIClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        info!(
            "Creating OpenAI client for URL: {}",
            base_url.host_str().unwrap_or("unknown")
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url,
            api_key: config.api_key,
            http,
            default_model: config.default_model,
            temperature: config.temperature,
        })
    }

    /// Get the default model configured for this client
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Build request headers
    fn build_headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key_val = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret()))
            .map_err(|e| anyhow::anyhow!("Invalid API key characters: {}", e))?;

        headers.insert(header::AUTHORIZATION, api_key_val);

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    /// Endpoint URL, keeping any path prefix on the base URL
    fn completions_url(&self) -> anyhow::Result<Url> {
        // Url::join replaces the last segment unless the base ends with '/'
        let mut url_str = self.base_url.to_string();
        if !url_str.ends_with('/') {
            url_str.push('/');
        }
        url_str.push_str("chat/completions");
        Ok(Url::parse(&url_str)?)
    }

    /// Send a chat completion request
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
        let url = self.completions_url()?;
        let headers = self.build_headers()?;

        debug!("Sending chat request to {}", url);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let chat_response: ChatResponse = response.json().await?;
            info!(
                "Chat completion successful: {} tokens used",
                chat_response
                    .usage
                    .as_ref()
                    .map(|u| u.total_tokens)
                    .unwrap_or(0)
            );
            Ok(chat_response)
        } else {
            let error_text = response.text().await?;
            // Full body goes to the log only
            error!("API error ({}): {}", status, error_text);

            match serde_json::from_str::<ApiError>(&error_text) {
                Ok(api_error) => anyhow::bail!(
                    "API error: {} ({})",
                    sanitize_error_message(&api_error.error.message),
                    api_error.error.error_type.as_deref().unwrap_or("unknown")
                ),
                Err(_) => anyhow::bail!(
                    "HTTP error {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown error")
                ),
            }
        }
    }

    /// Single system + user exchange with the default model
    pub async fn simple_chat(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.default_model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.temperature,
            stream: false,
        };

        let response = self.chat(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response content"))
    }
}

/// Sanitize error messages to prevent information disclosure
fn sanitize_error_message(message: &str) -> String {
    let patterns = [
        (r"sk-[a-zA-Z0-9_-]{20,}", "sk-***"),
        (r"(?i)bearer\s+[a-zA-Z0-9._-]+", "Bearer ***"),
        (r"[a-zA-Z0-9_-]{32,}", "***REDACTED***"),
    ];

    let mut sanitized = message.to_string();

    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, replacement).to_string();
        }
    }

    if sanitized.chars().count() > 256 {
        let truncated: String = sanitized.chars().take(256).collect();
        format!("{}... [truncated]", truncated)
    } else {
        sanitized
    }
}
