//! Client for OpenAI-compatible chat completions APIs.
//!
//! The search drivers only see the [`ChatModel`] trait: a conversation goes
//! in, generated text comes out. Transport and provider failures never reach
//! the drivers; they degrade to an empty response, which evaluates as a
//! non-solving candidate.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::sampling::SamplingConfig;

/// A chat message with role and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that can answer a conversation with generated text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply. Failures yield an empty string.
    async fn complete(&self, conversation: &[ChatMessage], sampling: &SamplingConfig) -> String;
}

/// Request body for /chat/completions.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

/// Response from /chat/completions.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// A single choice in the response.
#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for chat completions.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API base including the version prefix (e.g., "http://localhost:8000/v1")
    /// * `model` - Model name sent with every request
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            max_tokens: ModelConfig::default().max_tokens,
        }
    }

    /// Create a client from the `[model]` configuration table.
    pub fn from_config(config: &ModelConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a conversation and return the first choice's text.
    pub async fn try_complete(
        &self,
        conversation: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: conversation,
            max_tokens: self.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
        };

        let mut builder = self.client.post(self.completions_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to chat completions endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion failed with status {}: {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let text = chat_response
            .choices
            .into_iter()
            .next()
            .context("No choices in chat completion response")?
            .message
            .content
            .unwrap_or_default();

        debug!(model = %self.model, chars = text.len(), "Received completion");
        Ok(text)
    }

    /// Check if the server is healthy.
    ///
    /// Probes `/health` at the server root (the base URL without its `/v1`).
    pub async fn health_check(&self) -> Result<bool> {
        let root = self.base_url.trim_end_matches("/v1");
        let url = format!("{}/health", root);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, conversation: &[ChatMessage], sampling: &SamplingConfig) -> String {
        match self.try_complete(conversation, sampling).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    model = %self.model,
                    error = %e,
                    "Model query failed, treating as empty response"
                );
                String::new()
            }
        }
    }
}
