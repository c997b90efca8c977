//! Model provider abstraction for cluster naming
//!
//! Supports:
//! - OpenAI-compatible chat completions (`/chat/completions`)
//! - Ollama (`/api/generate`)
//!
//! ```no_run
//! use kluster::config::ModelConfig;
//! use kluster::naming::provider::create_provider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Set API key in environment: export OPENAI_API_KEY=sk-...
//! let provider = create_provider(ModelConfig::default())?;
//! let response = provider.generate("Name this cluster").await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

use crate::config::{ModelConfig, ModelProvider as ProviderType};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Response from a model provider
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
}

/// Model provider trait
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a completion for a single user prompt
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError>;

    fn model_name(&self) -> &str;

    fn provider_type(&self) -> ProviderType;
}

/// Create a model provider from configuration
pub fn create_provider(config: ModelConfig) -> Result<Box<dyn ModelProvider>, ProviderError> {
    match config.provider {
        ProviderType::Ollama => Ok(Box::new(OllamaProvider::new(config))),
        ProviderType::OpenAI => Ok(Box::new(OpenAIProvider::new(config)?)),
    }
}

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_default()
}

// ============================================================================
// Ollama Provider
// ============================================================================

pub struct OllamaProvider {
    config: ModelConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            client: http_client(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/generate", self.config.url.trim_end_matches('/'));

        let request = OllamaRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                status,
                response.text().await?
            )));
        }

        let body: OllamaResponse = response.json().await?;
        Ok(ProviderResponse {
            content: body.response,
            model: body.model,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Ollama
    }
}

// ============================================================================
// OpenAI Provider
// ============================================================================

pub struct OpenAIProvider {
    config: ModelConfig,
    client: Client,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::AuthError("OpenAI API key not found".to_string()))?;

        Ok(Self {
            config,
            client: http_client(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    model: String,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.config.url.trim_end_matches('/'));

        let request = OpenAIRequest {
            model: &self.config.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                status,
                response.text().await?
            )));
        }

        let body: OpenAIResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(ProviderResponse {
            content,
            model: body.model,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_requires_key() {
        let config = ModelConfig {
            api_key: Some("KLUSTER_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(config),
            Err(ProviderError::AuthError(_))
        ));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = ModelConfig {
            provider: ProviderType::Ollama,
            url: "http://localhost:11434".to_string(),
            model: "qwen3:8b".to_string(),
            api_key: None,
            ..Default::default()
        };
        let provider = create_provider(config).unwrap();
        assert_eq!(provider.model_name(), "qwen3:8b");
        assert_eq!(provider.provider_type(), ProviderType::Ollama);
    }

    #[test]
    fn test_openai_request_shape() {
        let request = OpenAIRequest {
            model: "gpt-4o",
            messages: vec![OpenAIMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.7,
            max_tokens: Some(50),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 50);
    }
}
