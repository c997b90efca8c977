//! Cluster naming
//!
//! Naming is an external collaborator: a model is asked for a short label
//! given a cluster's representative texts. Callers must treat any failure as
//! [`UNNAMED_CLUSTER`] rather than propagate it.

pub mod provider;

use crate::config::NamingConfig;
use async_trait::async_trait;
use provider::{create_provider, ModelProvider, ProviderError};
use thiserror::Error;

/// Placeholder used whenever naming fails.
pub const UNNAMED_CLUSTER: &str = "Unnamed Cluster";

/// Naming errors
#[derive(Error, Debug)]
pub enum NamingError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model returned an empty name")]
    EmptyResponse,

    #[error("Naming failed: {0}")]
    Other(String),
}

/// Produces a name for a group of texts.
#[async_trait]
pub trait ClusterNamer: Send + Sync {
    async fn name(&self, texts: &[String]) -> Result<String, NamingError>;
}

/// Names clusters by prompting a language model.
pub struct LlmNamer {
    provider: Box<dyn ModelProvider>,
    max_prompt_chars: usize,
}

impl LlmNamer {
    pub fn new(provider: Box<dyn ModelProvider>, max_prompt_chars: usize) -> Self {
        Self {
            provider,
            max_prompt_chars,
        }
    }

    pub fn from_config(config: &NamingConfig) -> Result<Self, ProviderError> {
        let provider = create_provider(config.model.clone())?;
        Ok(Self::new(provider, config.max_prompt_chars))
    }

    /// Build the naming prompt, stopping before `max_prompt_chars` characters
    /// (not bytes) are exceeded. At least one text is always included.
    pub fn build_prompt(&self, texts: &[String]) -> String {
        let mut prompt = String::from(
            "Given the following texts, suggest a short, descriptive name for the cluster they \
             represent. The name should be 2-5 words long. Texts:\n\n",
        );
        let mut chars = prompt.chars().count();
        for (i, text) in texts.iter().enumerate() {
            let len = text.chars().count() + 2;
            if i > 0 && chars + len > self.max_prompt_chars {
                break;
            }
            prompt.push_str(text);
            prompt.push_str("\n\n");
            chars += len;
        }
        prompt
    }
}

#[async_trait]
impl ClusterNamer for LlmNamer {
    async fn name(&self, texts: &[String]) -> Result<String, NamingError> {
        let prompt = self.build_prompt(texts);
        let response = self.provider.generate(&prompt).await?;
        clean_name(&response.content).ok_or(NamingError::EmptyResponse)
    }
}

/// Trim whitespace and surrounding quotes from a model reply.
pub fn clean_name(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// A namer backed by a closure. Handy for tests and offline runs.
pub struct FnNamer<F> {
    f: F,
}

impl<F> FnNamer<F>
where
    F: Fn(&[String]) -> Result<String, NamingError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ClusterNamer for FnNamer<F>
where
    F: Fn(&[String]) -> Result<String, NamingError> + Send + Sync,
{
    async fn name(&self, texts: &[String]) -> Result<String, NamingError> {
        (self.f)(texts)
    }
}
