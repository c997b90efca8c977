//! Configuration system for kluster
//!
//! Supports loading configuration from:
//! 1. CLI --config argument
//! 2. ~/.config/kluster/config.{KLUSTER_ENV}.json
//! 3. Default values
//!
//! Where KLUSTER_ENV can be: production (default), development, test
//!
//! # Examples
//!
//! ```
//! use kluster::config::{AppConfig, ModelProvider};
//!
//! let mut config = AppConfig::default();
//! config.clustering.min_k = 5;
//! config.naming.model.provider = ModelProvider::Ollama;
//! config.naming.model.model = "qwen3:8b".to_string();
//!
//! config.validate().unwrap();
//! ```
//!
//! ## Environment Variables
//!
//! Environment variables override config file values:
//! - KLUSTER_MIN_K, KLUSTER_MAX_K, KLUSTER_K_STEP
//! - KLUSTER_MAX_ITERATIONS, KLUSTER_SAMPLE_SIZE
//! - KLUSTER_NAMING_MODEL, KLUSTER_NAMING_URL
//! - KLUSTER_OUTPUT_DIR

use crate::cluster::{SearchParams, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_MAX_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Supported naming model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Ollama,
    #[default]
    OpenAI,
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown provider: {}",
                s
            ))),
        }
    }
}

/// Model used to name clusters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: ModelProvider,

    /// API base URL
    #[serde(default = "default_openai_url")]
    pub url: String,

    pub model: String,

    /// API key (can be environment variable name like "OPENAI_API_KEY")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::OpenAI,
            url: default_openai_url(),
            model: "gpt-4o".to_string(),
            api_key: Some("OPENAI_API_KEY".to_string()),
            temperature: default_temperature(),
            max_tokens: Some(50),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if self.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "URL cannot be empty".to_string(),
            ));
        }

        if self.model.is_empty() {
            return Err(ConfigError::ValidationError(
                "Model name cannot be empty".to_string(),
            ));
        }

        if self.provider != ModelProvider::Ollama && self.api_key.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "API key required for {} provider",
                self.provider
            )));
        }

        Ok(())
    }

    /// Resolve API key from environment variable if needed
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.as_ref().and_then(|key| {
            if key.chars().all(|c| c.is_uppercase() || c == '_') {
                std::env::var(key).ok()
            } else {
                Some(key.clone())
            }
        })
    }
}

/// Elbow search and K-means parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_min_k")]
    pub min_k: usize,

    #[serde(default = "default_max_k")]
    pub max_k: usize,

    #[serde(default = "default_k_step")]
    pub k_step: usize,

    /// Iteration cap per K-means run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Relative centroid movement below which a run is converged (0.0001 = 0.01%)
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,

    /// Representative items kept per cluster
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Bound max_k by the square root of the item count
    #[serde(default = "default_clamp_to_sqrt")]
    pub clamp_to_sqrt: bool,
}

fn default_min_k() -> usize {
    10
}

fn default_max_k() -> usize {
    50
}

fn default_k_step() -> usize {
    5
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_convergence_threshold() -> f64 {
    DEFAULT_CONVERGENCE_THRESHOLD
}

fn default_sample_size() -> usize {
    25
}

fn default_clamp_to_sqrt() -> bool {
    true
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_k: default_min_k(),
            max_k: default_max_k(),
            k_step: default_k_step(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            sample_size: default_sample_size(),
            clamp_to_sqrt: default_clamp_to_sqrt(),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_k == 0 {
            return Err(ConfigError::ValidationError(
                "min_k must be at least 1".to_string(),
            ));
        }
        if self.k_step == 0 {
            return Err(ConfigError::ValidationError(
                "k_step must be at least 1".to_string(),
            ));
        }
        if self.min_k > self.max_k {
            return Err(ConfigError::ValidationError(format!(
                "min_k ({}) must not exceed max_k ({})",
                self.min_k, self.max_k
            )));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if !(self.convergence_threshold > 0.0 && self.convergence_threshold < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "convergence_threshold must be in (0, 1), got {}",
                self.convergence_threshold
            )));
        }
        if self.sample_size == 0 {
            return Err(ConfigError::ValidationError(
                "sample_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Search range for a data set of `n_items`, with the square-root clamp applied if enabled.
    pub fn search_params(&self, n_items: usize) -> SearchParams {
        let params = SearchParams::new(self.min_k, self.max_k, self.k_step);
        if self.clamp_to_sqrt {
            params.clamp_to_sqrt(n_items)
        } else {
            params
        }
    }
}

/// Cluster naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_naming_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub model: ModelConfig,

    /// Upper bound on the prompt built from representative texts
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_naming_enabled() -> bool {
    true
}

fn default_max_prompt_chars() -> usize {
    12_000
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            enabled: default_naming_enabled(),
            model: ModelConfig::default(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    /// Directory receiving checkpoint files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clustering: ClusteringConfig::default(),
            naming: NamingConfig::default(),
            output_dir: default_output_dir(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = serde_json::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration with standard priority:
    /// 1. Explicit path
    /// 2. ~/.config/kluster/config.{KLUSTER_ENV}.json
    /// 3. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            if path.exists() {
                tracing::info!("Loading config from: {:?}", path);
                return Self::from_file(path);
            } else {
                return Err(ConfigError::ValidationError(format!(
                    "Config file not found: {:?}",
                    path
                )));
            }
        }

        let env = std::env::var("KLUSTER_ENV").unwrap_or_else(|_| "production".to_string());

        if let Some(config_dir) = Self::config_dir() {
            let config_path = config_dir.join(format!("config.{}.json", env));
            if config_path.exists() {
                tracing::info!("Loading config from: {:?}", config_path);
                return Self::from_file(&config_path);
            }
        }

        tracing::info!("Using default configuration with environment overrides");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        fn env_usize(name: &str) -> Option<usize> {
            match std::env::var(name) {
                Ok(raw) => match raw.parse() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!("Ignoring {}={:?}: not a positive integer", name, raw);
                        None
                    }
                },
                Err(_) => None,
            }
        }

        if let Some(v) = env_usize("KLUSTER_MIN_K") {
            self.clustering.min_k = v;
        }
        if let Some(v) = env_usize("KLUSTER_MAX_K") {
            self.clustering.max_k = v;
        }
        if let Some(v) = env_usize("KLUSTER_K_STEP") {
            self.clustering.k_step = v;
        }
        if let Some(v) = env_usize("KLUSTER_MAX_ITERATIONS") {
            self.clustering.max_iterations = v;
        }
        if let Some(v) = env_usize("KLUSTER_SAMPLE_SIZE") {
            self.clustering.sample_size = v;
        }
        if let Ok(model) = std::env::var("KLUSTER_NAMING_MODEL") {
            self.naming.model.model = model;
        }
        if let Ok(url) = std::env::var("KLUSTER_NAMING_URL") {
            self.naming.model.url = url;
        }
        if let Ok(dir) = std::env::var("KLUSTER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clustering.validate()?;
        if self.naming.enabled {
            self.naming.model.validate()?;
        }
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kluster"))
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
