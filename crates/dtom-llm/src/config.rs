//! Chat endpoint configuration

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";

/// OpenAI-compatible chat endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,
    /// Bearer token (optional for local servers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            base_url: std::env::var("DTOM_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: std::env::var("DTOM_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: 0.0,
            max_tokens: 1000,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific endpoint, ignoring the environment
    pub fn new(base_url: &str, model: &str) -> Self {
        LlmConfig {
            base_url: base_url.to_string(),
            api_key: None,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 1000,
            timeout_secs: 120,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(LlmError::Config(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.model.trim().is_empty() {
            return Err(LlmError::Config("model must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(LlmError::Config("timeout must be at least 1s".to_string()));
        }
        Ok(())
    }
}
