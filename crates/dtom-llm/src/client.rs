//! Minimal OpenAI-compatible chat completion client

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};

pub struct ChatClient {
    config: LlmConfig,
    http: Client,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(concat!("dtom-llm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(ChatClient { config, http })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send one system + user exchange and return the reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let mut request = self.http.post(self.config.endpoint()).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(|e| self.classify(e))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = res.json().await.map_err(|e| self.classify(e))?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyReply)?;

        debug!(model = %self.config.model, chars = content.len(), "chat reply received");
        Ok(content.to_string())
    }

    fn classify(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::Http(err)
        }
    }
}
