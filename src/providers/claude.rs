//! Claude Provider - Anthropic Messages API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ModelHint, Provider, ProviderError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude provider configuration
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: usize,
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: ANTHROPIC_API_URL.to_string(),
            max_tokens: 1024,
            timeout: Duration::from_secs(90),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    r#type: String,
    text: Option<String>,
}

/// Remote Claude backend
pub struct ClaudeProvider {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeProvider {
    pub fn new(config: ClaudeConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Get model ID from hint
    fn model_id(hint: ModelHint) -> &'static str {
        match hint {
            ModelHint::Light => "claude-3-5-haiku-20241022",
            ModelHint::Standard => "claude-sonnet-4-20250514",
            ModelHint::Deep => "claude-opus-4-20250514",
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("ANTHROPIC_API_KEY".to_string()))
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> String {
        Self::model_id(ModelHint::Standard).to_string()
    }

    async fn check_connection(&self) -> bool {
        let Ok(api_key) = self.api_key() else {
            return false;
        };

        match self
            .client
            .get(format!("{}/models", self.config.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.config.probe_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, hint: ModelHint) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = Self::model_id(hint);

        let request = MessageRequest {
            model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let result: MessageResponse = response.json().await?;
        let text = result
            .content
            .iter()
            .filter(|block| block.r#type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        debug!("Claude ({}) generated {} chars", model, text.len());
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_api_key() {
        let provider = ClaudeProvider::new(ClaudeConfig::default()).unwrap();

        assert!(!provider.check_connection().await);
        match provider.generate("hello", ModelHint::Standard).await {
            Err(ProviderError::NotConfigured(key)) => assert_eq!(key, "ANTHROPIC_API_KEY"),
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }

    #[test]
    fn test_model_ids() {
        assert!(ClaudeProvider::model_id(ModelHint::Light).contains("haiku"));
        assert!(ClaudeProvider::model_id(ModelHint::Deep).contains("opus"));
    }
}
