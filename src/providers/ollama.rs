//! Ollama Provider - local model server

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ModelHint, Provider, ProviderError};

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    /// Optional larger model for `ModelHint::Deep`
    pub deep_model: Option<String>,
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            deep_model: None,
            timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// Ollama generate response
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

/// Local Ollama backend
pub struct OllamaProvider {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn model_for(&self, hint: ModelHint) -> &str {
        match (hint, &self.config.deep_model) {
            (ModelHint::Deep, Some(deep)) => deep,
            _ => &self.config.model,
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }

    async fn check_connection(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.config.url))
            .timeout(self.config.probe_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, hint: ModelHint) -> Result<String, ProviderError> {
        let model = self.model_for(hint);
        let response = self
            .client
            .post(format!("{}/api/generate", self.config.url))
            .json(&serde_json::json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": 0.7,
                    "num_predict": 1024,
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let result: OllamaGenerateResponse = response.json().await?;
        if !result.done {
            return Err(ProviderError::InvalidResponse("incomplete generation".to_string()));
        }

        let text = result.response.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        debug!("Ollama ({}) generated {} chars", model, text.len());
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_for_hint() {
        let provider = OllamaProvider::new(OllamaConfig {
            deep_model: Some("llama3.1:70b".to_string()),
            ..OllamaConfig::default()
        })
        .unwrap();

        assert_eq!(provider.model_for(ModelHint::Deep), "llama3.1:70b");
        assert_eq!(provider.model_for(ModelHint::Light), "llama3.2:3b");
        assert_eq!(provider.name(), "ollama");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let provider = OllamaProvider::new(OllamaConfig {
            url: "http://127.0.0.1:9".to_string(),
            probe_timeout: Duration::from_millis(200),
            timeout: Duration::from_millis(500),
            ..OllamaConfig::default()
        })
        .unwrap();

        assert!(!provider.check_connection().await);
        assert!(provider.generate("hi", ModelHint::Standard).await.is_err());
    }
}
