//! AI Providers
//!
//! Interchangeable text-generation backends behind the [`Provider`] trait, and the
//! [`ProviderRouter`] that ranks them into a fallback chain:
//!
//! ```text
//! request ──► identity check ──► preferred ──► next available ──► LocalFallback
//!                 (canned)        (Ollama)        (Claude)         (never fails)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod claude;
mod fallback;
mod ollama;
mod router;

pub use claude::{ClaudeConfig, ClaudeProvider};
pub use fallback::LocalFallback;
pub use ollama::{OllamaConfig, OllamaProvider};
pub use router::{ProviderDescriptor, ProviderRouter, RouterConfig, RouterResponse};

/// Provider failure. Never escapes the router.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider panicked")]
    Panicked,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Request(format!("timeout: {}", e))
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

/// Model size hint; each provider maps it to a concrete model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelHint {
    /// Fast, cheap - lookups, short answers
    Light,
    /// Balanced - conversation, analysis
    #[default]
    Standard,
    /// Deep reasoning - planning, architecture
    Deep,
}

static DEEP_KEYWORDS: &[&str] = &[
    "thorough", "deep", "complex", "architecture", "design", "plan",
    "strategy", "analyze", "analyse", "compare", "tradeoff",
];

static LIGHT_KEYWORDS: &[&str] = &[
    "quick", "simple", "fast", "short", "define", "meaning", "what is",
    "translate", "spell",
];

impl ModelHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelHint::Light => "light",
            ModelHint::Standard => "standard",
            ModelHint::Deep => "deep",
        }
    }

    /// Mode default, upgraded or downgraded by keywords in the input
    pub fn for_request(mode: RequestMode, input: &str) -> Self {
        let lower = input.to_lowercase();
        if DEEP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            ModelHint::Deep
        } else if LIGHT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            ModelHint::Light
        } else {
            mode.default_hint()
        }
    }
}

/// Why the router is being asked for text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Direct conversation with the user
    Chat,
    /// Executing a scheduled action
    Action,
}

const CHAT_PREAMBLE: &str = "You are a personal assistant with a long-term memory. \
    Answer concisely and use the provided context when it is relevant.";

const ACTION_PREAMBLE: &str = "You are the background worker of a personal assistant. \
    Carry out the following action and report the outcome in a few sentences.";

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Chat => "chat",
            RequestMode::Action => "action",
        }
    }

    fn default_hint(&self) -> ModelHint {
        match self {
            RequestMode::Chat => ModelHint::Standard,
            RequestMode::Action => ModelHint::Light,
        }
    }

    /// Full prompt sent to a provider
    pub fn build_prompt(&self, input: &str) -> String {
        let preamble = match self {
            RequestMode::Chat => CHAT_PREAMBLE,
            RequestMode::Action => ACTION_PREAMBLE,
        };
        format!("{}\n\n{}", preamble, input)
    }
}

/// Text-generation backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name used for forcing and reporting
    fn name(&self) -> &str;

    /// Model identifier reported in descriptors
    fn model(&self) -> String;

    /// Cheap reachability probe
    async fn check_connection(&self) -> bool;

    /// Generate a completion. All-or-nothing: partial output is never returned.
    async fn generate(&self, prompt: &str, hint: ModelHint) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_hints() {
        assert_eq!(ModelHint::for_request(RequestMode::Chat, "Do a thorough review"), ModelHint::Deep);
        assert_eq!(ModelHint::for_request(RequestMode::Chat, "Quick question"), ModelHint::Light);
        assert_eq!(ModelHint::for_request(RequestMode::Chat, "Hello there"), ModelHint::Standard);
        assert_eq!(ModelHint::for_request(RequestMode::Action, "Summarize notes"), ModelHint::Light);
    }

    #[test]
    fn test_build_prompt() {
        let prompt = RequestMode::Action.build_prompt("Review memory");
        assert!(prompt.starts_with("You are the background worker"));
        assert!(prompt.ends_with("Review memory"));
    }
}
