//! Provider Router Integration Tests
//!
//! The fallback chain must always produce a response.

use assistant_core::events::CoreEvent;
use assistant_core::providers::{
    ClaudeConfig, ClaudeProvider, LocalFallback, ModelHint, OllamaConfig, OllamaProvider,
    Provider, ProviderError, ProviderRouter, RequestMode, RouterConfig,
};
use assistant_core::EventBus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Nothing listens on the discard port
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn unreachable_chain() -> Vec<Arc<dyn Provider>> {
    let local = OllamaProvider::new(OllamaConfig {
        url: UNREACHABLE.to_string(),
        timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_millis(500),
        ..OllamaConfig::default()
    })
    .unwrap();
    let remote = ClaudeProvider::new(ClaudeConfig {
        api_key: Some("test-key".to_string()),
        base_url: UNREACHABLE.to_string(),
        timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_millis(500),
        ..ClaudeConfig::default()
    })
    .unwrap();
    vec![Arc::new(local), Arc::new(remote)]
}

/// Reachable, but every generation blows up
struct PanickingProvider;

#[async_trait]
impl Provider for PanickingProvider {
    fn name(&self) -> &str {
        "panicky"
    }

    fn model(&self) -> String {
        "none".to_string()
    }

    async fn check_connection(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &str, _hint: ModelHint) -> Result<String, ProviderError> {
        panic!("backend bug")
    }
}

/// Reachable, but never answers in time
struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    fn model(&self) -> String {
        "none".to_string()
    }

    async fn check_connection(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &str, _hint: ModelHint) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }
}

/// Probe says down; generation errors if called anyway
struct OfflineProvider;

#[async_trait]
impl Provider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn model(&self) -> String {
        "none".to_string()
    }

    async fn check_connection(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &str, _hint: ModelHint) -> Result<String, ProviderError> {
        Err(ProviderError::Request("connection refused".to_string()))
    }
}

/// Always answers
struct HealthyProvider;

#[async_trait]
impl Provider for HealthyProvider {
    fn name(&self) -> &str {
        "healthy"
    }

    fn model(&self) -> String {
        "small".to_string()
    }

    async fn check_connection(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &str, _hint: ModelHint) -> Result<String, ProviderError> {
        Ok("served".to_string())
    }
}

#[tokio::test]
async fn test_unreachable_chain_uses_fallback() {
    let router = ProviderRouter::new(RouterConfig::default(), unreachable_chain(), EventBus::default());
    router.initialize().await;

    assert!(router.descriptors().iter().take(2).all(|d| !d.available));
    assert_eq!(router.preferred(), "local-fallback");
    assert!(router.is_degraded());
    assert!(!router.preferred_available());

    let input = "What is on my calendar today?";
    let response = router.process_request(input, RequestMode::Chat, None).await;
    assert!(response.fell_back);
    assert_eq!(response.text, LocalFallback::new().respond(input, RequestMode::Chat));
}

#[tokio::test]
async fn test_forced_unreachable_provider_falls_back() {
    let router = ProviderRouter::new(RouterConfig::default(), unreachable_chain(), EventBus::default());
    router.initialize().await;

    let response = router
        .process_request("Summarize my notes", RequestMode::Action, Some("claude"))
        .await;
    assert!(response.fell_back);
    assert_eq!(response.failures, vec!["claude".to_string()]);
}

#[tokio::test]
async fn test_panicking_provider_never_escapes() {
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let router = ProviderRouter::new(RouterConfig::default(), vec![Arc::new(PanickingProvider)], events);
    router.initialize().await;
    assert_eq!(router.preferred(), "panicky");

    let response = router.process_request("Tell me a joke", RequestMode::Chat, None).await;
    assert!(response.fell_back);
    assert_eq!(response.failures, vec!["panicky".to_string()]);

    // demoted until the next probe
    assert_eq!(router.preferred(), "local-fallback");

    let mut preferred = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::ProviderChanged { preferred: name } = event {
            preferred.push(name);
        }
    }
    assert_eq!(preferred, vec!["panicky".to_string(), "local-fallback".to_string()]);
}

#[tokio::test]
async fn test_hanging_provider_times_out() {
    let config = RouterConfig {
        request_timeout: Duration::from_millis(100),
        ..RouterConfig::default()
    };
    let router = ProviderRouter::new(config, vec![Arc::new(HangingProvider)], EventBus::default());
    router.initialize().await;

    let started = std::time::Instant::now();
    let response = router.process_request("Plan my week", RequestMode::Chat, None).await;
    assert!(response.fell_back);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_identity_intercepted_without_providers() {
    let router = ProviderRouter::new(RouterConfig::default(), vec![], EventBus::default());

    let response = router.process_request("Are you ChatGPT?", RequestMode::Chat, None).await;
    assert!(response.intercepted);
    assert!(!response.fell_back);
    assert_eq!(response.provider, "identity");
}

#[tokio::test]
async fn test_forced_offline_provider_falls_through_to_next() {
    let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(OfflineProvider), Arc::new(HealthyProvider)];
    let router = ProviderRouter::new(RouterConfig::default(), providers, EventBus::default());
    router.initialize().await;
    assert_eq!(router.preferred(), "healthy");

    let response = router
        .process_request("Draft a reply", RequestMode::Chat, Some("offline"))
        .await;
    assert!(!response.fell_back);
    assert_eq!(response.provider, "healthy");
    assert_eq!(response.text, "served");
    assert_eq!(response.failures, vec!["offline".to_string()]);

    // unforced requests never touch the offline provider
    let response = router.process_request("Draft a reply", RequestMode::Chat, None).await;
    assert_eq!(response.provider, "healthy");
    assert!(response.failures.is_empty());
}
