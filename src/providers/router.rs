//! Provider Router
//!
//! Ranked fallback chain over the configured providers. Identity questions are
//! intercepted before any dispatch; everything else goes to the forced or
//! preferred provider, then to every other available provider in rank order,
//! and finally to [`LocalFallback`]. `process_request` never fails.

use futures_util::FutureExt;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::fallback::FALLBACK_NAME;
use super::{LocalFallback, ModelHint, Provider, ProviderError, RequestMode};
use crate::events::{CoreEvent, EventBus};

/// Name reported for intercepted identity questions
const IDENTITY_SOURCE: &str = "identity";

const IDENTITY_RESPONSE: &str = "I'm your personal assistant: a helper with a long-term memory \
    that runs on whichever AI backend is available. I keep track of what we talk about \
    and work through tasks in the background.";

static IDENTITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bwho\s+(made|created|built|trained|developed|programmed)\s+you\b",
        r"(?i)\bwhat\s+(model|llm|ai|language\s+model)\s+(are\s+you|is\s+this|do\s+you\s+use)\b",
        r"(?i)\bare\s+you\s+(chatgpt|gpt|claude|llama|gemini|an?\s+ai|a\s+bot|human|a\s+robot)\b",
        r"(?i)\bwhat(\s+is|'s)\s+your\s+name\b",
        r"(?i)\bwho\s+are\s+you\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Canned answer when `input` asks who or what the assistant is
fn identity_response(input: &str) -> Option<&'static str> {
    IDENTITY_PATTERNS
        .iter()
        .any(|re| re.is_match(input))
        .then_some(IDENTITY_RESPONSE)
}

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Timeout for a single availability probe
    pub probe_timeout: Duration,
    /// Minimum time between re-probes
    pub reprobe_interval: Duration,
    /// Upper bound on one provider request before falling through
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(3),
            reprobe_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Provider state as seen by callers (a copy)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub name: String,
    pub rank: usize,
    pub available: bool,
    pub model: String,
}

/// Routed response
#[derive(Debug, Clone)]
pub struct RouterResponse {
    pub text: String,
    /// Provider that produced the text (or "identity" / "local-fallback")
    pub provider: String,
    /// Answered by the identity interception
    pub intercepted: bool,
    /// Answered by the local fallback
    pub fell_back: bool,
    /// Providers that were tried and failed, in order
    pub failures: Vec<String>,
}

struct RouterState {
    descriptors: Vec<ProviderDescriptor>,
    preferred: Option<usize>,
    last_probe: Option<Instant>,
}

impl RouterState {
    /// Recompute the preferred provider. Returns true when it changed.
    fn reselect(&mut self) -> bool {
        let next = self.descriptors.iter().position(|d| d.available);
        let changed = next != self.preferred;
        self.preferred = next;
        changed
    }
}

/// Ranked provider chain with deterministic failover
pub struct ProviderRouter {
    config: RouterConfig,
    providers: Vec<Arc<dyn Provider>>,
    fallback: LocalFallback,
    state: RwLock<RouterState>,
    probing: tokio::sync::Mutex<()>,
    events: EventBus,
}

impl ProviderRouter {
    /// `providers` are ranked in the given order; the local fallback is always last
    pub fn new(config: RouterConfig, providers: Vec<Arc<dyn Provider>>, events: EventBus) -> Self {
        let descriptors = providers
            .iter()
            .enumerate()
            .map(|(rank, p)| ProviderDescriptor {
                name: p.name().to_string(),
                rank,
                available: false,
                model: p.model(),
            })
            .collect();

        Self {
            config,
            providers,
            fallback: LocalFallback::new(),
            state: RwLock::new(RouterState {
                descriptors,
                preferred: None,
                last_probe: None,
            }),
            probing: tokio::sync::Mutex::new(()),
            events,
        }
    }

    /// Probe every provider in rank order and select the preferred one
    pub async fn initialize(&self) {
        let _probe = self.probing.lock().await;
        self.probe_all().await;
    }

    /// Re-probe if the rate limit allows. Returns true when a probe ran.
    pub async fn maybe_reprobe(&self) -> bool {
        let due = match self.state.read().last_probe {
            Some(at) => at.elapsed() >= self.config.reprobe_interval,
            None => true,
        };
        if !due {
            return false;
        }

        // Another probe in flight counts as this one
        let Ok(_probe) = self.probing.try_lock() else {
            return false;
        };
        self.probe_all().await;
        true
    }

    async fn probe_all(&self) {
        let mut results = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let available = tokio::time::timeout(self.config.probe_timeout, provider.check_connection())
                .await
                .unwrap_or(false);
            if available {
                info!("Provider {} available", provider.name());
            } else {
                warn!("Provider {} unavailable", provider.name());
            }
            results.push(available);
        }

        let changed = {
            let mut state = self.state.write();
            for (descriptor, available) in state.descriptors.iter_mut().zip(results) {
                descriptor.available = available;
            }
            state.last_probe = Some(Instant::now());
            state.reselect()
        };

        let preferred = self.preferred();
        info!("Preferred provider: {}", preferred);
        if changed {
            self.events.emit(CoreEvent::ProviderChanged { preferred });
        }
    }

    /// Route a request through the chain. Never fails.
    pub async fn process_request(
        &self,
        input: &str,
        mode: RequestMode,
        force_provider: Option<&str>,
    ) -> RouterResponse {
        self.process_with_context(input, None, mode, force_provider).await
    }

    /// Like [`process_request`](Self::process_request), with background context
    /// prepended to the prompt. Interception and model hints only look at `input`.
    pub async fn process_with_context(
        &self,
        input: &str,
        context: Option<&str>,
        mode: RequestMode,
        force_provider: Option<&str>,
    ) -> RouterResponse {
        if let Some(canned) = identity_response(input) {
            debug!("Identity question intercepted");
            return RouterResponse {
                text: canned.to_string(),
                provider: IDENTITY_SOURCE.to_string(),
                intercepted: true,
                fell_back: false,
                failures: vec![],
            };
        }

        let hint = ModelHint::for_request(mode, input);
        let prompt = match context {
            Some(context) => mode.build_prompt(&format!("{}\n\n{}", context, input)),
            None => mode.build_prompt(input),
        };
        let mut failures = Vec::new();

        for index in self.dispatch_order(force_provider) {
            let provider = &self.providers[index];
            match self.dispatch(provider.as_ref(), &prompt, hint).await {
                Ok(text) => {
                    debug!("{} request served by {}", mode.as_str(), provider.name());
                    return RouterResponse {
                        text,
                        provider: provider.name().to_string(),
                        intercepted: false,
                        fell_back: false,
                        failures,
                    };
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    failures.push(provider.name().to_string());
                    self.mark_unavailable(index);
                }
            }
        }

        RouterResponse {
            text: self.fallback.respond(input, mode),
            provider: self.fallback.name().to_string(),
            intercepted: false,
            fell_back: true,
            failures,
        }
    }

    /// One provider call with timeout; panics count as failures
    async fn dispatch(
        &self,
        provider: &dyn Provider,
        prompt: &str,
        hint: ModelHint,
    ) -> Result<String, ProviderError> {
        let call = AssertUnwindSafe(provider.generate(prompt, hint)).catch_unwind();
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProviderError::Panicked),
            Err(_) => Err(ProviderError::Timeout(self.config.request_timeout)),
        }
    }

    /// Forced (or preferred) provider first, then every other available one by rank
    fn dispatch_order(&self, force_provider: Option<&str>) -> Vec<usize> {
        let state = self.state.read();

        let start = match force_provider {
            Some(name) if name == FALLBACK_NAME => return vec![],
            Some(name) => match state.descriptors.iter().position(|d| d.name == name) {
                Some(index) => Some(index),
                None => {
                    warn!("Unknown provider '{}', using preferred", name);
                    state.preferred
                }
            },
            None => state.preferred,
        };

        let mut order: Vec<usize> = start.into_iter().collect();
        order.extend(
            state
                .descriptors
                .iter()
                .enumerate()
                .filter(|(index, d)| d.available && Some(*index) != start)
                .map(|(index, _)| index),
        );
        order
    }

    /// Demote a provider until the next probe
    fn mark_unavailable(&self, index: usize) {
        let changed = {
            let mut state = self.state.write();
            if let Some(descriptor) = state.descriptors.get_mut(index) {
                descriptor.available = false;
            }
            state.reselect()
        };
        if changed {
            self.events.emit(CoreEvent::ProviderChanged {
                preferred: self.preferred(),
            });
        }
    }

    /// Copies of the provider descriptors, fallback last
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let state = self.state.read();
        let mut descriptors = state.descriptors.clone();
        descriptors.push(ProviderDescriptor {
            name: FALLBACK_NAME.to_string(),
            rank: state.descriptors.len(),
            available: true,
            model: "heuristic".to_string(),
        });
        descriptors
    }

    /// Name of the preferred provider
    pub fn preferred(&self) -> String {
        let state = self.state.read();
        state
            .preferred
            .and_then(|index| state.descriptors.get(index))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    /// True when a real provider (not the local fallback) is available
    pub fn preferred_available(&self) -> bool {
        self.state.read().preferred.is_some()
    }

    /// True when the top-ranked provider is down (or none is configured)
    pub fn is_degraded(&self) -> bool {
        let state = self.state.read();
        !state.descriptors.first().map(|d| d.available).unwrap_or(false)
    }

    /// Seconds since the last probe, if any
    pub fn last_probe_age(&self) -> Option<Duration> {
        self.state.read().last_probe.map(|at| at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        name: &'static str,
        reachable: bool,
        reply: Option<&'static str>,
        probes: AtomicUsize,
    }

    impl StubProvider {
        fn new(name: &'static str, reachable: bool, reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reachable,
                reply,
                probes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn model(&self) -> String {
            "stub".to_string()
        }

        async fn check_connection(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.reachable
        }

        async fn generate(&self, _prompt: &str, _hint: ModelHint) -> Result<String, ProviderError> {
            self.reply
                .map(str::to_string)
                .ok_or_else(|| ProviderError::Request("stub failure".to_string()))
        }
    }

    fn router(providers: Vec<Arc<dyn Provider>>) -> ProviderRouter {
        ProviderRouter::new(RouterConfig::default(), providers, EventBus::default())
    }

    #[test]
    fn test_identity_patterns() {
        assert!(identity_response("Who made you?").is_some());
        assert!(identity_response("are you ChatGPT").is_some());
        assert!(identity_response("what's your name").is_some());
        assert!(identity_response("What model are you running?").is_some());
        assert!(identity_response("who made this cake").is_none());
        assert!(identity_response("How do I debug this?").is_none());
    }

    #[tokio::test]
    async fn test_preferred_is_highest_ranked_available() {
        let router = router(vec![
            StubProvider::new("local", false, None),
            StubProvider::new("remote", true, Some("remote says hi")),
        ]);
        router.initialize().await;

        assert_eq!(router.preferred(), "remote");
        assert!(router.is_degraded());

        let response = router.process_request("hello", RequestMode::Chat, None).await;
        assert_eq!(response.provider, "remote");
        assert_eq!(response.text, "remote says hi");
        assert!(!response.fell_back);
    }

    #[tokio::test]
    async fn test_failure_falls_through_and_demotes() {
        let router = router(vec![
            StubProvider::new("local", true, None),
            StubProvider::new("remote", true, Some("from remote")),
        ]);
        router.initialize().await;
        assert_eq!(router.preferred(), "local");

        let response = router.process_request("hello", RequestMode::Chat, None).await;
        assert_eq!(response.provider, "remote");
        assert_eq!(response.failures, vec!["local".to_string()]);
        assert_eq!(router.preferred(), "remote");
    }

    #[tokio::test]
    async fn test_identity_runs_before_dispatch() {
        let router = router(vec![StubProvider::new("local", true, Some("provider text"))]);
        router.initialize().await;

        let response = router.process_request("Who created you?", RequestMode::Chat, Some("local")).await;
        assert!(response.intercepted);
        assert_eq!(response.text, IDENTITY_RESPONSE);
    }

    #[tokio::test]
    async fn test_force_provider() {
        let router = router(vec![
            StubProvider::new("local", true, Some("local text")),
            StubProvider::new("remote", true, Some("remote text")),
        ]);
        router.initialize().await;

        let response = router.process_request("hi", RequestMode::Chat, Some("remote")).await;
        assert_eq!(response.provider, "remote");

        let response = router.process_request("hi", RequestMode::Chat, Some(FALLBACK_NAME)).await;
        assert!(response.fell_back);

        let response = router.process_request("hi", RequestMode::Chat, Some("nope")).await;
        assert_eq!(response.provider, "local");
    }

    #[tokio::test]
    async fn test_reprobe_rate_limited() {
        let stub = StubProvider::new("local", true, Some("ok"));
        let router = router(vec![stub.clone()]);

        router.initialize().await;
        assert_eq!(stub.probes.load(Ordering::SeqCst), 1);

        assert!(!router.maybe_reprobe().await);
        assert_eq!(stub.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_descriptors_include_fallback() {
        let router = router(vec![StubProvider::new("local", false, None)]);
        router.initialize().await;

        let descriptors = router.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert!(!descriptors[0].available);
        assert_eq!(descriptors[1].name, FALLBACK_NAME);
        assert!(descriptors[1].available);
        assert_eq!(router.preferred(), FALLBACK_NAME);
    }
}
