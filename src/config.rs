//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::memory::MemoryConfig;
use crate::providers::RouterConfig;
use crate::reasoning::ReasoningConfig;
use crate::scheduler::{DependencyPolicy, SchedulerConfig};

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path for persisted collections
    pub db_path: PathBuf,

    /// Ollama server URL (local provider)
    pub ollama_url: String,

    /// Ollama model for generation
    pub ollama_model: String,

    /// Anthropic API key (remote provider is skipped when absent)
    pub anthropic_api_key: Option<String>,

    /// How often the status snapshot is refreshed and broadcast
    pub status_interval: Duration,

    pub memory: MemoryConfig,
    pub scheduler: SchedulerConfig,
    pub reasoning: ReasoningConfig,
    pub router: RouterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:3b".to_string(),
            anthropic_api_key: None,
            status_interval: Duration::from_secs(30),
            memory: MemoryConfig::default(),
            scheduler: SchedulerConfig::default(),
            reasoning: ReasoningConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ASSISTANT_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.ollama_model = model;
        }
        config.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        if let Some(days) = env_parse::<i64>("ASSISTANT_RETENTION_DAYS")? {
            config.memory.retention = chrono::Duration::days(days.max(1));
        }
        if let Some(days) = env_parse::<i64>("ASSISTANT_ACTION_RETENTION_DAYS")? {
            config.scheduler.history_retention = chrono::Duration::days(days.max(1));
        }
        if let Some(secs) = env_parse::<u64>("ASSISTANT_EXECUTION_INTERVAL_SECS")? {
            config.scheduler.execution_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_parse::<u64>("ASSISTANT_DEPENDENCY_TIMEOUT_SECS")? {
            config.scheduler.dependency_policy = if secs == 0 {
                DependencyPolicy::FailFast
            } else {
                DependencyPolicy::FailAfter(Duration::from_secs(secs))
            };
        }
        if let Some(secs) = env_parse::<u64>("ASSISTANT_THINK_INTERVAL_SECS")? {
            config.reasoning.think_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_parse::<u64>("ASSISTANT_STATUS_INTERVAL_SECS")? {
            config.status_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_parse::<u64>("ASSISTANT_REPROBE_INTERVAL_SECS")? {
            config.router.reprobe_interval = Duration::from_secs(secs);
        }
        if let Ok(hours) = std::env::var("ASSISTANT_ACTIVE_HOURS") {
            let (start, end) = parse_hour_range(&hours)?;
            config.reasoning.active_start_hour = start;
            config.reasoning.active_end_hour = end;
        }

        Ok(config)
    }
}

/// Parse an optional numeric environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        Err(_) => Ok(None),
    }
}

/// Parse "9-18" into (9, 18)
fn parse_hour_range(raw: &str) -> Result<(u32, u32)> {
    let (start, end) = raw
        .split_once('-')
        .with_context(|| format!("Expected START-END hours, got '{}'", raw))?;
    let start: u32 = start.trim().parse().context("Invalid start hour")?;
    let end: u32 = end.trim().parse().context("Invalid end hour")?;
    if start > 23 || end > 24 {
        anyhow::bail!("Hours out of range: '{}'", raw);
    }
    Ok((start, end))
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("assistant-core")
        .join("assistant.db")
}
