//! Assistant Context
//!
//! Owns the four core components behind `Arc`s and wires them together:
//! memory inserts wake the reasoning source, thoughts that need work become
//! scheduler actions, actions run through the provider router, and every
//! outcome lands back in memory. `process_command` is the single entry point
//! for a transport layer.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::{CoreEvent, EventBus};
use crate::memory::{MemoryKind, MemoryStore, NewMemory};
use crate::persistence::{Persistence, SqlitePersistence};
use crate::providers::{
    ClaudeConfig, ClaudeProvider, OllamaConfig, OllamaProvider, Provider, ProviderDescriptor,
    ProviderRouter, RequestMode,
};
use crate::reasoning::{self, ReasoningSource, SystemSnapshot, Thought, QUESTION_KEY, UNANSWERED_TAG};
use crate::scheduler::{Action, ActionHandler, ActionKind, Priority, Scheduler};

/// Memories handed to a provider as conversation context
const CONTEXT_MEMORIES: usize = 3;

const HELP_TEXT: &str = "Commands:
  /remember <text>           Store something in long-term memory
  /search <query>            Search memories
  /task [priority] <text>    Schedule a task (low, medium, high, critical)
  /tasks                     Show the action queue
  /cancel <id>               Cancel a planned task
  /status                    Show assistant status
  /think                     Run a reasoning pass now
  /consolidate               Merge near-duplicate memories
  /maintain                  Archive stale memories, prune old action history
  /clusters                  Show memory topics
  /providers                 Show AI providers
  /ask <provider> <text>     Ask a specific provider
  /help                      Show this help

Anything else is a conversation turn.";

/// Real counters, broadcast on the status tick
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub memory_entries: usize,
    pub archived_entries: usize,
    pub planned_actions: usize,
    pub queued_actions: usize,
    pub executing_action: Option<String>,
    pub completed_actions: usize,
    pub failed_actions: usize,
    pub preferred_provider: String,
    pub degraded: bool,
    pub providers: Vec<ProviderDescriptor>,
}

impl StatusSnapshot {
    /// Format for display
    pub fn format(&self) -> String {
        let mut s = format!("Uptime: {}s\n", self.uptime_secs);
        s.push_str(&format!(
            "Memory: {} active, {} archived\n",
            self.memory_entries, self.archived_entries
        ));
        s.push_str(&format!(
            "Actions: {} planned, {} queued, {} completed, {} failed\n",
            self.planned_actions, self.queued_actions, self.completed_actions, self.failed_actions
        ));
        if let Some(executing) = &self.executing_action {
            s.push_str(&format!("Executing: {}\n", executing));
        }
        s.push_str(&format!(
            "Provider: {}{}",
            self.preferred_provider,
            if self.degraded { " (degraded)" } else { "" }
        ));
        s
    }
}

/// Runs actions by asking the provider router
struct ProviderActionHandler {
    router: Arc<ProviderRouter>,
    memory: Arc<MemoryStore>,
}

#[async_trait]
impl ActionHandler for ProviderActionHandler {
    async fn handle(&self, action: &Action) -> Result<String> {
        let context = memory_context(&self.memory, &action.description).await;
        let input = format!("{} action: {}", action.kind.as_str(), action.description);
        let response = self
            .router
            .process_with_context(&input, context.as_deref(), RequestMode::Action, None)
            .await;
        Ok(format!("{} (via {})", response.text, response.provider))
    }
}

/// Optimization actions tidy the memory store
struct MaintenanceHandler {
    memory: Arc<MemoryStore>,
}

#[async_trait]
impl ActionHandler for MaintenanceHandler {
    async fn handle(&self, _action: &Action) -> Result<String> {
        let report = self.memory.consolidate().await;
        let archived = self.memory.maintenance().await;
        Ok(format!(
            "Merged {} groups ({} entries), archived {} stale memories",
            report.groups_merged, report.entries_removed, archived
        ))
    }
}

/// Top search hits as a context block
async fn memory_context(memory: &MemoryStore, query: &str) -> Option<String> {
    let hits = memory.search(query).await;
    if hits.is_empty() {
        return None;
    }
    let lines: Vec<String> = hits
        .iter()
        .take(CONTEXT_MEMORIES)
        .map(|hit| format!("- {}", hit.entry.preview(200)))
        .collect();
    Some(format!("Relevant memories:\n{}", lines.join("\n")))
}

/// The assistant core
pub struct Assistant {
    config: Config,
    events: EventBus,
    memory: Arc<MemoryStore>,
    reasoning: Arc<ReasoningSource>,
    scheduler: Arc<Scheduler>,
    router: Arc<ProviderRouter>,
    started_at: Instant,
}

impl Assistant {
    /// Wire the components. `providers` are ranked in the given order.
    pub fn new(
        config: Config,
        persistence: Arc<dyn Persistence>,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Self {
        let events = EventBus::default();
        let memory = Arc::new(MemoryStore::new(
            config.memory.clone(),
            persistence.clone(),
            events.clone(),
        ));
        let reasoning = Arc::new(ReasoningSource::new(config.reasoning.clone()));
        let scheduler = Arc::new(Scheduler::new(
            config.scheduler.clone(),
            memory.clone(),
            persistence,
            events.clone(),
        ));
        let router = Arc::new(ProviderRouter::new(
            config.router.clone(),
            providers,
            events.clone(),
        ));

        let provider_handler: Arc<dyn ActionHandler> = Arc::new(ProviderActionHandler {
            router: router.clone(),
            memory: memory.clone(),
        });
        for kind in [
            ActionKind::Task,
            ActionKind::Learning,
            ActionKind::Communication,
            ActionKind::Analysis,
        ] {
            scheduler.register_handler(kind, provider_handler.clone());
        }
        scheduler.register_handler(
            ActionKind::Optimization,
            Arc::new(MaintenanceHandler {
                memory: memory.clone(),
            }),
        );

        Self {
            config,
            events,
            memory,
            reasoning,
            scheduler,
            router,
            started_at: Instant::now(),
        }
    }

    /// SQLite persistence plus Ollama, and Claude when an API key is set
    pub fn from_config(config: Config) -> Result<Self> {
        let persistence = Arc::new(SqlitePersistence::open(&config.db_path)?);

        let mut providers: Vec<Arc<dyn Provider>> = vec![Arc::new(OllamaProvider::new(OllamaConfig {
            url: config.ollama_url.clone(),
            model: config.ollama_model.clone(),
            ..OllamaConfig::default()
        })?)];
        if let Some(api_key) = &config.anthropic_api_key {
            providers.push(Arc::new(ClaudeProvider::new(ClaudeConfig {
                api_key: Some(api_key.clone()),
                ..ClaudeConfig::default()
            })?));
        }

        Ok(Self::new(config, persistence, providers))
    }

    /// Restore persisted state and probe providers
    pub async fn initialize(&self) {
        let memories = self.memory.load().await;
        let actions = self.scheduler.load().await;
        self.router.initialize().await;
        info!(
            "Assistant ready: {} memories, {} actions, provider {}",
            memories,
            actions,
            self.router.preferred()
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    pub fn reasoning(&self) -> &Arc<ReasoningSource> {
        &self.reasoning
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Handle one line of user input. Always produces a reply.
    pub async fn process_command(&self, text: &str, conversation_id: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "Say something, or /help for commands.".to_string();
        }

        let Some(command) = text.strip_prefix('/') else {
            return self.converse(text, conversation_id, None).await;
        };
        let (name, args) = command
            .split_once(char::is_whitespace)
            .map(|(name, args)| (name, args.trim()))
            .unwrap_or((command, ""));
        debug!("Command /{} ({})", name, conversation_id);

        match name.to_lowercase().as_str() {
            "help" | "start" => HELP_TEXT.to_string(),
            "remember" => self.cmd_remember(args, conversation_id).await,
            "search" => self.cmd_search(args).await,
            "task" => self.cmd_task(args).await,
            "tasks" => self.cmd_tasks().await,
            "cancel" => self.cmd_cancel(args).await,
            "status" => self.status().await.format(),
            "think" => self.cmd_think().await,
            "consolidate" => {
                let report = self.memory.consolidate().await;
                if report.groups_merged == 0 {
                    "No near-duplicate memories found.".to_string()
                } else {
                    format!(
                        "Merged {} entries into {} memories.",
                        report.entries_removed, report.groups_merged
                    )
                }
            }
            "maintain" => {
                let archived = self.memory.maintenance().await;
                let pruned = self.scheduler.prune_history().await;
                format!(
                    "Archived {} stale memories, pruned {} finished actions.",
                    archived, pruned
                )
            }
            "clusters" => self.cmd_clusters().await,
            "providers" => self.cmd_providers(),
            "ask" => match args.split_once(char::is_whitespace) {
                Some((provider, question)) if !question.trim().is_empty() => {
                    self.converse(question.trim(), conversation_id, Some(provider)).await
                }
                _ => "Usage: /ask <provider> <text>".to_string(),
            },
            other => format!("Unknown command /{}. Try /help.", other),
        }
    }

    /// A conversation turn: answer with memory context, then record the exchange
    async fn converse(&self, text: &str, conversation_id: &str, force: Option<&str>) -> String {
        let context = memory_context(&self.memory, text).await;
        let response = self
            .router
            .process_with_context(text, context.as_deref(), RequestMode::Chat, force)
            .await;

        let mut record = NewMemory::new(
            MemoryKind::Interaction,
            format!("User: {}\nAssistant: {}", text, response.text),
        )
        .with_extra("conversationId", conversation_id)
        .with_extra("provider", response.provider.clone())
        .with_extra(QUESTION_KEY, text);
        if response.fell_back && text.contains('?') {
            record = record.with_tag(UNANSWERED_TAG);
        }
        self.memory.add(record).await;

        response.text
    }

    async fn cmd_remember(&self, args: &str, conversation_id: &str) -> String {
        if args.is_empty() {
            return "Usage: /remember <text>".to_string();
        }
        let id = self
            .memory
            .add(
                NewMemory::new(MemoryKind::Learning, args)
                    .with_tag("remembered")
                    .with_extra("conversationId", conversation_id),
            )
            .await;
        match self.memory.get(&id).await {
            Some(entry) => format!(
                "Remembered (importance {}, tags: {}).",
                entry.importance,
                entry.tags.join(", ")
            ),
            None => "Remembered.".to_string(),
        }
    }

    async fn cmd_search(&self, query: &str) -> String {
        if query.is_empty() {
            return "Usage: /search <query>".to_string();
        }
        let hits = self.memory.search(query).await;
        if hits.is_empty() {
            return format!("No memories match \"{}\".", query);
        }
        let mut s = format!("Found {} memories:\n", hits.len());
        for hit in hits.iter().take(10) {
            s.push_str(&format!(
                "  [{}] {} ({}): {}\n",
                hit.score,
                hit.entry.kind.as_str(),
                hit.entry.importance,
                hit.entry.preview(80)
            ));
        }
        s.trim_end().to_string()
    }

    async fn cmd_task(&self, args: &str) -> String {
        let (priority, description) = match args.split_once(char::is_whitespace) {
            Some((first, rest)) => match Priority::parse(first) {
                Some(priority) => (priority, rest.trim()),
                None => (Priority::default(), args),
            },
            None => (Priority::default(), args),
        };
        if description.is_empty() {
            return "Usage: /task [priority] <text>".to_string();
        }

        let action = Action::new(ActionKind::Task, description)
            .with_priority(priority)
            .with_source("command");
        let short_id = action.short_id().to_string();
        self.scheduler.schedule(action).await;
        format!("Scheduled task {} ({}).", short_id, priority.as_str())
    }

    async fn cmd_tasks(&self) -> String {
        let mut s = String::new();
        if let Some(action) = self.scheduler.executing().await {
            s.push_str(&format!("Executing:\n  {}\n", action.format()));
        }

        let queued = self.scheduler.queued().await;
        if !queued.is_empty() {
            s.push_str("Queued:\n");
            for action in &queued {
                s.push_str(&format!("  {}\n", action.format()));
            }
        }

        let planned = self.scheduler.planned().await;
        if !planned.is_empty() {
            s.push_str("Planned:\n");
            for action in &planned {
                s.push_str(&format!("  {}\n", action.format()));
            }
        }

        let history = self.scheduler.history(5).await;
        if !history.is_empty() {
            s.push_str("Recent:\n");
            for action in &history {
                s.push_str(&format!("  {}\n", action.format()));
            }
        }

        if s.is_empty() {
            "No tasks.".to_string()
        } else {
            s.trim_end().to_string()
        }
    }

    async fn cmd_cancel(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            return "Usage: /cancel <id>".to_string();
        }
        let Some(id) = self.scheduler.resolve_id(prefix).await else {
            return format!("No unique task matches \"{}\".", prefix);
        };
        match self.scheduler.cancel(&id).await {
            Ok(action) => format!("Cancelled: {}", action.description),
            Err(e) => e.to_string(),
        }
    }

    async fn cmd_think(&self) -> String {
        self.reasoning.reset_cooldowns();
        let thoughts = self.think_once().await;
        if thoughts.is_empty() {
            return "Nothing noteworthy right now.".to_string();
        }
        let mut s = String::from("Thoughts:\n");
        for thought in &thoughts {
            s.push_str(&format!(
                "  [{}] {}{}\n",
                thought.kind.as_str(),
                thought.content,
                if thought.action_required { " (action scheduled)" } else { "" }
            ));
        }
        s.trim_end().to_string()
    }

    async fn cmd_clusters(&self) -> String {
        let clusters = self.memory.cluster().await;
        if clusters.is_empty() {
            return "No memories yet.".to_string();
        }
        let mut s = String::from("Topics:\n");
        for cluster in clusters.iter().take(10) {
            s.push_str(&format!(
                "  {}: {} memories (max importance {})\n",
                cluster.topic,
                cluster.memory_ids.len(),
                cluster.max_importance
            ));
        }
        s.trim_end().to_string()
    }

    fn cmd_providers(&self) -> String {
        let preferred = self.router.preferred();
        let mut s = String::from("Providers:\n");
        for descriptor in self.router.descriptors() {
            s.push_str(&format!(
                "  {}. {} ({}) {}{}\n",
                descriptor.rank + 1,
                descriptor.name,
                descriptor.model,
                if descriptor.available { "available" } else { "unavailable" },
                if descriptor.name == preferred { " [preferred]" } else { "" }
            ));
        }
        s.trim_end().to_string()
    }

    async fn system_snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            active_actions: self.scheduler.stats().await.active(),
            degraded: self.router.is_degraded(),
            preferred_provider: self.router.preferred(),
            local_hour: reasoning::local_hour(),
        }
    }

    /// One reasoning pass: persist thoughts and promote those needing action
    pub async fn think_once(&self) -> Vec<Thought> {
        let recent = self
            .memory
            .recent(self.reasoning.config().window_entries)
            .await;
        let snapshot = self.system_snapshot().await;
        let thoughts = self.reasoning.think(&recent, &snapshot);

        for thought in &thoughts {
            let memory_id = self
                .memory
                .add(
                    NewMemory::new(MemoryKind::Thought, thought.content.clone())
                        .with_exact_importance(thought.importance)
                        .with_tags(thought.tags.iter().cloned())
                        .with_extra("thoughtKind", thought.kind.as_str())
                        .with_extra("detector", thought.detector.as_str()),
                )
                .await;
            self.events.emit(CoreEvent::ThoughtGenerated(thought.clone()));

            if thought.action_required {
                let action = Action::new(thought.kind.action_kind(), thought.content.clone())
                    .with_priority(Priority::from_importance(thought.importance))
                    .with_source(memory_id);
                self.scheduler.schedule(action).await;
            }
        }

        if !thoughts.is_empty() {
            info!("Reasoning pass produced {} thoughts", thoughts.len());
        }
        thoughts
    }

    /// Current counters
    pub async fn status(&self) -> StatusSnapshot {
        let stats = self.scheduler.stats().await;
        StatusSnapshot {
            timestamp: Utc::now(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            memory_entries: self.memory.len().await,
            archived_entries: self.memory.archived_count().await,
            planned_actions: stats.planned,
            queued_actions: stats.queued,
            executing_action: self.scheduler.executing().await.map(|a| a.description),
            completed_actions: stats.completed,
            failed_actions: stats.failed,
            preferred_provider: self.router.preferred(),
            degraded: self.router.is_degraded(),
            providers: self.router.descriptors(),
        }
    }

    /// Start the execution, thinking, re-probe and status loops plus the
    /// memory listener. All stop when `shutdown` flips to true.
    pub fn spawn_background(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(5);

        let this = self.clone();
        handles.push(spawn_ticker(
            "execution",
            self.config.scheduler.execution_interval,
            shutdown.clone(),
            move || {
                let this = this.clone();
                async move {
                    this.scheduler.execute_next().await;
                }
            },
        ));

        let this = self.clone();
        handles.push(spawn_ticker(
            "thinking",
            self.config.reasoning.think_interval,
            shutdown.clone(),
            move || {
                let this = this.clone();
                async move {
                    this.think_once().await;
                }
            },
        ));

        let this = self.clone();
        handles.push(spawn_ticker(
            "re-probe",
            self.config.router.reprobe_interval,
            shutdown.clone(),
            move || {
                let this = this.clone();
                async move {
                    this.router.maybe_reprobe().await;
                }
            },
        ));

        let this = self.clone();
        handles.push(spawn_ticker(
            "status",
            self.config.status_interval,
            shutdown.clone(),
            move || {
                let this = this.clone();
                async move {
                    let status = this.status().await;
                    this.events.emit(CoreEvent::StatusUpdated(status));
                }
            },
        ));

        handles.push(self.clone().spawn_memory_listener(shutdown));
        handles
    }

    /// Every non-thought insert triggers a reasoning pass
    fn spawn_memory_listener(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let mut events = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(CoreEvent::MemoryAdded(entry)) if entry.kind != MemoryKind::Thought => {
                            self.think_once().await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Memory listener lagged, skipped {} events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Memory listener shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// Run `tick` every `period` until shutdown
fn spawn_ticker<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Starting {} loop (every {:?})", name, period);

        loop {
            tokio::select! {
                _ = interval.tick() => tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("{} loop shutting down", name);
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;

    fn offline_assistant() -> Assistant {
        Assistant::new(Config::default(), Arc::new(MemoryPersistence::new()), vec![])
    }

    #[tokio::test]
    async fn test_help_and_unknown() {
        let assistant = offline_assistant();
        assert!(assistant.process_command("/help", "c1").await.contains("/remember"));
        assert!(assistant.process_command("/frobnicate", "c1").await.contains("Unknown command"));
        assert!(assistant.process_command("   ", "c1").await.contains("/help"));
    }

    #[tokio::test]
    async fn test_remember_and_search() {
        let assistant = offline_assistant();
        let reply = assistant
            .process_command("/remember The staging database password rotates monthly", "c1")
            .await;
        assert!(reply.starts_with("Remembered"));

        let reply = assistant.process_command("/search staging database", "c1").await;
        assert!(reply.contains("staging database password"));
    }

    #[tokio::test]
    async fn test_task_command_parses_priority() {
        let assistant = offline_assistant();
        let reply = assistant.process_command("/task high Renew the certificate", "c1").await;
        assert!(reply.contains("(high)"));

        let queued = assistant.scheduler().queued().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].priority, Priority::High);
        assert_eq!(queued[0].description, "Renew the certificate");

        let reply = assistant.process_command("/task Water the plants", "c1").await;
        assert!(reply.contains("(medium)"));
    }

    #[tokio::test]
    async fn test_offline_question_is_unanswered() {
        let assistant = offline_assistant();
        assistant.router().initialize().await;

        let reply = assistant.process_command("How do I rotate the logs?", "c7").await;
        assert!(reply.contains("can't reach an AI backend"));

        let interactions = assistant.memory().by_kind(MemoryKind::Interaction, 5).await;
        assert_eq!(interactions.len(), 1);
        assert!(interactions[0].has_tag(UNANSWERED_TAG));
        assert_eq!(
            interactions[0].metadata.extra.get("conversationId"),
            Some(&serde_json::json!("c7"))
        );
    }

    #[tokio::test]
    async fn test_identity_intercepted() {
        let assistant = offline_assistant();
        let reply = assistant.process_command("who are you?", "c1").await;
        assert!(reply.contains("personal assistant"));

        let interactions = assistant.memory().by_kind(MemoryKind::Interaction, 5).await;
        assert!(!interactions[0].has_tag(UNANSWERED_TAG));
    }

    #[tokio::test]
    async fn test_think_promotes_actions() {
        let assistant = offline_assistant();
        assistant.router().initialize().await;

        let reply = assistant.process_command("/think", "c1").await;
        assert!(reply.contains("[observation]"));

        let thoughts = assistant.memory().by_kind(MemoryKind::Thought, 10).await;
        assert!(!thoughts.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_command() {
        let assistant = offline_assistant();
        assistant
            .scheduler()
            .schedule(
                Action::new(ActionKind::Task, "Blocked work")
                    .depends_on("missing")
                    .with_source("test"),
            )
            .await;
        let id = assistant.scheduler().planned().await[0].id.clone();

        let reply = assistant.process_command(&format!("/cancel {}", &id[..8]), "c1").await;
        assert_eq!(reply, "Cancelled: Blocked work");
        assert!(assistant.process_command("/cancel zzzz", "c1").await.contains("No unique task"));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let assistant = offline_assistant();
        assistant.process_command("/remember buy milk", "c1").await;
        assistant.process_command("/task Tidy the inbox", "c1").await;

        let status = assistant.status().await;
        assert_eq!(status.memory_entries, 1);
        assert_eq!(status.queued_actions, 1);
        assert!(status.degraded);
        assert_eq!(status.providers.len(), 1);
        assert!(assistant.process_command("/status", "c1").await.contains("1 queued"));
    }
}
