//! Action Scheduler
//!
//! Priority + dependency aware queue with single-concurrency execution:
//! - Planned list, stable-sorted by priority (desc) then creation time (FIFO)
//! - Ready actions move to the tail of the execution queue
//! - One action executes at a time (atomic mutex flag, cleared by a drop guard)
//! - Handlers registered per action kind
//! - Every start, completion and failure is recorded in the memory store

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::events::{CoreEvent, EventBus};
use crate::memory::{MemoryKind, MemoryStore, NewMemory};
use crate::persistence::{Persistence, ACTIONS};

/// Importance of the memory recorded when an action fails
const FAILURE_IMPORTANCE: u8 = 8;

/// Kind of autonomous work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Task,
    Learning,
    Optimization,
    Communication,
    Analysis,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Task,
        ActionKind::Learning,
        ActionKind::Optimization,
        ActionKind::Communication,
        ActionKind::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Task => "task",
            ActionKind::Learning => "learning",
            ActionKind::Optimization => "optimization",
            ActionKind::Communication => "communication",
            ActionKind::Analysis => "analysis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "task" => Some(ActionKind::Task),
            "learning" => Some(ActionKind::Learning),
            "optimization" => Some(ActionKind::Optimization),
            "communication" => Some(ActionKind::Communication),
            "analysis" => Some(ActionKind::Analysis),
            _ => None,
        }
    }

    /// Memory kind used when recording outcomes
    fn memory_kind(&self) -> MemoryKind {
        match self {
            ActionKind::Task | ActionKind::Communication => MemoryKind::Task,
            ActionKind::Learning | ActionKind::Analysis => MemoryKind::Learning,
            ActionKind::Optimization => MemoryKind::System,
        }
    }
}

/// Priority level for actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" | "normal" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "critical" | "urgent" => Some(Priority::Critical),
            _ => None,
        }
    }

    /// Derive from an importance score (1-10)
    pub fn from_importance(importance: u8) -> Self {
        match importance {
            9..=u8::MAX => Priority::Critical,
            7..=8 => Priority::High,
            5..=6 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// Action lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Planned,
    Executing,
    Completed,
    Failed,
    /// Reported on cancellation only; cancelled actions are not kept
    Cancelled,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Planned => "planned",
            ActionStatus::Executing => "executing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
            ActionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Completed | ActionStatus::Failed | ActionStatus::Cancelled
        )
    }
}

/// A schedulable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: ActionStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Not-before timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// What produced the action (a thought id, "command", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            description: description.into(),
            priority: Priority::default(),
            status: ActionStatus::Planned,
            dependencies: vec![],
            created_at: Utc::now(),
            scheduled_for: None,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            source: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }

    /// One-line listing
    pub fn format(&self) -> String {
        let icon = match self.status {
            ActionStatus::Planned => "⏳",
            ActionStatus::Executing => "▶️",
            ActionStatus::Completed => "✅",
            ActionStatus::Failed => "❌",
            ActionStatus::Cancelled => "🚫",
        };
        format!(
            "{} [{}] {} {} - {}",
            icon,
            self.short_id(),
            self.priority.as_str(),
            self.kind.as_str(),
            self.description
        )
    }
}

/// What to do with an action whose dependency is missing, cancelled or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyPolicy {
    /// Stay planned forever; orphaned work never runs
    #[default]
    Block,
    /// Fail once dependencies are still unresolved this long after creation
    FailAfter(Duration),
    /// Fail as soon as a dependency is missing or failed
    FailFast,
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Execution loop tick
    pub execution_interval: Duration,
    pub dependency_policy: DependencyPolicy,
    /// Finished actions older than this are dropped from history
    pub history_retention: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            execution_interval: Duration::from_secs(5),
            dependency_policy: DependencyPolicy::Block,
            history_retention: chrono::Duration::days(7),
        }
    }
}

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Action not found: {0}")]
    NotFound(String),

    #[error("Action {id} is {status} and can no longer be cancelled")]
    NotCancellable { id: String, status: &'static str },
}

/// Executes actions of one kind
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action and return a short result description
    async fn handle(&self, action: &Action) -> Result<String>;
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub planned: usize,
    pub queued: usize,
    pub executing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl SchedulerStats {
    /// Planned, queued or executing
    pub fn active(&self) -> usize {
        self.planned + self.queued + self.executing
    }
}

enum Readiness {
    Ready,
    Waiting,
    Orphaned(String),
}

#[derive(Default)]
struct SchedulerState {
    planned: Vec<Action>,
    queue: VecDeque<Action>,
    executing: Option<Action>,
    finished: Vec<Action>,
}

impl SchedulerState {
    /// Status of every known action, keyed by id
    fn statuses(&self) -> HashMap<String, ActionStatus> {
        self.all().map(|a| (a.id.clone(), a.status)).collect()
    }

    /// Drop finished actions that ended before `cutoff`, unless an active
    /// action still depends on them
    fn prune_finished(&mut self, cutoff: DateTime<Utc>) -> usize {
        let referenced: HashSet<String> = self
            .planned
            .iter()
            .chain(self.queue.iter())
            .flat_map(|a| a.dependencies.iter().cloned())
            .collect();
        let before = self.finished.len();
        self.finished.retain(|a| {
            referenced.contains(&a.id) || a.finished_at.map_or(true, |at| at >= cutoff)
        });
        before - self.finished.len()
    }

    fn status_of(&self, id: &str) -> Option<ActionStatus> {
        if self.planned.iter().chain(self.queue.iter()).any(|a| a.id == id) {
            return Some(ActionStatus::Planned);
        }
        if self.executing.as_ref().is_some_and(|a| a.id == id) {
            return Some(ActionStatus::Executing);
        }
        self.finished.iter().find(|a| a.id == id).map(|a| a.status)
    }

    fn all(&self) -> impl Iterator<Item = &Action> {
        self.planned
            .iter()
            .chain(self.queue.iter())
            .chain(self.executing.iter())
            .chain(self.finished.iter())
    }
}

/// Clears the execution flag on every exit path
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The action scheduler
pub struct Scheduler {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    handlers: parking_lot::RwLock<HashMap<ActionKind, Arc<dyn ActionHandler>>>,
    running: AtomicBool,
    memory: Arc<MemoryStore>,
    persistence: Arc<dyn Persistence>,
    events: EventBus,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        memory: Arc<MemoryStore>,
        persistence: Arc<dyn Persistence>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(SchedulerState::default()),
            handlers: parking_lot::RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            memory,
            persistence,
            events,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register (or replace) the handler for a kind
    pub fn register_handler(&self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.write().insert(kind, handler);
        debug!("Handler registered for {} actions", kind.as_str());
    }

    pub fn has_handler(&self, kind: ActionKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }

    /// Restore actions from persistence. Actions caught mid-execution are failed.
    pub async fn load(&self) -> usize {
        let records = match self.persistence.load(ACTIONS).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Treating '{}' as empty: {:#}", ACTIONS, e);
                self.memory
                    .add(
                        NewMemory::new(
                            MemoryKind::System,
                            format!("Load error: collection '{}' was unreadable and reset ({:#})", ACTIONS, e),
                        )
                        .with_tag("persistence"),
                    )
                    .await;
                vec![]
            }
        };

        let mut interrupted = 0;
        let count = {
            let mut state = self.state.lock().await;
            *state = SchedulerState::default();

            for record in records {
                let mut action: Action = match serde_json::from_value(record) {
                    Ok(action) => action,
                    Err(e) => {
                        warn!("Skipping malformed action record: {}", e);
                        continue;
                    }
                };
                match action.status {
                    ActionStatus::Planned => state.planned.push(action),
                    ActionStatus::Executing => {
                        action.status = ActionStatus::Failed;
                        action.error = Some("interrupted by restart".to_string());
                        action.finished_at = Some(Utc::now());
                        state.finished.push(action);
                        interrupted += 1;
                    }
                    ActionStatus::Completed | ActionStatus::Failed => state.finished.push(action),
                    ActionStatus::Cancelled => {}
                }
            }

            let pruned = state.prune_finished(Utc::now() - self.config.history_retention);
            if interrupted > 0 || pruned > 0 {
                self.persist(&state).await;
            }
            state.all().count()
        };

        info!("Scheduler loaded {} actions ({} interrupted)", count, interrupted);
        self.prioritize().await;
        count
    }

    /// Add an action to the planned list and re-prioritize
    pub async fn schedule(&self, mut action: Action) -> String {
        action.status = ActionStatus::Planned;
        let id = action.id.clone();

        {
            let mut state = self.state.lock().await;
            state.planned.push(action.clone());
            self.persist(&state).await;
        }

        info!(
            "Scheduled {} action {} ({})",
            action.kind.as_str(),
            action.short_id(),
            action.priority.as_str()
        );
        self.events.emit(CoreEvent::TaskCreated(action));
        self.prioritize().await;
        id
    }

    /// Sort the planned list and move ready actions to the execution queue.
    /// Returns how many actions were queued.
    pub async fn prioritize(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        // sort_by is stable: equal rank and timestamp keep insertion order
        state.planned.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        // Snapshot before the planned list is moved out, so dependencies
        // still in it resolve as pending rather than missing
        let statuses = state.statuses();
        let planned = std::mem::take(&mut state.planned);
        let mut waiting = Vec::with_capacity(planned.len());
        let mut ready = Vec::new();
        let mut orphaned = Vec::new();

        for action in planned {
            match self.readiness(&statuses, &action, now) {
                Readiness::Ready => ready.push(action),
                Readiness::Waiting => waiting.push(action),
                Readiness::Orphaned(reason) => orphaned.push((action, reason)),
            }
        }
        state.planned = waiting;

        let promoted = ready.len();
        for action in ready {
            debug!("Queued action {}", action.short_id());
            state.queue.push_back(action);
        }

        let mut failed = Vec::with_capacity(orphaned.len());
        for (mut action, reason) in orphaned {
            action.status = ActionStatus::Failed;
            action.error = Some(reason);
            action.finished_at = Some(now);
            state.finished.push(action.clone());
            failed.push(action);
        }

        if promoted > 0 || !failed.is_empty() {
            self.persist(&state).await;
        }
        drop(state);

        for action in failed {
            warn!(
                "Action {} failed on dependencies: {}",
                action.short_id(),
                action.error.as_deref().unwrap_or_default()
            );
            self.record_failure(&action).await;
            self.events.emit(CoreEvent::TaskUpdated(action));
        }

        promoted
    }

    fn readiness(
        &self,
        statuses: &HashMap<String, ActionStatus>,
        action: &Action,
        now: DateTime<Utc>,
    ) -> Readiness {
        let mut unresolved = Vec::new();
        let mut pending = false;

        for dependency in &action.dependencies {
            match statuses.get(dependency).copied() {
                Some(ActionStatus::Completed) => {}
                Some(ActionStatus::Failed) => unresolved.push(format!("{} failed", dependency)),
                Some(_) => pending = true,
                None => unresolved.push(format!("{} not found", dependency)),
            }
        }

        if unresolved.is_empty() && !pending {
            return match action.scheduled_for {
                Some(at) if at > now => Readiness::Waiting,
                _ => Readiness::Ready,
            };
        }

        match self.config.dependency_policy {
            DependencyPolicy::Block => Readiness::Waiting,
            DependencyPolicy::FailFast if !unresolved.is_empty() => {
                Readiness::Orphaned(format!("Dependency {}", unresolved.join(", ")))
            }
            DependencyPolicy::FailFast => Readiness::Waiting,
            DependencyPolicy::FailAfter(timeout) => {
                let waited = (now - action.created_at).to_std().unwrap_or_default();
                if waited >= timeout {
                    Readiness::Orphaned(format!("Dependencies unresolved after {:?}", timeout))
                } else {
                    Readiness::Waiting
                }
            }
        }
    }

    /// One tick of the execution loop. Returns the finished action, if one ran.
    pub async fn execute_next(&self) -> Option<Action> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Execution already in progress, skipping tick");
            return None;
        }
        let guard = RunningGuard(&self.running);

        self.prioritize().await;

        let mut action = {
            let mut state = self.state.lock().await;
            let mut action = state.queue.pop_front()?;
            action.status = ActionStatus::Executing;
            action.started_at = Some(Utc::now());
            state.executing = Some(action.clone());
            self.persist(&state).await;
            action
        };

        info!("Executing {} action {}", action.kind.as_str(), action.short_id());
        self.events.emit(CoreEvent::TaskUpdated(action.clone()));
        self.memory
            .add(
                NewMemory::new(
                    action.kind.memory_kind(),
                    format!("Started {} action: {}", action.kind.as_str(), action.description),
                )
                .with_tags(["action", action.kind.as_str()])
                .with_extra("actionId", action.id.clone()),
            )
            .await;

        let handler = self.handlers.read().get(&action.kind).cloned();
        let outcome = match handler {
            None => Err(format!("No handler registered for {} actions", action.kind.as_str())),
            Some(handler) => match AssertUnwindSafe(handler.handle(&action)).catch_unwind().await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(_) => Err("handler panicked".to_string()),
            },
        };

        action.finished_at = Some(Utc::now());
        match outcome {
            Ok(result) => {
                action.status = ActionStatus::Completed;
                action.result = Some(result);
            }
            Err(error) => {
                action.status = ActionStatus::Failed;
                action.error = Some(error);
            }
        }

        {
            let mut state = self.state.lock().await;
            state.executing = None;
            state.finished.push(action.clone());
            state.prune_finished(Utc::now() - self.config.history_retention);
            self.persist(&state).await;
        }

        if action.status == ActionStatus::Completed {
            info!("Action {} completed", action.short_id());
            self.memory
                .add(
                    NewMemory::new(
                        action.kind.memory_kind(),
                        format!(
                            "Completed {} action: {}\nResult: {}",
                            action.kind.as_str(),
                            action.description,
                            action.result.as_deref().unwrap_or_default()
                        ),
                    )
                    .with_tags(["action", action.kind.as_str(), "completed"])
                    .with_extra("actionId", action.id.clone()),
                )
                .await;
        } else {
            warn!(
                "Action {} failed: {}",
                action.short_id(),
                action.error.as_deref().unwrap_or_default()
            );
            self.record_failure(&action).await;
        }
        self.events.emit(CoreEvent::TaskUpdated(action.clone()));

        drop(guard);
        // Dependents of this action may be ready now
        self.prioritize().await;
        Some(action)
    }

    async fn record_failure(&self, action: &Action) {
        self.memory
            .add(
                NewMemory::new(
                    MemoryKind::System,
                    format!(
                        "Action failed: {} ({})",
                        action.description,
                        action.error.as_deref().unwrap_or("unknown error")
                    ),
                )
                .with_exact_importance(FAILURE_IMPORTANCE)
                .with_tags(["action", action.kind.as_str(), "failed"])
                .with_extra("actionId", action.id.clone()),
            )
            .await;
    }

    /// Cancel a planned action (in the planned list or still waiting in the queue)
    pub async fn cancel(&self, id: &str) -> Result<Action, SchedulerError> {
        let mut state = self.state.lock().await;

        let removed = if let Some(pos) = state.planned.iter().position(|a| a.id == id) {
            Some(state.planned.remove(pos))
        } else if let Some(pos) = state.queue.iter().position(|a| a.id == id) {
            state.queue.remove(pos)
        } else {
            None
        };

        let Some(mut action) = removed else {
            return match state.status_of(id) {
                Some(status) => Err(SchedulerError::NotCancellable {
                    id: id.to_string(),
                    status: status.as_str(),
                }),
                None => Err(SchedulerError::NotFound(id.to_string())),
            };
        };

        self.persist(&state).await;
        drop(state);

        action.status = ActionStatus::Cancelled;
        action.finished_at = Some(Utc::now());
        info!("Cancelled action {}", action.short_id());
        self.events.emit(CoreEvent::TaskUpdated(action.clone()));
        Ok(action)
    }

    pub async fn get(&self, id: &str) -> Option<Action> {
        self.state.lock().await.all().find(|a| a.id == id).cloned()
    }

    /// Resolve a full id from a unique prefix
    pub async fn resolve_id(&self, prefix: &str) -> Option<String> {
        let state = self.state.lock().await;
        let mut matches = state.all().filter(|a| a.id.starts_with(prefix));
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first.id.clone()),
        }
    }

    /// Planned actions in priority order
    pub async fn planned(&self) -> Vec<Action> {
        self.state.lock().await.planned.clone()
    }

    /// Execution queue, head first
    pub async fn queued(&self) -> Vec<Action> {
        self.state.lock().await.queue.iter().cloned().collect()
    }

    pub async fn executing(&self) -> Option<Action> {
        self.state.lock().await.executing.clone()
    }

    /// Finished actions, newest first
    pub async fn history(&self, limit: usize) -> Vec<Action> {
        self.state
            .lock()
            .await
            .finished
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> SchedulerStats {
        let state = self.state.lock().await;
        SchedulerStats {
            planned: state.planned.len(),
            queued: state.queue.len(),
            executing: usize::from(state.executing.is_some()),
            completed: state
                .finished
                .iter()
                .filter(|a| a.status == ActionStatus::Completed)
                .count(),
            failed: state
                .finished
                .iter()
                .filter(|a| a.status == ActionStatus::Failed)
                .count(),
        }
    }

    /// Drop finished actions past the history retention window
    pub async fn prune_history(&self) -> usize {
        let mut state = self.state.lock().await;
        let pruned = state.prune_finished(Utc::now() - self.config.history_retention);
        if pruned > 0 {
            self.persist(&state).await;
            debug!("Pruned {} finished actions", pruned);
        }
        pruned
    }

    /// True while an execution tick is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn persist(&self, state: &SchedulerState) {
        let records: Vec<Value> = state
            .all()
            .filter_map(|a| serde_json::to_value(a).ok())
            .collect();
        if let Err(e) = self.persistence.save(ACTIONS, records).await {
            warn!("Failed to persist actions: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConfig;
    use crate::persistence::MemoryPersistence;

    struct EchoHandler;

    #[async_trait]
    impl ActionHandler for EchoHandler {
        async fn handle(&self, action: &Action) -> Result<String> {
            Ok(format!("done: {}", action.description))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ActionHandler for FailingHandler {
        async fn handle(&self, _action: &Action) -> Result<String> {
            anyhow::bail!("disk full")
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl ActionHandler for PanickingHandler {
        async fn handle(&self, _action: &Action) -> Result<String> {
            panic!("handler bug")
        }
    }

    fn scheduler_with(policy: DependencyPolicy) -> (Scheduler, Arc<MemoryStore>) {
        let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
        let events = EventBus::default();
        let memory = Arc::new(MemoryStore::new(
            MemoryConfig::default(),
            persistence.clone(),
            events.clone(),
        ));
        let scheduler = Scheduler::new(
            SchedulerConfig {
                dependency_policy: policy,
                ..SchedulerConfig::default()
            },
            memory.clone(),
            persistence,
            events,
        );
        scheduler.register_handler(ActionKind::Task, Arc::new(EchoHandler));
        (scheduler, memory)
    }

    #[test]
    fn test_priority_from_importance() {
        assert_eq!(Priority::from_importance(10), Priority::Critical);
        assert_eq!(Priority::from_importance(7), Priority::High);
        assert_eq!(Priority::from_importance(5), Priority::Medium);
        assert_eq!(Priority::from_importance(2), Priority::Low);
        assert!(Priority::Critical > Priority::High);
    }

    #[tokio::test]
    async fn test_priority_then_fifo_order() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        let later = Utc::now() + chrono::Duration::hours(1);

        // Keep everything planned so the sort order is observable
        let low = scheduler.schedule(Action::new(ActionKind::Task, "low").with_priority(Priority::Low).scheduled_for(later)).await;
        let first_high = scheduler.schedule(Action::new(ActionKind::Task, "high 1").with_priority(Priority::High).scheduled_for(later)).await;
        let second_high = scheduler.schedule(Action::new(ActionKind::Task, "high 2").with_priority(Priority::High).scheduled_for(later)).await;
        let critical = scheduler.schedule(Action::new(ActionKind::Task, "critical").with_priority(Priority::Critical).scheduled_for(later)).await;

        let order: Vec<String> = scheduler.planned().await.into_iter().map(|a| a.id).collect();
        assert_eq!(order, vec![critical, first_high, second_high, low]);
        assert!(scheduler.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_execute_success_records_memory() {
        let (scheduler, memory) = scheduler_with(DependencyPolicy::Block);
        let id = scheduler.schedule(Action::new(ActionKind::Task, "water plants")).await;
        assert_eq!(scheduler.queued().await.len(), 1);

        let finished = scheduler.execute_next().await.unwrap();
        assert_eq!(finished.id, id);
        assert_eq!(finished.status, ActionStatus::Completed);
        assert_eq!(finished.result.as_deref(), Some("done: water plants"));
        assert!(!scheduler.is_running());

        // start + completion
        assert_eq!(memory.len().await, 2);
        assert!(scheduler.execute_next().await.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_fails_action() {
        let (scheduler, memory) = scheduler_with(DependencyPolicy::Block);
        scheduler.register_handler(ActionKind::Analysis, Arc::new(FailingHandler));

        scheduler.schedule(Action::new(ActionKind::Analysis, "check logs")).await;
        let finished = scheduler.execute_next().await.unwrap();

        assert_eq!(finished.status, ActionStatus::Failed);
        assert!(finished.error.as_deref().unwrap().contains("disk full"));

        let failures = memory.by_kind(MemoryKind::System, 10).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].importance, 8);
        assert!(failures[0].content.contains("disk full"));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_handler_panic_fails_action() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        scheduler.register_handler(ActionKind::Learning, Arc::new(PanickingHandler));

        scheduler.schedule(Action::new(ActionKind::Learning, "study")).await;
        let finished = scheduler.execute_next().await.unwrap();

        assert_eq!(finished.status, ActionStatus::Failed);
        assert!(!scheduler.is_running());

        // loop keeps working afterwards
        scheduler.schedule(Action::new(ActionKind::Task, "next")).await;
        assert_eq!(scheduler.execute_next().await.unwrap().status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_kind_fails() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        scheduler.schedule(Action::new(ActionKind::Communication, "email bob")).await;

        let finished = scheduler.execute_next().await.unwrap();
        assert_eq!(finished.status, ActionStatus::Failed);
        assert!(finished.error.unwrap().contains("No handler"));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        let queued = scheduler.schedule(Action::new(ActionKind::Task, "queued")).await;
        let planned = scheduler
            .schedule(Action::new(ActionKind::Task, "blocked").depends_on("missing"))
            .await;

        assert_eq!(scheduler.cancel(&planned).await.unwrap().status, ActionStatus::Cancelled);
        assert!(scheduler.get(&planned).await.is_none());
        assert!(matches!(scheduler.cancel(&planned).await, Err(SchedulerError::NotFound(_))));

        scheduler.cancel(&queued).await.unwrap();
        assert!(scheduler.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_finished_rejected() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        let id = scheduler.schedule(Action::new(ActionKind::Task, "quick")).await;
        scheduler.execute_next().await;

        match scheduler.cancel(&id).await {
            Err(SchedulerError::NotCancellable { status, .. }) => assert_eq!(status, "completed"),
            other => panic!("expected NotCancellable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_dependency_blocks() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        let id = scheduler
            .schedule(Action::new(ActionKind::Task, "orphan").depends_on("does-not-exist"))
            .await;

        assert!(scheduler.execute_next().await.is_none());
        assert_eq!(scheduler.get(&id).await.unwrap().status, ActionStatus::Planned);
        assert_eq!(scheduler.stats().await.planned, 1);
    }

    #[tokio::test]
    async fn test_fail_fast_policy() {
        let (scheduler, memory) = scheduler_with(DependencyPolicy::FailFast);
        let id = scheduler
            .schedule(Action::new(ActionKind::Task, "orphan").depends_on("does-not-exist"))
            .await;

        let action = scheduler.get(&id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        assert!(action.error.unwrap().contains("not found"));
        assert_eq!(memory.by_kind(MemoryKind::System, 5).await.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_waits_on_planned_dependency() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::FailFast);
        let first = scheduler
            .schedule(Action::new(ActionKind::Task, "later").scheduled_for(Utc::now() + chrono::Duration::hours(1)))
            .await;
        let second = scheduler
            .schedule(Action::new(ActionKind::Task, "after later").depends_on(&first))
            .await;

        scheduler.prioritize().await;
        assert_eq!(scheduler.get(&first).await.unwrap().status, ActionStatus::Planned);
        let waiting = scheduler.get(&second).await.unwrap();
        assert_eq!(waiting.status, ActionStatus::Planned);
        assert!(waiting.error.is_none());
    }

    #[tokio::test]
    async fn test_fail_fast_reload_keeps_dependency_chain() {
        let persistence = Arc::new(MemoryPersistence::new());
        let first = Action::new(ActionKind::Task, "first");
        let second = Action::new(ActionKind::Task, "second").depends_on(&first.id);
        persistence
            .save(
                ACTIONS,
                vec![
                    serde_json::to_value(&first).unwrap(),
                    serde_json::to_value(&second).unwrap(),
                ],
            )
            .await
            .unwrap();

        let events = EventBus::default();
        let memory = Arc::new(MemoryStore::new(MemoryConfig::default(), persistence.clone(), events.clone()));
        let scheduler = Scheduler::new(
            SchedulerConfig {
                dependency_policy: DependencyPolicy::FailFast,
                ..SchedulerConfig::default()
            },
            memory,
            persistence,
            events,
        );
        scheduler.register_handler(ActionKind::Task, Arc::new(EchoHandler));

        assert_eq!(scheduler.load().await, 2);
        assert_eq!(scheduler.get(&second.id).await.unwrap().status, ActionStatus::Planned);

        assert_eq!(scheduler.execute_next().await.unwrap().id, first.id);
        let finished = scheduler.execute_next().await.unwrap();
        assert_eq!(finished.id, second.id);
        assert_eq!(finished.status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn test_old_history_pruned_on_load() {
        let persistence = Arc::new(MemoryPersistence::new());
        let long_ago = Utc::now() - chrono::Duration::days(30);

        let mut old = Action::new(ActionKind::Task, "old");
        old.status = ActionStatus::Completed;
        old.finished_at = Some(long_ago);
        let mut kept_for_dependent = Action::new(ActionKind::Task, "old but needed");
        kept_for_dependent.status = ActionStatus::Completed;
        kept_for_dependent.finished_at = Some(long_ago);
        let dependent = Action::new(ActionKind::Task, "dependent").depends_on(&kept_for_dependent.id);
        let mut recent = Action::new(ActionKind::Task, "recent");
        recent.status = ActionStatus::Failed;
        recent.finished_at = Some(Utc::now());

        persistence
            .save(
                ACTIONS,
                [&old, &kept_for_dependent, &dependent, &recent]
                    .iter()
                    .map(|a| serde_json::to_value(a).unwrap())
                    .collect(),
            )
            .await
            .unwrap();

        let events = EventBus::default();
        let memory = Arc::new(MemoryStore::new(MemoryConfig::default(), persistence.clone(), events.clone()));
        let scheduler = Scheduler::new(SchedulerConfig::default(), memory, persistence.clone(), events);

        assert_eq!(scheduler.load().await, 3);
        assert!(scheduler.get(&old.id).await.is_none());
        assert!(scheduler.get(&kept_for_dependent.id).await.is_some());
        assert!(scheduler.get(&recent.id).await.is_some());
        assert_eq!(persistence.load(ACTIONS).await.unwrap().len(), 3);
        assert_eq!(scheduler.prune_history().await, 0);
    }

    #[tokio::test]
    async fn test_fail_after_policy() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::FailAfter(Duration::from_secs(60)));

        let mut stale = Action::new(ActionKind::Task, "stale").depends_on("gone");
        stale.created_at = Utc::now() - chrono::Duration::minutes(5);
        let stale = scheduler.schedule(stale).await;
        let fresh = scheduler
            .schedule(Action::new(ActionKind::Task, "fresh").depends_on("gone"))
            .await;

        assert_eq!(scheduler.get(&stale).await.unwrap().status, ActionStatus::Failed);
        assert_eq!(scheduler.get(&fresh).await.unwrap().status, ActionStatus::Planned);
    }

    #[tokio::test]
    async fn test_scheduled_for_future_waits() {
        let (scheduler, _memory) = scheduler_with(DependencyPolicy::Block);
        scheduler
            .schedule(Action::new(ActionKind::Task, "later").scheduled_for(Utc::now() + chrono::Duration::minutes(10)))
            .await;

        assert!(scheduler.execute_next().await.is_none());
        assert_eq!(scheduler.planned().await.len(), 1);
    }

    #[tokio::test]
    async fn test_load_marks_interrupted() {
        let persistence = Arc::new(MemoryPersistence::new());
        let mut running = Action::new(ActionKind::Task, "was running");
        running.status = ActionStatus::Executing;
        let planned = Action::new(ActionKind::Task, "was planned");
        persistence
            .save(
                ACTIONS,
                vec![
                    serde_json::to_value(&running).unwrap(),
                    serde_json::to_value(&planned).unwrap(),
                    serde_json::json!({"garbage": true}),
                ],
            )
            .await
            .unwrap();

        let events = EventBus::default();
        let memory = Arc::new(MemoryStore::new(MemoryConfig::default(), persistence.clone(), events.clone()));
        let scheduler = Scheduler::new(SchedulerConfig::default(), memory, persistence, events);

        assert_eq!(scheduler.load().await, 2);
        let restored = scheduler.get(&running.id).await.unwrap();
        assert_eq!(restored.status, ActionStatus::Failed);
        assert_eq!(restored.error.as_deref(), Some("interrupted by restart"));
        // planned action went straight to the queue
        assert_eq!(scheduler.queued().await.len(), 1);
    }
}
