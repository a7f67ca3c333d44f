//! Scored Memory Store
//!
//! Append-mostly knowledge base for the assistant:
//! - Heuristic importance scoring (1-10) from keyword signals
//! - Tag enrichment (signal categories + year-month tag)
//! - Relation discovery against existing entries
//! - Keyword search with exact-phrase boost
//! - Consolidation of near-duplicates (Jaccard word overlap)
//! - Topic clustering by primary tag
//! - Retention-based archival
//!
//! Entries live in memory; every mutation writes the full collection through the
//! injected [`Persistence`] port.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::events::{CoreEvent, EventBus};
use crate::persistence::{Persistence, MEMORIES, MEMORY_ARCHIVE};

/// Base importance when the caller supplies none
pub const DEFAULT_IMPORTANCE: u8 = 5;

/// Relation score an entry must exceed to be considered related
const RELATION_THRESHOLD: u32 = 3;

/// Related ids kept per entry
const MAX_RELATED: usize = 5;

/// Search results cap
const MAX_SEARCH_RESULTS: usize = 20;

/// Minimum search score to keep a result
const SEARCH_THRESHOLD: u32 = 5;

/// Separator between merged contents
const MERGE_SEPARATOR: &str = "\n---\n";

/// Tag that protects an entry from archival
pub const IMPORTANT_TAG: &str = "important";

/// Kind of memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Thought,
    Task,
    Learning,
    Interaction,
    Plugin,
    System,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 6] = [
        MemoryKind::Thought,
        MemoryKind::Task,
        MemoryKind::Learning,
        MemoryKind::Interaction,
        MemoryKind::Plugin,
        MemoryKind::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Thought => "thought",
            MemoryKind::Task => "task",
            MemoryKind::Learning => "learning",
            MemoryKind::Interaction => "interaction",
            MemoryKind::Plugin => "plugin",
            MemoryKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "thought" => Some(MemoryKind::Thought),
            "task" => Some(MemoryKind::Task),
            "learning" => Some(MemoryKind::Learning),
            "interaction" => Some(MemoryKind::Interaction),
            "plugin" => Some(MemoryKind::Plugin),
            "system" => Some(MemoryKind::System),
            _ => None,
        }
    }
}

/// Structured metadata carried by an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_memories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
    /// Free-form keys (conversationId, actionId, archivedAt, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Memory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MemoryKind,
    pub content: String,
    pub importance: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,
}

impl MemoryEntry {
    /// First tag that is not the automatic year-month tag, or "general"
    pub fn primary_tag(&self) -> &str {
        self.tags
            .iter()
            .find(|t| !is_month_tag(t))
            .map(String::as_str)
            .unwrap_or("general")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Short single-line preview for listings
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.content.replace('\n', " ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{}...", cut.trim_end())
        }
    }
}

/// Insert request
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub kind: MemoryKind,
    pub content: String,
    /// Base importance (heuristic adds to it) or exact value when `exact_importance`
    pub importance: Option<u8>,
    pub exact_importance: bool,
    pub tags: Vec<String>,
    pub metadata: MemoryMetadata,
    pub parent_id: Option<String>,
    /// Backdate the entry (imports, tests); defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMemory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            importance: None,
            exact_importance: false,
            tags: vec![],
            metadata: MemoryMetadata::default(),
            parent_id: None,
            timestamp: None,
        }
    }

    pub fn with_importance(mut self, base: u8) -> Self {
        self.importance = Some(base);
        self
    }

    /// Skip the heuristic and store this importance (still clamped)
    pub fn with_exact_importance(mut self, importance: u8) -> Self {
        self.importance = Some(importance);
        self.exact_importance = true;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Search hit with its score
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub entry: MemoryEntry,
    pub score: u32,
}

/// Topic cluster keyed by primary tag
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCluster {
    pub topic: String,
    pub memory_ids: Vec<String>,
    pub max_importance: u8,
    pub last_updated: DateTime<Utc>,
}

/// Result of a consolidation pass
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    /// Number of merged groups (one new entry each)
    pub groups_merged: usize,
    /// Original entries removed
    pub entries_removed: usize,
    /// Ids of the new merged entries
    pub merged_ids: Vec<String>,
}

/// Memory statistics
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub archived_entries: usize,
    pub by_kind: Vec<(MemoryKind, usize)>,
    pub average_importance: f64,
}

/// Memory store configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Age after which low-importance entries are archived
    pub retention: Duration,
    /// Jaccard similarity above which two entries are merged
    pub consolidation_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retention: Duration::days(30),
            consolidation_threshold: 0.8,
        }
    }
}

// Signal keyword tables
static URGENCY_TERMS: &[&str] = &[
    "urgent", "asap", "immediately", "emergency", "critical", "deadline",
    "error", "errors", "fail", "failed", "failure", "crash", "crashed",
    "broken", "exception", "panic", "fatal",
];

static ERROR_TERMS: &[&str] = &[
    "error", "errors", "fail", "failed", "failure", "crash", "crashed",
    "exception", "panic", "fatal", "timeout",
];

static QUESTION_TERMS: &[&str] = &["how", "what", "why", "when", "where", "who", "which"];

static CODE_TERMS: &[&str] = &[
    "code", "function", "method", "class", "variable", "compile", "compiler",
    "debug", "debugging", "bug", "bugs", "api", "script", "program",
    "programming", "rust", "python", "javascript", "typescript", "sql",
    "database", "library", "crate", "module", "git", "deploy", "refactor",
    "syntax", "test", "tests",
];

static DEBUG_TERMS: &[&str] = &[
    "debug", "debugging", "debugger", "bug", "bugs", "breakpoint", "stacktrace",
    "traceback", "crash", "exception", "fix", "error",
];

static EMOTIONAL_TERMS: &[&str] = &[
    "love", "hate", "happy", "sad", "angry", "frustrated", "excited", "worried",
    "anxious", "stressed", "thanks", "thank", "grateful", "upset", "annoyed", "glad",
];

static MONTH_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

/// Keyword signal categories; each match adds one importance point and a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Urgency,
    Question,
    Code,
    Emotional,
}

impl Signal {
    const ALL: [Signal; 4] = [Signal::Urgency, Signal::Question, Signal::Code, Signal::Emotional];

    fn tag(&self) -> &'static str {
        match self {
            Signal::Urgency => "urgent",
            Signal::Question => "question",
            Signal::Code => "programming",
            Signal::Emotional => "emotional",
        }
    }

    fn matches(&self, content: &str, words: &[String]) -> bool {
        match self {
            Signal::Urgency => contains_any(words, URGENCY_TERMS),
            Signal::Question => content.contains('?') || contains_any(words, QUESTION_TERMS),
            Signal::Code => contains_any(words, CODE_TERMS),
            Signal::Emotional => contains_any(words, EMOTIONAL_TERMS),
        }
    }
}

fn contains_any(words: &[String], terms: &[&str]) -> bool {
    words.iter().any(|w| terms.contains(&w.as_str()))
}

/// Lowercased alphanumeric words
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Distinct words longer than three characters
pub(crate) fn significant_words(text: &str) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| w.chars().count() > 3)
        .collect()
}

fn word_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard overlap of two word sets; two empty sets are not similar
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn is_month_tag(tag: &str) -> bool {
    MONTH_TAG.is_match(tag)
}

pub fn clamp_importance(value: i32) -> u8 {
    value.clamp(1, 10) as u8
}

/// Heuristic importance for new content
pub fn score_importance(kind: MemoryKind, content: &str, base: Option<u8>) -> u8 {
    let words = tokenize(content);
    let mut score = i32::from(base.unwrap_or(DEFAULT_IMPORTANCE));

    score += Signal::ALL
        .iter()
        .filter(|s| s.matches(content, &words))
        .count() as i32;

    if kind == MemoryKind::Interaction {
        score += 1;
    }
    if kind == MemoryKind::System && contains_any(&words, ERROR_TERMS) {
        score += 2;
    }

    clamp_importance(score)
}

/// Caller tags first, then signal tags, debugging, and the year-month tag
pub fn enrich_tags(caller_tags: &[String], content: &str, timestamp: DateTime<Utc>) -> Vec<String> {
    let words = tokenize(content);
    let mut tags: Vec<String> = Vec::with_capacity(caller_tags.len() + 4);

    let mut push = |tag: String| {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    for tag in caller_tags {
        push(tag.clone());
    }
    for signal in Signal::ALL {
        if signal.matches(content, &words) {
            push(signal.tag().to_string());
        }
    }
    if contains_any(&words, DEBUG_TERMS) {
        push("debugging".to_string());
    }
    push(timestamp.format("%Y-%m").to_string());

    tags
}

/// Relation score between a new entry and an existing one
fn relation_score(entry: &MemoryEntry, entry_words: &HashSet<String>, other: &MemoryEntry) -> u32 {
    let shared_tags = entry.tags.iter().filter(|t| other.tags.contains(t)).count() as u32;
    let shared_words = significant_words(&other.content)
        .intersection(entry_words)
        .count() as u32;

    let mut score = shared_tags * 2 + shared_words;
    if entry.kind == other.kind {
        score += 1;
    }

    let age_secs = (entry.timestamp - other.timestamp).num_seconds().abs();
    if age_secs <= Duration::days(1).num_seconds() {
        score += 2;
    } else if age_secs <= Duration::days(7).num_seconds() {
        score += 1;
    }

    score
}

/// Top related ids: score > threshold, by score desc then newest first
fn related_ids(entry: &MemoryEntry, others: &[MemoryEntry]) -> Vec<String> {
    let words = significant_words(&entry.content);

    let mut scored: Vec<(u32, DateTime<Utc>, &str)> = others
        .iter()
        .filter(|other| other.id != entry.id)
        .filter_map(|other| {
            let score = relation_score(entry, &words, other);
            (score > RELATION_THRESHOLD).then_some((score, other.timestamp, other.id.as_str()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    scored
        .into_iter()
        .take(MAX_RELATED)
        .map(|(_, _, id)| id.to_string())
        .collect()
}

#[derive(Default)]
struct MemoryState {
    active: Vec<MemoryEntry>,
    archived: Vec<MemoryEntry>,
}

/// Memory store
pub struct MemoryStore {
    config: MemoryConfig,
    state: RwLock<MemoryState>,
    persistence: Arc<dyn Persistence>,
    events: EventBus,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig, persistence: Arc<dyn Persistence>, events: EventBus) -> Self {
        Self {
            config,
            state: RwLock::new(MemoryState::default()),
            persistence,
            events,
        }
    }

    /// Restore both collections from persistence. Malformed blobs load as empty
    /// and leave a system memory behind. Returns the number of active entries.
    pub async fn load(&self) -> usize {
        let (active, active_error) = self.load_collection(MEMORIES).await;
        let (archived, archive_error) = self.load_collection(MEMORY_ARCHIVE).await;

        let count = active.len();
        {
            let mut state = self.state.write().await;
            state.active = active;
            state.archived = archived;
        }
        info!("Memory store loaded: {} active entries", count);

        for (collection, error) in [(MEMORIES, active_error), (MEMORY_ARCHIVE, archive_error)] {
            if let Some(error) = error {
                self.add(
                    NewMemory::new(
                        MemoryKind::System,
                        format!("Load error: collection '{}' was unreadable and reset ({})", collection, error),
                    )
                    .with_tag("persistence"),
                )
                .await;
            }
        }

        count
    }

    async fn load_collection(&self, collection: &str) -> (Vec<MemoryEntry>, Option<String>) {
        let records = match self.persistence.load(collection).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Treating '{}' as empty: {:#}", collection, e);
                return (vec![], Some(format!("{:#}", e)));
            }
        };

        let entries = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<MemoryEntry>(record) {
                Ok(mut entry) => {
                    entry.importance = clamp_importance(i32::from(entry.importance));
                    Some(entry)
                }
                Err(e) => {
                    warn!("Skipping malformed memory record in '{}': {}", collection, e);
                    None
                }
            })
            .collect();

        (entries, None)
    }

    /// Insert an entry and return its id
    pub async fn add(&self, new: NewMemory) -> String {
        let timestamp = new.timestamp.unwrap_or_else(Utc::now);
        let importance = if new.exact_importance {
            clamp_importance(i32::from(new.importance.unwrap_or(DEFAULT_IMPORTANCE)))
        } else {
            score_importance(new.kind, &new.content, new.importance)
        };
        let tags = enrich_tags(&new.tags, &new.content, timestamp);

        let mut entry = MemoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            kind: new.kind,
            content: new.content,
            importance,
            tags,
            metadata: new.metadata,
            parent_id: None,
            child_ids: vec![],
        };

        let mut state = self.state.write().await;
        entry.metadata.related_memories = related_ids(&entry, &state.active);

        if let Some(parent_id) = new.parent_id {
            match state.active.iter_mut().find(|e| e.id == parent_id) {
                Some(parent) => {
                    parent.child_ids.push(entry.id.clone());
                    entry.parent_id = Some(parent_id);
                }
                None => warn!("Parent memory {} not found, storing as root", parent_id),
            }
        }

        state.active.push(entry.clone());
        self.persist_active(&state).await;
        drop(state);

        debug!(
            "Memory added: {} ({}, importance {})",
            &entry.id[..8],
            entry.kind.as_str(),
            entry.importance
        );
        let id = entry.id.clone();
        self.events.emit(CoreEvent::MemoryAdded(entry));
        id
    }

    /// Keyword search over active entries
    pub async fn search(&self, query: &str) -> Vec<ScoredMemory> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return vec![];
        }

        let mut query_words: Vec<String> = Vec::new();
        for word in query_lower.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_string();
            if !word.is_empty() && !query_words.contains(&word) {
                query_words.push(word);
            }
        }

        let state = self.state.read().await;
        let mut results: Vec<ScoredMemory> = state
            .active
            .iter()
            .filter_map(|entry| {
                let content = entry.content.to_lowercase();
                let mut text_score = 0u32;

                if content.contains(&query_lower) {
                    text_score += 10;
                }
                for word in &query_words {
                    if content.contains(word.as_str()) {
                        text_score += 2;
                    }
                    if entry.tags.iter().any(|t| t.to_lowercase() == *word) {
                        text_score += 3;
                    }
                }

                let score = text_score + u32::from(entry.importance);
                (score > SEARCH_THRESHOLD).then(|| ScoredMemory {
                    entry: entry.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.entry.timestamp.cmp(&a.entry.timestamp))
        });
        results.truncate(MAX_SEARCH_RESULTS);
        results
    }

    /// Merge near-duplicate entries. Similarity is transitive and merging
    /// repeats until no pair is above the threshold, so a second call is a no-op.
    pub async fn consolidate(&self) -> ConsolidationReport {
        let mut state = self.state.write().await;
        let originals: HashSet<String> = state.active.iter().map(|e| e.id.clone()).collect();
        let mut created: HashSet<String> = HashSet::new();

        loop {
            let word_sets: Vec<HashSet<String>> =
                state.active.iter().map(|e| word_set(&e.content)).collect();
            let groups = similar_groups(&word_sets, self.config.consolidation_threshold);
            if groups.is_empty() {
                break;
            }

            let mut grouped = vec![false; state.active.len()];
            let merged: Vec<MemoryEntry> = groups
                .iter()
                .map(|group| {
                    for &i in group {
                        grouped[i] = true;
                    }
                    let members: Vec<&MemoryEntry> = group.iter().map(|&i| &state.active[i]).collect();
                    merge_entries(&members)
                })
                .collect();
            created.extend(merged.iter().map(|e| e.id.clone()));

            let mut index = 0;
            state.active.retain(|_| {
                let keep = !grouped[index];
                index += 1;
                keep
            });
            state.active.extend(merged);
        }

        // Intermediate merges never outlive this call
        for entry in state.active.iter_mut().filter(|e| created.contains(&e.id)) {
            entry.metadata.merged_from.retain(|id| !created.contains(id));
        }
        let merged: Vec<MemoryEntry> = state
            .active
            .iter()
            .filter(|e| created.contains(&e.id))
            .cloned()
            .collect();
        if merged.is_empty() {
            return ConsolidationReport::default();
        }

        let remaining = state.active.iter().filter(|e| originals.contains(&e.id)).count();
        let report = ConsolidationReport {
            groups_merged: merged.len(),
            entries_removed: originals.len() - remaining,
            merged_ids: merged.iter().map(|e| e.id.clone()).collect(),
        };

        self.persist_active(&state).await;
        drop(state);

        info!(
            "Consolidated {} entries into {} merged memories",
            report.entries_removed, report.groups_merged
        );
        for entry in merged {
            self.events.emit(CoreEvent::MemoryAdded(entry));
        }
        report
    }

    /// Group active entries by primary tag
    pub async fn cluster(&self) -> Vec<TopicCluster> {
        let state = self.state.read().await;
        let mut clusters: BTreeMap<String, TopicCluster> = BTreeMap::new();

        for entry in &state.active {
            let topic = entry.primary_tag().to_string();
            let cluster = clusters.entry(topic.clone()).or_insert_with(|| TopicCluster {
                topic,
                memory_ids: vec![],
                max_importance: entry.importance,
                last_updated: entry.timestamp,
            });
            cluster.memory_ids.push(entry.id.clone());
            cluster.max_importance = cluster.max_importance.max(entry.importance);
            cluster.last_updated = cluster.last_updated.max(entry.timestamp);
        }

        let mut clusters: Vec<TopicCluster> = clusters.into_values().collect();
        clusters.sort_by(|a, b| {
            b.memory_ids
                .len()
                .cmp(&a.memory_ids.len())
                .then_with(|| a.topic.cmp(&b.topic))
        });
        clusters
    }

    /// Archive old, unimportant entries. Returns how many were archived.
    pub async fn maintenance(&self) -> usize {
        let cutoff = Utc::now() - self.config.retention;
        let mut state = self.state.write().await;

        let (mut expired, keep): (Vec<MemoryEntry>, Vec<MemoryEntry>) =
            std::mem::take(&mut state.active).into_iter().partition(|e| {
                e.timestamp < cutoff && e.importance < 5 && !e.has_tag(IMPORTANT_TAG)
            });
        state.active = keep;

        let count = expired.len();
        if count == 0 {
            return 0;
        }

        let archived_at = Utc::now().to_rfc3339();
        for entry in &mut expired {
            entry
                .metadata
                .extra
                .insert("archivedAt".to_string(), Value::String(archived_at.clone()));
        }
        state.archived.extend(expired);

        self.persist_active(&state).await;
        self.persist_archive(&state).await;
        info!("Archived {} stale memories", count);
        count
    }

    pub async fn get(&self, id: &str) -> Option<MemoryEntry> {
        self.state
            .read()
            .await
            .active
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Most recent active entries, newest first
    pub async fn recent(&self, limit: usize) -> Vec<MemoryEntry> {
        let state = self.state.read().await;
        let mut entries = state.active.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }

    /// Active entries at or after `since`, oldest first
    pub async fn since(&self, since: DateTime<Utc>) -> Vec<MemoryEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<MemoryEntry> = state
            .active
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        entries
    }

    /// Most recent active entries of one kind, newest first
    pub async fn by_kind(&self, kind: MemoryKind, limit: usize) -> Vec<MemoryEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<MemoryEntry> =
            state.active.iter().filter(|e| e.kind == kind).cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }

    /// Delete an active entry
    pub async fn forget(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.active.len();
        state.active.retain(|e| e.id != id);
        if state.active.len() == before {
            return false;
        }
        for entry in state.active.iter_mut() {
            entry.child_ids.retain(|child| child != id);
        }
        self.persist_active(&state).await;
        true
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.active.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn archived_count(&self) -> usize {
        self.state.read().await.archived.len()
    }

    pub async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        let by_kind = MemoryKind::ALL
            .iter()
            .map(|kind| (*kind, state.active.iter().filter(|e| e.kind == *kind).count()))
            .filter(|(_, count)| *count > 0)
            .collect();
        let average_importance = if state.active.is_empty() {
            0.0
        } else {
            state.active.iter().map(|e| f64::from(e.importance)).sum::<f64>()
                / state.active.len() as f64
        };

        MemoryStats {
            total_entries: state.active.len(),
            archived_entries: state.archived.len(),
            by_kind,
            average_importance,
        }
    }

    async fn persist_active(&self, state: &MemoryState) {
        self.persist(MEMORIES, &state.active).await;
    }

    async fn persist_archive(&self, state: &MemoryState) {
        self.persist(MEMORY_ARCHIVE, &state.archived).await;
    }

    async fn persist(&self, collection: &str, entries: &[MemoryEntry]) {
        let records: Vec<Value> = entries
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect();
        if let Err(e) = self.persistence.save(collection, records).await {
            warn!("Failed to persist '{}': {:#}", collection, e);
        }
    }
}

/// Merge a group into one new entry: union tags, max importance, newest timestamp
/// Connected components of entries whose word sets overlap above `threshold`.
/// Groups of one are dropped; each group is in index order.
fn similar_groups(word_sets: &[HashSet<String>], threshold: f64) -> Vec<Vec<usize>> {
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut parent: Vec<usize> = (0..word_sets.len()).collect();
    for i in 0..word_sets.len() {
        for j in (i + 1)..word_sets.len() {
            if jaccard(&word_sets[i], &word_sets[j]) > threshold {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..word_sets.len() {
        let r = root(&mut parent, i);
        groups.entry(r).or_default().push(i);
    }
    groups.into_values().filter(|g| g.len() > 1).collect()
}

fn merge_entries(members: &[&MemoryEntry]) -> MemoryEntry {
    let first = members[0];

    let mut contents: Vec<&str> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut merged_from: Vec<String> = Vec::new();
    let mut child_ids: Vec<String> = Vec::new();
    let mut extra = serde_json::Map::new();

    for member in members {
        if !contents.contains(&member.content.as_str()) {
            contents.push(&member.content);
        }
        for tag in &member.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        for id in member.metadata.merged_from.iter().chain(std::iter::once(&member.id)) {
            if !merged_from.contains(id) {
                merged_from.push(id.clone());
            }
        }
        for child in &member.child_ids {
            if !child_ids.contains(child) {
                child_ids.push(child.clone());
            }
        }
        for (key, value) in &member.metadata.extra {
            extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    MemoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: members.iter().map(|m| m.timestamp).max().unwrap_or(first.timestamp),
        kind: first.kind,
        content: contents.join(MERGE_SEPARATOR),
        importance: members.iter().map(|m| m.importance).max().unwrap_or(first.importance),
        tags,
        metadata: MemoryMetadata {
            related_memories: vec![],
            merged_from,
            extra,
        },
        parent_id: first.parent_id.clone(),
        child_ids,
    }
}
