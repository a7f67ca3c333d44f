//! Reasoning Source
//!
//! Heuristic "thinking": independent detectors look at a bounded window of recent
//! memories plus a snapshot of system state and emit candidate thoughts. Thoughts
//! that require action are promoted to scheduler actions by the caller.

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::memory::{significant_words, MemoryEntry, MemoryKind};
use crate::scheduler::ActionKind;

/// Tag marking a question only the local fallback could answer
pub const UNANSWERED_TAG: &str = "unanswered";

/// Metadata key holding the user's question on interaction entries
pub const QUESTION_KEY: &str = "question";

/// Prefix of the tag naming the topic a learning plan was made for
pub const TOPIC_TAG_PREFIX: &str = "topic:";

/// Words too common in recorded conversations to name a topic
static TOPIC_STOP_WORDS: &[&str] = &[
    "user", "assistant", "what", "when", "where", "which", "does", "this", "that",
    "with", "have", "from", "there", "about", "would", "could", "should", "your",
];

/// Reasoning configuration
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Periodic thinking tick
    pub think_interval: Duration,
    /// Start of the user's active hours (local time, inclusive)
    pub active_start_hour: u32,
    /// End of the user's active hours (exclusive)
    pub active_end_hour: u32,
    /// Only memories this recent are considered
    pub window: Duration,
    /// At most this many memories are considered
    pub window_entries: usize,
    /// Interactions in the window above which an insight fires
    pub interaction_threshold: usize,
    /// Unanswered questions sharing a word before a learning plan fires
    pub repeat_threshold: usize,
    /// Minimum time between two thoughts from the same detector
    pub cooldown: Duration,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            think_interval: Duration::from_secs(60),
            active_start_hour: 9,
            active_end_hour: 18,
            window: Duration::from_secs(3600),
            window_entries: 50,
            interaction_threshold: 10,
            repeat_threshold: 2,
            cooldown: Duration::from_secs(600),
        }
    }
}

/// Thought category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThoughtKind {
    Observation,
    Insight,
    Plan,
    Reflection,
}

impl ThoughtKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtKind::Observation => "observation",
            ThoughtKind::Insight => "insight",
            ThoughtKind::Plan => "plan",
            ThoughtKind::Reflection => "reflection",
        }
    }

    /// Kind of the action a thought is promoted to
    pub fn action_kind(&self) -> ActionKind {
        match self {
            ThoughtKind::Observation => ActionKind::Analysis,
            ThoughtKind::Insight => ActionKind::Learning,
            ThoughtKind::Plan => ActionKind::Task,
            ThoughtKind::Reflection => ActionKind::Optimization,
        }
    }
}

/// Heuristic that can produce a thought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Detector {
    Idle,
    HighInteraction,
    LearningOpportunity,
    ProviderDegraded,
    Temporal,
}

impl Detector {
    pub const ALL: [Detector; 5] = [
        Detector::Idle,
        Detector::HighInteraction,
        Detector::LearningOpportunity,
        Detector::ProviderDegraded,
        Detector::Temporal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::Idle => "idle",
            Detector::HighInteraction => "high-interaction",
            Detector::LearningOpportunity => "learning-opportunity",
            Detector::ProviderDegraded => "provider-degraded",
            Detector::Temporal => "temporal",
        }
    }
}

/// Candidate insight
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub kind: ThoughtKind,
    pub detector: Detector,
    pub content: String,
    pub importance: u8,
    pub tags: Vec<String>,
    pub action_required: bool,
}

impl Thought {
    fn new(detector: Detector, kind: ThoughtKind, content: String, importance: u8) -> Self {
        Self {
            kind,
            detector,
            content,
            importance: importance.clamp(1, 10),
            tags: vec![kind.as_str().to_string(), detector.as_str().to_string()],
            action_required: false,
        }
    }

    fn requiring_action(mut self) -> Self {
        self.action_required = true;
        self
    }

    fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Topic of a learning plan
    pub fn topic(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| t.strip_prefix(TOPIC_TAG_PREFIX))
    }
}

/// System state sampled for a thinking pass
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Planned + queued + executing actions
    pub active_actions: usize,
    /// Top-ranked provider is unavailable
    pub degraded: bool,
    pub preferred_provider: String,
    /// Local hour of day (0-23)
    pub local_hour: u32,
}

/// Thought generator with per-detector cooldowns
pub struct ReasoningSource {
    config: ReasoningConfig,
    last_fired: Mutex<HashMap<Detector, Instant>>,
    /// Topics a learning plan was made for, and when
    planned_topics: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ReasoningSource {
    pub fn new(config: ReasoningConfig) -> Self {
        Self {
            config,
            last_fired: Mutex::new(HashMap::new()),
            planned_topics: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    /// Run every detector that is not cooling down. `recent` is newest first.
    pub fn think(&self, recent: &[MemoryEntry], snapshot: &SystemSnapshot) -> Vec<Thought> {
        self.think_at(recent, snapshot, Utc::now())
    }

    pub fn think_at(
        &self,
        recent: &[MemoryEntry],
        snapshot: &SystemSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Thought> {
        let window = self.window(recent, now);
        let planned = self.planned_topics(&window, now);
        let mut last_fired = self.last_fired.lock();
        let mut thoughts = Vec::new();

        for detector in Detector::ALL {
            if let Some(at) = last_fired.get(&detector) {
                if at.elapsed() < self.config.cooldown {
                    continue;
                }
            }
            if let Some(thought) = self.detect(detector, &window, snapshot, &planned) {
                if let Some(topic) = thought.topic() {
                    self.planned_topics.lock().insert(topic.to_string(), now);
                }
                debug!("Detector {} produced a {}", detector.as_str(), thought.kind.as_str());
                last_fired.insert(detector, Instant::now());
                thoughts.push(thought);
            }
        }

        thoughts
    }

    /// Forget cooldowns so the next pass runs every detector
    pub fn reset_cooldowns(&self) {
        self.last_fired.lock().clear();
    }

    /// Topics planned within the window, from thought tags and from this source
    fn planned_topics(&self, window: &[&MemoryEntry], now: DateTime<Utc>) -> HashSet<String> {
        let horizon = self.horizon();
        let mut remembered = self.planned_topics.lock();
        remembered.retain(|_, at| now - *at <= horizon);

        let mut planned: HashSet<String> = remembered.keys().cloned().collect();
        for entry in window.iter().filter(|e| e.kind == MemoryKind::Thought) {
            planned.extend(
                entry
                    .tags
                    .iter()
                    .filter_map(|t| t.strip_prefix(TOPIC_TAG_PREFIX))
                    .map(str::to_string),
            );
        }
        planned
    }

    fn horizon(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.window).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    fn window<'a>(&self, recent: &'a [MemoryEntry], now: DateTime<Utc>) -> Vec<&'a MemoryEntry> {
        let horizon = self.horizon();
        recent
            .iter()
            .filter(|e| now - e.timestamp <= horizon)
            .take(self.config.window_entries)
            .collect()
    }

    fn detect(
        &self,
        detector: Detector,
        window: &[&MemoryEntry],
        snapshot: &SystemSnapshot,
        planned: &HashSet<String>,
    ) -> Option<Thought> {
        match detector {
            Detector::Idle => (snapshot.active_actions == 0).then(|| {
                Thought::new(
                    detector,
                    ThoughtKind::Observation,
                    "No actions are pending; the assistant is idle.".to_string(),
                    3,
                )
            }),

            Detector::HighInteraction => {
                let interactions = window
                    .iter()
                    .filter(|e| e.kind == MemoryKind::Interaction)
                    .count();
                (interactions > self.config.interaction_threshold).then(|| {
                    Thought::new(
                        detector,
                        ThoughtKind::Insight,
                        format!(
                            "High interaction volume: {} interactions recently. Review them for recurring needs.",
                            interactions
                        ),
                        6,
                    )
                    .requiring_action()
                })
            }

            Detector::LearningOpportunity => {
                let (word, count) = repeated_topic(window, self.config.repeat_threshold, planned)?;
                Some(
                    Thought::new(
                        detector,
                        ThoughtKind::Plan,
                        format!(
                            "Learn about \"{}\": {} recent questions about it went unanswered.",
                            word, count
                        ),
                        7,
                    )
                    .with_tag(&format!("{}{}", TOPIC_TAG_PREFIX, word))
                    .with_tag(&word)
                    .requiring_action(),
                )
            }

            Detector::ProviderDegraded => snapshot.degraded.then(|| {
                Thought::new(
                    detector,
                    ThoughtKind::Reflection,
                    format!(
                        "The primary AI provider is unavailable; requests are served by {}.",
                        snapshot.preferred_provider
                    ),
                    5,
                )
            }),

            Detector::Temporal => self.is_active_hour(snapshot.local_hour).then(|| {
                Thought::new(
                    detector,
                    ThoughtKind::Observation,
                    format!(
                        "Within active hours ({:02}:00-{:02}:00); the user is likely available.",
                        self.config.active_start_hour, self.config.active_end_hour
                    ),
                    2,
                )
            }),
        }
    }

    /// `[start, end)`, wrapping past midnight when start > end
    pub fn is_active_hour(&self, hour: u32) -> bool {
        let (start, end) = (self.config.active_start_hour, self.config.active_end_hour);
        if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

/// Local hour for a snapshot
pub fn local_hour() -> u32 {
    chrono::Local::now().hour()
}

/// Most shared significant word among unanswered questions, if it reaches
/// `threshold` and has no plan yet
fn repeated_topic(
    window: &[&MemoryEntry],
    threshold: usize,
    planned: &HashSet<String>,
) -> Option<(String, usize)> {
    // BTreeMap keeps ties deterministic (alphabetical)
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for entry in window
        .iter()
        .filter(|e| e.kind == MemoryKind::Interaction && e.has_tag(UNANSWERED_TAG))
    {
        let question = entry
            .metadata
            .extra
            .get(QUESTION_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or(&entry.content);
        let words: HashSet<String> = significant_words(question);
        for word in words
            .into_iter()
            .filter(|w| !TOPIC_STOP_WORDS.contains(&w.as_str()) && !planned.contains(w))
        {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold.max(1))
        .fold(None, |best: Option<(String, usize)>, (word, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((word, count)),
        })
}
