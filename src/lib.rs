//! Assistant Core
//!
//! Memory-driven autonomous scheduling core for a personal assistant.
//!
//! # Features
//!
//! - **Memory**: scored, tagged knowledge store with relation discovery,
//!   consolidation, topic clustering and retention-based archiving
//! - **Reasoning**: heuristic detectors that turn recent memories into thoughts
//! - **Scheduler**: priority + dependency aware queue, one action at a time
//! - **Providers**: ranked AI backends (Ollama, Claude) with deterministic
//!   failover to a local fallback that never fails
//!
//! # Architecture
//!
//! ```text
//! process_command ──► Assistant ──► ProviderRouter ──► Ollama / Claude / fallback
//!                        │
//!                        ├── MemoryStore ──(MemoryAdded)──► ReasoningSource
//!                        │        ▲                              │
//!                        │        └──── outcomes ──── Scheduler ◄┘ (thoughts → actions)
//!                        └── EventBus (typed broadcast to the transport layer)
//! ```

pub mod assistant;
pub mod config;
pub mod events;
pub mod memory;
pub mod persistence;
pub mod providers;
pub mod reasoning;
pub mod scheduler;

pub use assistant::{Assistant, StatusSnapshot};
pub use config::Config;
pub use events::{CoreEvent, EventBus, EventKind};
pub use memory::{MemoryConfig, MemoryEntry, MemoryKind, MemoryStats, MemoryStore, NewMemory, ScoredMemory};
pub use persistence::{MemoryPersistence, Persistence, SqlitePersistence};
pub use providers::{ModelHint, Provider, ProviderError, ProviderRouter, RequestMode, RouterResponse};
pub use reasoning::{ReasoningConfig, ReasoningSource, SystemSnapshot, Thought, ThoughtKind};
pub use scheduler::{
    Action, ActionHandler, ActionKind, ActionStatus, DependencyPolicy, Priority, Scheduler,
    SchedulerConfig, SchedulerError,
};
