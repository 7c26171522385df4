//! # focusloop Core Library
//!
//! The session timer engine behind the focusloop CLI: a Pomodoro cycle of
//! Work and break intervals that survives restarts without losing or
//! double-counting completed work.
//!
//! ## Architecture
//!
//! - **Clock**: drift-corrected one-second tick source on tokio
//! - **State machine**: Work/ShortBreak/LongBreak transitions, pure and
//!   time-injected
//! - **Recovery**: reconciles persisted state with elapsed wall-clock time
//! - **Completion recorder**: dedups completions, feeds the backend and
//!   local stats
//! - **Storage**: key-value persistence port, SQLite adapter, TOML config
//!
//! ## Key Components
//!
//! - [`FocusEngine`]: owns the state machine and wires the collaborators
//! - [`FocusRuntime`]: runs an engine against a [`Clock`]
//! - [`SessionStateMachine`]: transition rules
//! - [`CompletionRecorder`]: exactly-once local accounting

pub mod completion;
pub mod engine;
pub mod error;
pub mod events;
pub mod runtime;
pub mod storage;
pub mod timer;

pub use completion::{
    CompletionEvent, CompletionRecord, CompletionRecorder, CompletionSink, HttpBackend,
    LocalStats, OfflineSink, RecordOutcome,
};
pub use engine::{EngineBuilder, FocusEngine, SubscriptionId, TickResult};
pub use error::{BackendError, ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use runtime::FocusRuntime;
pub use storage::{Config, Database, KeyValueStore, MemoryStore, PersistenceGateway};
pub use timer::{
    Clock, RecoveryOptions, RecoveryResolver, SessionConfig, SessionKind, SessionSnapshot,
    SessionStateMachine, SwitchDecision,
};

use chrono::{DateTime, Utc};

/// Epoch milliseconds to a UTC timestamp; out-of-range values clamp to the
/// Unix epoch.
pub fn datetime_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
