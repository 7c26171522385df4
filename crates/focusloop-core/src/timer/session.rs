use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub fn is_break(self) -> bool {
        !matches!(self, SessionKind::Work)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionKind::Work => "Work",
            SessionKind::ShortBreak => "Short Break",
            SessionKind::LongBreak => "Long Break",
        }
    }
}

/// Durations and chaining behaviour for one engine instance.
///
/// Immutable while a session runs; the engine only reads it when it needs
/// the duration of the next session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    /// Work intervals between long breaks.
    #[serde(default = "default_long_break_interval_count")]
    pub long_break_interval_count: u32,
    #[serde(default)]
    pub auto_start_next: bool,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_long_break_interval_count() -> u32 {
    4
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval_count: default_long_break_interval_count(),
            auto_start_next: false,
        }
    }
}

impl SessionConfig {
    /// Reject zero durations and a zero long-break interval (the cycle
    /// arithmetic is modulo that count).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("work_minutes", self.work_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
            ("long_break_interval_count", self.long_break_interval_count),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::MustBePositive {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn duration_minutes(&self, kind: SessionKind) -> u32 {
        match kind {
            SessionKind::Work => self.work_minutes,
            SessionKind::ShortBreak => self.short_break_minutes,
            SessionKind::LongBreak => self.long_break_minutes,
        }
    }

    /// Get session duration in seconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_secs(&self, kind: SessionKind) -> u32 {
        self.duration_minutes(kind).saturating_mul(60)
    }
}

/// The single source of truth for the running timer.
///
/// Field names follow the persisted schema (`isRunning`, `timeRemainingSeconds`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_running: bool,
    pub is_paused: bool,
    pub current_session_kind: SessionKind,
    pub time_remaining_seconds: u32,
    pub completed_work_intervals_in_cycle: u32,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    pub last_updated_at_epoch_millis: i64,
}

impl SessionSnapshot {
    /// Idle Work session with the full configured duration. This is how
    /// "no active session" is represented.
    pub fn idle_work(config: &SessionConfig, now_ms: i64) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            current_session_kind: SessionKind::Work,
            time_remaining_seconds: config.duration_secs(SessionKind::Work),
            completed_work_intervals_in_cycle: 0,
            project_id: None,
            task_id: None,
            last_updated_at_epoch_millis: now_ms,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_running && !self.is_paused
    }

    /// Shape checks serde cannot express. A snapshot failing these is
    /// treated like unparseable data.
    ///
    /// Contradictory run flags are not a shape error; recovery resolves
    /// them by treating the session as not running.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.current_session_kind.is_break()
            && (self.task_id.is_some() || self.project_id.is_some())
        {
            return Err(ValidationError::InvalidValue {
                field: "taskId".into(),
                message: "breaks cannot carry a task or project".into(),
            });
        }
        Ok(())
    }
}
