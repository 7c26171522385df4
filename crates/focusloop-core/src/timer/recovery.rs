//! Reload reconciliation.
//!
//! Turns whatever the store handed back into a snapshot that is safe to
//! resume from. Runs once, before the engine exists, so nothing can tick an
//! uninitialized session.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::session::{SessionConfig, SessionKind, SessionSnapshot};

/// Raw result of reading the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedSnapshot {
    Missing,
    /// Present but unparseable or shape-invalid.
    Malformed(String),
    Found(SessionSnapshot),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOptions {
    /// Keep a Work session running across the restart. Only set this when
    /// the previous shutdown was controlled.
    pub resume_running: bool,
}

/// Which rule produced the recovered snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum RecoveryRule {
    NoSnapshot,
    Malformed,
    BreakDiscarded,
    ResumedRunning { elapsed_seconds: u32 },
    RestoredIdle,
}

/// A Work session that was running when the process went away and is not
/// being resumed. Reported once, never credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbandonedTimer {
    pub task_id: Option<String>,
    pub project_id: Option<String>,
    pub time_remaining_seconds: u32,
    pub last_updated_at_epoch_millis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub snapshot: SessionSnapshot,
    pub rule: RecoveryRule,
    pub abandoned: Option<AbandonedTimer>,
}

#[derive(Debug, Clone)]
pub struct RecoveryResolver {
    config: SessionConfig,
    options: RecoveryOptions,
}

impl RecoveryResolver {
    pub fn new(config: SessionConfig, options: RecoveryOptions) -> Self {
        Self { config, options }
    }

    pub fn resolve(&self, persisted: PersistedSnapshot, now_ms: i64) -> RecoveryOutcome {
        let snapshot = match persisted {
            PersistedSnapshot::Missing => {
                return self.default_outcome(RecoveryRule::NoSnapshot, now_ms);
            }
            PersistedSnapshot::Malformed(reason) => {
                warn!(%reason, "discarding malformed session snapshot");
                return self.default_outcome(RecoveryRule::Malformed, now_ms);
            }
            PersistedSnapshot::Found(snapshot) => snapshot,
        };

        if let Err(e) = snapshot.validate() {
            warn!(error = %e, "discarding invalid session snapshot");
            return self.default_outcome(RecoveryRule::Malformed, now_ms);
        }

        if snapshot.current_session_kind.is_break() {
            info!(
                kind = snapshot.current_session_kind.label(),
                "break not resumed after reload"
            );
            let mut fresh = SessionSnapshot::idle_work(&self.config, now_ms);
            fresh.completed_work_intervals_in_cycle = snapshot.completed_work_intervals_in_cycle;
            return RecoveryOutcome {
                snapshot: fresh,
                rule: RecoveryRule::BreakDiscarded,
                abandoned: None,
            };
        }

        let full = self.config.duration_secs(SessionKind::Work);
        let stored_remaining = match snapshot.time_remaining_seconds {
            0 => full,
            n => n.min(full),
        };

        // A paused flag wins over a contradictory running flag.
        let counting = snapshot.is_running && !snapshot.is_paused;

        if counting && self.options.resume_running {
            let gap_ms = now_ms.saturating_sub(snapshot.last_updated_at_epoch_millis).max(0);
            let elapsed_seconds = u32::try_from(gap_ms / 1000).unwrap_or(u32::MAX);
            // Floor at one so the next tick drives a normal completion.
            let remaining = stored_remaining.saturating_sub(elapsed_seconds).max(1);
            // Only whole seconds were charged; the sub-second rest stays
            // owed to the next reload.
            let charged_until = snapshot
                .last_updated_at_epoch_millis
                .saturating_add(i64::from(elapsed_seconds) * 1000);
            info!(elapsed_seconds, remaining, "resuming running work session");
            return RecoveryOutcome {
                snapshot: SessionSnapshot {
                    is_running: true,
                    is_paused: false,
                    time_remaining_seconds: remaining,
                    last_updated_at_epoch_millis: charged_until,
                    ..snapshot
                },
                rule: RecoveryRule::ResumedRunning { elapsed_seconds },
                abandoned: None,
            };
        }

        let abandoned = counting.then(|| AbandonedTimer {
            task_id: snapshot.task_id.clone(),
            project_id: snapshot.project_id.clone(),
            time_remaining_seconds: snapshot.time_remaining_seconds,
            last_updated_at_epoch_millis: snapshot.last_updated_at_epoch_millis,
        });
        if let Some(timer) = &abandoned {
            info!(
                task_id = timer.task_id.as_deref().unwrap_or("-"),
                remaining = timer.time_remaining_seconds,
                "abandoned work timer discarded without credit"
            );
        }

        RecoveryOutcome {
            snapshot: SessionSnapshot {
                is_running: false,
                is_paused: false,
                time_remaining_seconds: stored_remaining,
                last_updated_at_epoch_millis: now_ms,
                ..snapshot
            },
            rule: RecoveryRule::RestoredIdle,
            abandoned,
        }
    }

    fn default_outcome(&self, rule: RecoveryRule, now_ms: i64) -> RecoveryOutcome {
        RecoveryOutcome {
            snapshot: SessionSnapshot::idle_work(&self.config, now_ms),
            rule,
            abandoned: None,
        }
    }
}
