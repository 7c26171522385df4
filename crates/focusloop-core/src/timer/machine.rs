//! Work/break state machine.
//!
//! The machine owns the [`SessionSnapshot`] and the pure transition rules.
//! It never reads a clock: every mutating call takes the current wall-clock
//! time in epoch milliseconds so the caller decides where time comes from.
//!
//! ## State Transitions
//!
//! ```text
//! Work -> ShortBreak -> Work -> ... -> Work -> LongBreak -> Work
//!         (k-1 times)                 (every k-th completion)
//! ```
//!
//! Reaching zero does not switch sessions by itself: `tick()` returns a
//! pending [`Transition`] that the caller commits after handing its
//! completion (if any) to the recorder.

use serde::{Deserialize, Serialize};

use super::session::{SessionConfig, SessionKind, SessionSnapshot};
use crate::completion::CompletionEvent;

/// Task/project the user is currently working on. Survives breaks inside
/// one engine lifetime; the snapshot only carries it during Work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub task_id: Option<String>,
    pub project_id: Option<String>,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing changed.
    Idle,
    /// One second counted down, session continues.
    Counted { remaining_seconds: u32 },
    /// Remaining time hit zero. Must be committed.
    Completed(Transition),
}

/// A pending session change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a transition does nothing until committed"]
pub struct Transition {
    pub from: SessionKind,
    pub to: SessionKind,
    /// Present only when a Work session finished without being skipped.
    pub completion: Option<CompletionEvent>,
    pub skipped: bool,
    next: SessionSnapshot,
}

impl Transition {
    pub fn next(&self) -> &SessionSnapshot {
        &self.next
    }
}

/// Answer to a task-switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchDecision {
    /// The new task is attached and the Work session reset.
    Applied,
    /// A session is running or paused; call `confirm_switch` to discard it.
    RequiresConfirmation,
    /// Breaks are never attributed to a task.
    NotAllowed,
}

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    config: SessionConfig,
    snapshot: SessionSnapshot,
    attribution: Attribution,
}

impl SessionStateMachine {
    /// Wrap an already normalized snapshot. Use the recovery resolver to
    /// obtain one from persisted data.
    pub fn new(config: SessionConfig, snapshot: SessionSnapshot) -> Self {
        let attribution = if snapshot.current_session_kind == SessionKind::Work {
            Attribution {
                task_id: snapshot.task_id.clone(),
                project_id: snapshot.project_id.clone(),
            }
        } else {
            Attribution::default()
        };
        Self {
            config,
            snapshot,
            attribution,
        }
    }

    pub fn fresh(config: SessionConfig, now_ms: i64) -> Self {
        let snapshot = SessionSnapshot::idle_work(&config, now_ms);
        Self::new(config, snapshot)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn kind(&self) -> SessionKind {
        self.snapshot.current_session_kind
    }

    pub fn attribution(&self) -> &Attribution {
        &self.attribution
    }

    /// Whether switching task now would throw away progress.
    pub fn would_discard_progress(&self) -> bool {
        self.snapshot.is_running || self.snapshot.is_paused
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Returns `false` when already running.
    pub fn start(&mut self, now_ms: i64) -> bool {
        if self.snapshot.is_running {
            return false;
        }
        self.snapshot.is_running = true;
        self.snapshot.is_paused = false;
        self.touch(now_ms);
        true
    }

    pub fn pause(&mut self, now_ms: i64) -> bool {
        if !self.snapshot.is_running {
            return false;
        }
        self.snapshot.is_running = false;
        self.snapshot.is_paused = true;
        self.touch(now_ms);
        true
    }

    pub fn resume(&mut self, now_ms: i64) -> bool {
        if !self.snapshot.is_paused {
            return false;
        }
        self.snapshot.is_running = true;
        self.snapshot.is_paused = false;
        self.touch(now_ms);
        true
    }

    /// Back to an idle, full-length Work session with a fresh cycle.
    pub fn reset(&mut self, now_ms: i64) {
        let mut snapshot = SessionSnapshot::idle_work(&self.config, now_ms);
        snapshot.task_id = self.attribution.task_id.clone();
        snapshot.project_id = self.attribution.project_id.clone();
        self.snapshot = snapshot;
    }

    /// Count down one second. See [`TickOutcome`].
    pub fn tick(&mut self, now_ms: i64) -> TickOutcome {
        if !self.snapshot.is_running || self.snapshot.is_paused {
            return TickOutcome::Idle;
        }
        self.snapshot.time_remaining_seconds = self.snapshot.time_remaining_seconds.saturating_sub(1);
        self.touch(now_ms);

        if self.snapshot.time_remaining_seconds > 0 {
            return TickOutcome::Counted {
                remaining_seconds: self.snapshot.time_remaining_seconds,
            };
        }

        let completion = (self.kind() == SessionKind::Work).then(|| {
            CompletionEvent::work_finished(
                self.snapshot.task_id.clone(),
                self.snapshot.project_id.clone(),
                self.config.work_minutes,
                now_ms,
            )
        });
        TickOutcome::Completed(self.plan_transition(completion, false, now_ms))
    }

    /// Advance exactly like reaching zero, without a completion.
    pub fn skip(&mut self, now_ms: i64) -> Transition {
        self.plan_transition(None, true, now_ms)
    }

    /// Finish the current Work session early and credit the elapsed part.
    /// Returns `None` during breaks.
    pub fn mark_complete(&mut self, now_ms: i64) -> Option<Transition> {
        if self.kind() != SessionKind::Work {
            return None;
        }
        let full = self.config.duration_secs(SessionKind::Work);
        let elapsed_secs = full.saturating_sub(self.snapshot.time_remaining_seconds);
        let minutes = elapsed_secs.div_ceil(60).max(1);
        let completion = CompletionEvent::work_finished(
            self.snapshot.task_id.clone(),
            self.snapshot.project_id.clone(),
            minutes,
            now_ms,
        );
        Some(self.plan_transition(Some(completion), false, now_ms))
    }

    /// Apply a pending transition.
    pub fn commit(&mut self, transition: Transition) {
        self.snapshot = transition.next;
    }

    /// First phase of a task switch. Applies immediately when nothing is in
    /// progress.
    pub fn request_switch(
        &mut self,
        task_id: Option<String>,
        project_id: Option<String>,
        now_ms: i64,
    ) -> SwitchDecision {
        if self.kind() != SessionKind::Work {
            return SwitchDecision::NotAllowed;
        }
        if self.would_discard_progress() {
            return SwitchDecision::RequiresConfirmation;
        }
        self.apply_switch(task_id, project_id, now_ms);
        SwitchDecision::Applied
    }

    /// Second phase: the caller has consent to discard partial progress.
    pub fn confirm_switch(
        &mut self,
        task_id: Option<String>,
        project_id: Option<String>,
        now_ms: i64,
    ) -> SwitchDecision {
        if self.kind() != SessionKind::Work {
            return SwitchDecision::NotAllowed;
        }
        self.apply_switch(task_id, project_id, now_ms);
        SwitchDecision::Applied
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn touch(&mut self, now_ms: i64) {
        self.snapshot.last_updated_at_epoch_millis = now_ms;
    }

    // Partial progress can't be split between the old and new task, so the
    // Work session restarts at full length.
    fn apply_switch(&mut self, task_id: Option<String>, project_id: Option<String>, now_ms: i64) {
        self.attribution = Attribution {
            task_id: task_id.clone(),
            project_id: project_id.clone(),
        };
        self.snapshot.task_id = task_id;
        self.snapshot.project_id = project_id;
        self.snapshot.time_remaining_seconds = self.config.duration_secs(SessionKind::Work);
        self.snapshot.is_running = false;
        self.snapshot.is_paused = false;
        self.touch(now_ms);
    }

    fn plan_transition(
        &self,
        completion: Option<CompletionEvent>,
        skipped: bool,
        now_ms: i64,
    ) -> Transition {
        let from = self.kind();
        let (to, completed_in_cycle) = match from {
            SessionKind::Work => {
                let next = (self.snapshot.completed_work_intervals_in_cycle + 1)
                    % self.config.long_break_interval_count.max(1);
                let kind = if next == 0 {
                    SessionKind::LongBreak
                } else {
                    SessionKind::ShortBreak
                };
                (kind, next)
            }
            SessionKind::ShortBreak | SessionKind::LongBreak => {
                (SessionKind::Work, self.snapshot.completed_work_intervals_in_cycle)
            }
        };

        let (task_id, project_id) = if to == SessionKind::Work {
            (
                self.attribution.task_id.clone(),
                self.attribution.project_id.clone(),
            )
        } else {
            (None, None)
        };

        Transition {
            from,
            to,
            completion,
            skipped,
            next: SessionSnapshot {
                is_running: self.config.auto_start_next,
                is_paused: false,
                current_session_kind: to,
                time_remaining_seconds: self.config.duration_secs(to),
                completed_work_intervals_in_cycle: completed_in_cycle,
                project_id,
                task_id,
                last_updated_at_epoch_millis: now_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(config: SessionConfig) -> SessionStateMachine {
        let mut m = SessionStateMachine::fresh(config, 0);
        m.start(0);
        m
    }

    /// Tick until a transition appears, committing it.
    fn run_out(m: &mut SessionStateMachine, now: &mut i64) -> Transition {
        loop {
            *now += 1000;
            if let TickOutcome::Completed(t) = m.tick(*now) {
                m.commit(t.clone());
                return t;
            }
        }
    }

    #[test]
    fn start_pause_resume() {
        let mut m = SessionStateMachine::fresh(SessionConfig::default(), 0);
        assert!(m.snapshot().is_idle());

        assert!(m.start(1));
        assert!(m.snapshot().is_running);
        assert!(!m.start(2));

        assert!(m.pause(3));
        assert!(m.snapshot().is_paused);
        assert!(!m.snapshot().is_running);

        assert!(m.resume(4));
        assert!(m.snapshot().is_running);
        assert!(!m.snapshot().is_paused);
        assert_eq!(m.snapshot().last_updated_at_epoch_millis, 4);
    }

    #[test]
    fn tick_is_noop_when_not_running() {
        let mut m = SessionStateMachine::fresh(SessionConfig::default(), 0);
        assert_eq!(m.tick(1000), TickOutcome::Idle);
        assert_eq!(m.snapshot().time_remaining_seconds, 1500);

        m.start(0);
        m.pause(0);
        assert_eq!(m.tick(1000), TickOutcome::Idle);
    }

    #[test]
    fn tick_counts_down() {
        let mut m = running(SessionConfig::default());
        assert_eq!(m.tick(1000), TickOutcome::Counted { remaining_seconds: 1499 });
        assert_eq!(m.snapshot().last_updated_at_epoch_millis, 1000);
    }

    #[test]
    fn tick_at_zero_transitions_instead_of_going_negative() {
        let config = SessionConfig::default();
        let mut snap = SessionSnapshot::idle_work(&config, 0);
        snap.is_running = true;
        snap.time_remaining_seconds = 0;
        let mut m = SessionStateMachine::new(config, snap);
        match m.tick(1000) {
            TickOutcome::Completed(t) => assert_eq!(t.to, SessionKind::ShortBreak),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn classic_cycle_reaches_long_break_on_fourth_work() {
        let mut m = running(SessionConfig::default());
        let mut now = 0;

        for round in 1..=3 {
            let t = run_out(&mut m, &mut now);
            assert!(t.completion.is_some());
            assert_eq!(m.kind(), SessionKind::ShortBreak);
            assert_eq!(m.snapshot().time_remaining_seconds, 300);
            assert_eq!(m.snapshot().completed_work_intervals_in_cycle, round);

            m.start(now);
            let t = run_out(&mut m, &mut now);
            assert!(t.completion.is_none());
            assert_eq!(m.kind(), SessionKind::Work);
            m.start(now);
        }

        run_out(&mut m, &mut now);
        assert_eq!(m.kind(), SessionKind::LongBreak);
        assert_eq!(m.snapshot().time_remaining_seconds, 900);
        assert_eq!(m.snapshot().completed_work_intervals_in_cycle, 0);
    }

    #[test]
    fn work_completion_takes_exactly_the_configured_ticks() {
        let mut m = running(SessionConfig::default());
        for i in 1..1500 {
            assert!(matches!(m.tick(i * 1000), TickOutcome::Counted { .. }));
        }
        assert!(matches!(m.tick(1_500_000), TickOutcome::Completed(_)));
    }

    #[test]
    fn next_session_waits_unless_auto_start() {
        let mut m = running(SessionConfig::default());
        let mut now = 0;
        run_out(&mut m, &mut now);
        assert!(!m.snapshot().is_running);

        let mut m = running(SessionConfig {
            auto_start_next: true,
            ..SessionConfig::default()
        });
        run_out(&mut m, &mut now);
        assert!(m.snapshot().is_running);
    }

    #[test]
    fn breaks_drop_the_task_and_work_gets_it_back() {
        let mut m = SessionStateMachine::fresh(SessionConfig::default(), 0);
        assert_eq!(
            m.request_switch(Some("T1".into()), Some("P1".into()), 0),
            SwitchDecision::Applied
        );
        m.start(0);
        let mut now = 0;
        let t = run_out(&mut m, &mut now);
        let completion = t.completion.expect("work completion");
        assert_eq!(completion.task_id.as_deref(), Some("T1"));
        assert_eq!(completion.project_id.as_deref(), Some("P1"));

        assert!(m.kind().is_break());
        assert!(m.snapshot().task_id.is_none());
        assert!(m.snapshot().project_id.is_none());

        m.start(now);
        run_out(&mut m, &mut now);
        assert_eq!(m.kind(), SessionKind::Work);
        assert_eq!(m.snapshot().task_id.as_deref(), Some("T1"));
    }

    #[test]
    fn skip_advances_without_completion() {
        let mut m = running(SessionConfig::default());
        m.tick(1000);
        let t = m.skip(2000);
        assert!(t.skipped);
        assert!(t.completion.is_none());
        assert_eq!(t.to, SessionKind::ShortBreak);
        m.commit(t);
        assert_eq!(m.snapshot().completed_work_intervals_in_cycle, 1);
        assert_eq!(m.snapshot().time_remaining_seconds, 300);
    }

    #[test]
    fn mark_complete_credits_elapsed_minutes() {
        let mut m = running(SessionConfig::default());
        for i in 1..=600 {
            m.tick(i * 1000);
        }
        let t = m.mark_complete(601_000).expect("work session");
        assert_eq!(t.completion.as_ref().map(|c| c.duration_minutes), Some(10));
        m.commit(t);
        assert_eq!(m.kind(), SessionKind::ShortBreak);
        assert!(m.mark_complete(602_000).is_none());
    }

    #[test]
    fn switch_needs_confirmation_while_active() {
        let mut m = running(SessionConfig::default());
        m.tick(1000);
        assert!(m.would_discard_progress());
        assert_eq!(
            m.request_switch(Some("T2".into()), None, 2000),
            SwitchDecision::RequiresConfirmation
        );
        assert_eq!(m.snapshot().time_remaining_seconds, 1499);
        assert!(m.snapshot().task_id.is_none());

        assert_eq!(
            m.confirm_switch(Some("T2".into()), None, 3000),
            SwitchDecision::Applied
        );
        assert_eq!(m.snapshot().time_remaining_seconds, 1500);
        assert_eq!(m.snapshot().task_id.as_deref(), Some("T2"));
        assert!(m.snapshot().is_idle());
    }

    #[test]
    fn switch_is_refused_during_breaks() {
        let mut m = running(SessionConfig::default());
        let t = m.skip(0);
        m.commit(t);
        assert_eq!(
            m.request_switch(Some("T1".into()), None, 0),
            SwitchDecision::NotAllowed
        );
        assert_eq!(
            m.confirm_switch(Some("T1".into()), None, 0),
            SwitchDecision::NotAllowed
        );
        assert!(m.snapshot().task_id.is_none());
    }

    #[test]
    fn reset_goes_to_idle_work() {
        let mut m = running(SessionConfig::default());
        let t = m.skip(0);
        m.commit(t);
        m.reset(10);
        assert_eq!(m.kind(), SessionKind::Work);
        assert_eq!(m.snapshot().completed_work_intervals_in_cycle, 0);
        assert!(m.snapshot().is_idle());
        assert_eq!(m.snapshot().time_remaining_seconds, 1500);
    }

    #[test]
    fn interval_count_of_one_always_long_breaks() {
        let mut m = running(SessionConfig {
            long_break_interval_count: 1,
            ..SessionConfig::default()
        });
        let t = m.skip(0);
        assert_eq!(t.to, SessionKind::LongBreak);
    }
}
