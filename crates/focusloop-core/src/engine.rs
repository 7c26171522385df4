//! The focus engine: one owned state machine plus its collaborators.
//!
//! Every mutation follows the same order: transition, completion recording,
//! commit, persistence, notification. Nothing here returns an error to the
//! caller; storage failures are logged and the engine carries on with the
//! in-memory state.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = FocusEngine::builder(Box::new(Database::open()?))
//!     .config(config.session.clone())
//!     .recovery(config.recovery_options())
//!     .subscribe(|event| println!("{event:?}"))
//!     .build();
//! engine.start();
//! engine.tick(); // once per second, usually from a Clock
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::{
    CompletionEvent, CompletionRecorder, CompletionSink, LocalStats, OfflineSink, RecordOutcome,
};
use crate::events::Event;
use crate::storage::{KeyValueStore, PersistenceGateway};
use crate::timer::{
    AbandonedTimer, RecoveryOptions, RecoveryResolver, RecoveryRule, SessionConfig, SessionKind,
    SessionSnapshot, SessionStateMachine, SwitchDecision, SystemTimeSource, TickOutcome,
    TimeSource, Transition,
};

pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(&Event) + Send>;

/// What a call to [`FocusEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Idle,
    Counted {
        remaining_seconds: u32,
    },
    Advanced {
        from: SessionKind,
        to: SessionKind,
        /// Recorder verdict when the finished session was Work.
        recorded: Option<RecordOutcome>,
    },
}

pub struct EngineBuilder {
    store: Box<dyn KeyValueStore>,
    config: SessionConfig,
    recovery: RecoveryOptions,
    backend: Arc<dyn CompletionSink>,
    time: Arc<dyn TimeSource>,
    listeners: Vec<Listener>,
}

impl EngineBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn recovery(mut self, options: RecoveryOptions) -> Self {
        self.recovery = options;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionSink>) -> Self {
        self.backend = backend;
        self
    }

    pub fn time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Register a listener before recovery runs, so it also sees recovery
    /// notifications.
    pub fn subscribe<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Load, recover and persist the starting snapshot.
    pub fn build(self) -> FocusEngine {
        let now = self.time.now_ms();
        let gateway = PersistenceGateway::new(self.store);
        let resolver = RecoveryResolver::new(self.config.clone(), self.recovery);
        let outcome = resolver.resolve(gateway.load_snapshot(), now);
        let stats = gateway.load_stats();

        let mut engine = FocusEngine {
            machine: SessionStateMachine::new(self.config, outcome.snapshot),
            recorder: CompletionRecorder::new(self.backend, stats),
            gateway,
            time: self.time,
            listeners: Vec::new(),
            next_subscription: 0,
            recovery_rule: outcome.rule,
            abandoned: outcome.abandoned.clone(),
        };
        for listener in self.listeners {
            engine.add_listener(listener);
        }

        let mut events = Vec::new();
        if let Some(timer) = outcome.abandoned {
            events.push(Event::AbandonedTimerDiscarded {
                timer,
                at: crate::datetime_from_ms(now),
            });
        }
        // Persist right away so an abandoned timer is read only once.
        engine.after_mutation(now, events);
        engine
    }
}

pub struct FocusEngine {
    machine: SessionStateMachine,
    recorder: CompletionRecorder,
    gateway: PersistenceGateway,
    time: Arc<dyn TimeSource>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    recovery_rule: RecoveryRule,
    abandoned: Option<AbandonedTimer>,
}

impl FocusEngine {
    pub fn builder(store: Box<dyn KeyValueStore>) -> EngineBuilder {
        EngineBuilder {
            store,
            config: SessionConfig::default(),
            recovery: RecoveryOptions::default(),
            backend: Arc::new(OfflineSink),
            time: Arc::new(SystemTimeSource),
            listeners: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &SessionSnapshot {
        self.machine.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        self.machine.config()
    }

    pub fn stats(&self) -> &LocalStats {
        self.recorder.stats()
    }

    pub fn recovery_rule(&self) -> RecoveryRule {
        self.recovery_rule
    }

    pub fn abandoned_timer(&self) -> Option<&AbandonedTimer> {
        self.abandoned.as_ref()
    }

    pub fn would_discard_progress(&self) -> bool {
        self.machine.would_discard_progress()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.add_listener(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> bool {
        let now = self.time.now_ms();
        let changed = self.machine.start(now);
        if changed {
            self.after_mutation(now, Vec::new());
        }
        changed
    }

    pub fn pause(&mut self) -> bool {
        let now = self.time.now_ms();
        let changed = self.machine.pause(now);
        if changed {
            self.after_mutation(now, Vec::new());
        }
        changed
    }

    pub fn resume(&mut self) -> bool {
        let now = self.time.now_ms();
        let changed = self.machine.resume(now);
        if changed {
            self.after_mutation(now, Vec::new());
        }
        changed
    }

    pub fn reset(&mut self) {
        let now = self.time.now_ms();
        self.machine.reset(now);
        self.after_mutation(now, Vec::new());
    }

    pub fn tick(&mut self) -> TickResult {
        let now = self.time.now_ms();
        match self.machine.tick(now) {
            TickOutcome::Idle => TickResult::Idle,
            TickOutcome::Counted { remaining_seconds } => {
                self.after_mutation(now, Vec::new());
                TickResult::Counted { remaining_seconds }
            }
            TickOutcome::Completed(transition) => {
                let (from, to) = (transition.from, transition.to);
                let recorded = self.apply_transition(transition, now);
                TickResult::Advanced { from, to, recorded }
            }
        }
    }

    /// Move to the next session without crediting the current one.
    pub fn skip(&mut self) -> SessionKind {
        let now = self.time.now_ms();
        let transition = self.machine.skip(now);
        let to = transition.to;
        self.apply_transition(transition, now);
        to
    }

    /// Finish the current Work session now. `None` during breaks.
    pub fn mark_complete(&mut self) -> Option<RecordOutcome> {
        let now = self.time.now_ms();
        let transition = self.machine.mark_complete(now)?;
        self.apply_transition(transition, now)
    }

    /// Entry point for independent observers of a completion. Duplicates of
    /// something already recorded are absorbed.
    pub fn report_completion(&mut self, event: &CompletionEvent) -> RecordOutcome {
        let now = self.time.now_ms();
        let mut events = Vec::new();
        let outcome = self.record(event, now, &mut events);
        self.emit_all(&events);
        outcome
    }

    pub fn request_switch(
        &mut self,
        task_id: Option<String>,
        project_id: Option<String>,
    ) -> SwitchDecision {
        let now = self.time.now_ms();
        let decision = self.machine.request_switch(task_id, project_id, now);
        if decision == SwitchDecision::Applied {
            self.after_mutation(now, Vec::new());
        }
        decision
    }

    pub fn confirm_switch(
        &mut self,
        task_id: Option<String>,
        project_id: Option<String>,
    ) -> SwitchDecision {
        let now = self.time.now_ms();
        let decision = self.machine.confirm_switch(task_id, project_id, now);
        if decision == SwitchDecision::Applied {
            self.after_mutation(now, Vec::new());
        }
        decision
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn add_listener(&mut self, listener: Listener) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    fn apply_transition(&mut self, transition: Transition, now: i64) -> Option<RecordOutcome> {
        let mut events = Vec::new();
        let recorded = transition
            .completion
            .as_ref()
            .map(|completion| self.record(completion, now, &mut events));

        let (from, to, skipped) = (transition.from, transition.to, transition.skipped);
        self.machine.commit(transition);
        debug!(from = from.label(), to = to.label(), skipped, "session advanced");

        events.push(Event::SessionAdvanced {
            from,
            to,
            skipped,
            at: crate::datetime_from_ms(now),
        });
        self.after_mutation(now, events);
        recorded
    }

    fn record(&mut self, completion: &CompletionEvent, now: i64, events: &mut Vec<Event>) -> RecordOutcome {
        let outcome = self.recorder.record(completion, now);
        if outcome == RecordOutcome::Forwarded {
            if let Err(e) = self.gateway.save_stats(self.recorder.stats()) {
                warn!(error = %e, "failed to persist stats");
            }
            events.push(Event::WorkCompleted {
                completion: completion.clone(),
                at: crate::datetime_from_ms(now),
            });
        }
        outcome
    }

    fn after_mutation(&mut self, now: i64, mut events: Vec<Event>) {
        let snapshot = self.machine.snapshot().clone();
        if let Err(e) = self.gateway.save_snapshot(&snapshot) {
            warn!(error = %e, "failed to persist session snapshot");
        }
        events.push(Event::SnapshotChanged {
            snapshot,
            at: crate::datetime_from_ms(now),
        });
        self.emit_all(&events);
    }

    fn emit_all(&mut self, events: &[Event]) {
        for event in events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(event);
            }
        }
    }
}
