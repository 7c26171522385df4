//! Property tests for the session state machine.

use focusloop_core::timer::{SessionStateMachine, TickOutcome, Transition};
use focusloop_core::{SessionConfig, SessionKind, SwitchDecision};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Start,
    Pause,
    Resume,
    Reset,
    Tick(u16),
    Skip,
    MarkComplete,
    Switch(Option<u8>),
    ConfirmSwitch(Option<u8>),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Start),
        Just(Action::Pause),
        Just(Action::Resume),
        Just(Action::Reset),
        (1u16..200).prop_map(Action::Tick),
        Just(Action::Skip),
        Just(Action::MarkComplete),
        proptest::option::of(0u8..3).prop_map(Action::Switch),
        proptest::option::of(0u8..3).prop_map(Action::ConfirmSwitch),
    ]
}

fn config() -> impl Strategy<Value = SessionConfig> {
    (1u32..4, 1u32..3, 1u32..4, 1u32..6, any::<bool>()).prop_map(
        |(work, short, long, interval, auto)| SessionConfig {
            work_minutes: work,
            short_break_minutes: short,
            long_break_minutes: long,
            long_break_interval_count: interval,
            auto_start_next: auto,
        },
    )
}

fn task(n: Option<u8>) -> Option<String> {
    n.map(|n| format!("T{n}"))
}

/// One session change observed while applying an action.
#[derive(Debug)]
struct Step {
    from: SessionKind,
    to: SessionKind,
    /// Work intervals completed in the cycle before the change.
    cycle_before: u32,
}

fn commit(m: &mut SessionStateMachine, t: Transition, steps: &mut Vec<Step>) {
    steps.push(Step {
        from: t.from,
        to: t.to,
        cycle_before: m.snapshot().completed_work_intervals_in_cycle,
    });
    m.commit(t);
}

fn apply(m: &mut SessionStateMachine, action: &Action, now: &mut i64) -> Vec<Step> {
    let mut steps = Vec::new();
    match action {
        Action::Start => {
            m.start(*now);
        }
        Action::Pause => {
            m.pause(*now);
        }
        Action::Resume => {
            m.resume(*now);
        }
        Action::Reset => m.reset(*now),
        Action::Tick(n) => {
            for _ in 0..*n {
                *now += 1_000;
                if let TickOutcome::Completed(t) = m.tick(*now) {
                    assert_eq!(t.completion.is_some(), t.from == SessionKind::Work);
                    commit(m, t, &mut steps);
                }
            }
        }
        Action::Skip => {
            let t = m.skip(*now);
            assert!(t.completion.is_none());
            commit(m, t, &mut steps);
        }
        Action::MarkComplete => {
            if let Some(t) = m.mark_complete(*now) {
                assert!(t.completion.is_some());
                commit(m, t, &mut steps);
            }
        }
        Action::Switch(n) => {
            m.request_switch(task(*n), None, *now);
        }
        Action::ConfirmSwitch(n) => {
            m.confirm_switch(task(*n), None, *now);
        }
    }
    steps
}

proptest! {
    #[test]
    fn snapshot_stays_well_formed(cfg in config(), actions in prop::collection::vec(action(), 1..60)) {
        let mut m = SessionStateMachine::fresh(cfg.clone(), 0);
        let mut now = 0;
        for a in &actions {
            apply(&mut m, a, &mut now);
            let snap = m.snapshot();
            prop_assert!(snap.validate().is_ok());
            prop_assert!(snap.time_remaining_seconds >= 1);
            prop_assert!(snap.time_remaining_seconds <= cfg.duration_secs(snap.current_session_kind));
            prop_assert!(snap.completed_work_intervals_in_cycle < cfg.long_break_interval_count);
            if snap.current_session_kind.is_break() {
                prop_assert!(snap.task_id.is_none());
                prop_assert!(snap.project_id.is_none());
            }
        }
    }

    #[test]
    fn breaks_follow_the_cycle(cfg in config(), actions in prop::collection::vec(action(), 1..60)) {
        let mut m = SessionStateMachine::fresh(cfg.clone(), 0);
        let mut now = 0;
        for a in &actions {
            for step in apply(&mut m, a, &mut now) {
                let expected = match step.from {
                    SessionKind::Work if (step.cycle_before + 1) % cfg.long_break_interval_count == 0 => {
                        SessionKind::LongBreak
                    }
                    SessionKind::Work => SessionKind::ShortBreak,
                    SessionKind::ShortBreak | SessionKind::LongBreak => SessionKind::Work,
                };
                prop_assert_eq!(step.to, expected);
            }
        }
    }

    #[test]
    fn skip_never_produces_a_completion(cfg in config(), ticks in 0u32..300) {
        let mut m = SessionStateMachine::fresh(cfg, 0);
        m.start(0);
        for i in 0..ticks {
            if let TickOutcome::Completed(t) = m.tick(i64::from(i + 1) * 1_000) {
                m.commit(t);
            }
        }
        let t = m.skip(1_000_000);
        prop_assert!(t.completion.is_none());
        prop_assert!(t.skipped);
    }

    #[test]
    fn switch_is_refused_during_breaks(cfg in config(), n in 0u8..3) {
        let mut m = SessionStateMachine::fresh(cfg, 0);
        let t = m.skip(0);
        m.commit(t);
        prop_assert!(m.kind().is_break());
        prop_assert_eq!(m.request_switch(task(Some(n)), None, 1), SwitchDecision::NotAllowed);
        prop_assert_eq!(m.confirm_switch(task(Some(n)), None, 1), SwitchDecision::NotAllowed);
        prop_assert!(m.snapshot().task_id.is_none());
    }
}
