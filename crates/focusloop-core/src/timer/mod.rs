mod clock;
mod machine;
mod recovery;
mod session;

pub use clock::{
    Clock, DriftCorrector, ManualTimeSource, SystemTimeSource, TickControl, TimeSource,
    TICK_PERIOD,
};
pub use machine::{Attribution, SessionStateMachine, SwitchDecision, TickOutcome, Transition};
pub use recovery::{
    AbandonedTimer, PersistedSnapshot, RecoveryOptions, RecoveryOutcome, RecoveryResolver,
    RecoveryRule,
};
pub use session::{SessionConfig, SessionKind, SessionSnapshot};
