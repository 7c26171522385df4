use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::completion::CompletionEvent;
use crate::timer::{AbandonedTimer, SessionKind, SessionSnapshot};

/// Notifications emitted by the engine to its subscribers.
/// Presentation and stats collaborators subscribe instead of reading
/// shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Emitted after every mutation, once the snapshot is persisted.
    SnapshotChanged {
        snapshot: SessionSnapshot,
        at: DateTime<Utc>,
    },
    /// A session ended (naturally, skipped, or marked complete) and the
    /// next one is in place.
    SessionAdvanced {
        from: SessionKind,
        to: SessionKind,
        skipped: bool,
        at: DateTime<Utc>,
    },
    /// A genuine Work completion passed dedup and was recorded.
    WorkCompleted {
        completion: CompletionEvent,
        at: DateTime<Utc>,
    },
    /// Recovery found a running Work session it did not resume.
    AbandonedTimerDiscarded {
        timer: AbandonedTimer,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SnapshotChanged { at, .. }
            | Event::SessionAdvanced { at, .. }
            | Event::WorkCompleted { at, .. }
            | Event::AbandonedTimerDiscarded { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SessionConfig;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::SnapshotChanged {
            snapshot: SessionSnapshot::idle_work(&SessionConfig::default(), 0),
            at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "snapshot_changed");
        assert_eq!(json["snapshot"]["currentSessionKind"], "work");
    }
}
