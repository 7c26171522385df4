use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::SessionKind;

/// Width of the coarse timestamp bucket used in dedup keys.
pub const DEDUP_BUCKET_MS: i64 = 5_000;

/// Identity of a completion for deduplication: the task plus a 5-second
/// bucket of the completion timestamp. Untracked work has no task and never
/// matches a tracked one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub task: Option<String>,
    pub bucket: i64,
}

impl DedupKey {
    pub fn new(task_id: Option<&str>, occurred_at_epoch_millis: i64) -> Self {
        Self {
            task: task_id.map(str::to_string),
            bucket: occurred_at_epoch_millis.div_euclid(DEDUP_BUCKET_MS),
        }
    }

    /// Same task and same or neighbouring bucket. Two observers of one tick
    /// can straddle a bucket edge by a few hundred milliseconds.
    pub fn overlaps(&self, other: &DedupKey) -> bool {
        self.task == other.task && (self.bucket - other.bucket).abs() <= 1
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task {
            Some(task) => write!(f, "{task}@{}", self.bucket),
            None => write!(f, "(untracked)@{}", self.bucket),
        }
    }
}

/// A "work interval finished" report. Ephemeral: created at completion,
/// consumed by the recorder, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub task_id: Option<String>,
    pub project_id: Option<String>,
    pub kind: SessionKind,
    pub was_interrupted: bool,
    pub skipped: bool,
    pub occurred_at_epoch_millis: i64,
    pub duration_minutes: u32,
    pub dedup_key: DedupKey,
}

impl CompletionEvent {
    /// A Work interval that ran down to zero (or was marked complete).
    pub fn work_finished(
        task_id: Option<String>,
        project_id: Option<String>,
        duration_minutes: u32,
        occurred_at_epoch_millis: i64,
    ) -> Self {
        let dedup_key = DedupKey::new(task_id.as_deref(), occurred_at_epoch_millis);
        Self {
            task_id,
            project_id,
            kind: SessionKind::Work,
            was_interrupted: false,
            skipped: false,
            occurred_at_epoch_millis,
            duration_minutes,
            dedup_key,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        crate::datetime_from_ms(self.occurred_at_epoch_millis)
    }

    /// Build the outbound backend record.
    pub fn to_record(&self) -> CompletionRecord {
        let end_time = self.occurred_at();
        CompletionRecord {
            task_id: self.task_id.clone(),
            project_id: self.project_id.clone(),
            start_time: end_time - Duration::minutes(i64::from(self.duration_minutes)),
            end_time,
            duration_minutes: self.duration_minutes,
            completed: true,
            interrupted: self.was_interrupted,
        }
    }
}

/// Durable completion record submitted to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub task_id: Option<String>,
    pub project_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub completed: bool,
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_buckets_by_five_seconds() {
        let a = DedupKey::new(Some("T1"), 10_000);
        let b = DedupKey::new(Some("T1"), 14_999);
        let c = DedupKey::new(Some("T1"), 15_000);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.overlaps(&c));
        assert_eq!(a.to_string(), "T1@2");
    }

    #[test]
    fn untracked_work_never_matches_a_tracked_task() {
        let key = DedupKey::new(None, 0);
        assert!(key.task.is_none());
        assert!(key.overlaps(&DedupKey::new(None, 1_000)));
        assert!(!key.overlaps(&DedupKey::new(Some("T1"), 0)));
        assert!(!key.overlaps(&DedupKey::new(Some("-"), 0)));
    }

    #[test]
    fn record_spans_the_work_duration() {
        let event = CompletionEvent::work_finished(
            Some("T1".into()),
            Some("P1".into()),
            25,
            1_700_000_000_000,
        );
        let record = event.to_record();
        assert_eq!((record.end_time - record.start_time).num_minutes(), 25);
        assert!(record.completed);
        assert!(!record.interrupted);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["taskId"], "T1");
        assert_eq!(json["durationMinutes"], 25);
    }
}
