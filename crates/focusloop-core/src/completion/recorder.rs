//! Exactly-once local accounting of Work completions.
//!
//! Several observers can see the same completion (the tick loop, an explicit
//! "mark complete", a UI reporting what it rendered). The recorder absorbs
//! the duplicates with a small ring of recently recorded keys.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::backend::CompletionSink;
use super::event::{CompletionEvent, DedupKey};
use super::stats::LocalStats;
use crate::timer::SessionKind;

pub const DEDUP_CAPACITY: usize = 10;
pub const DEDUP_WINDOW_MS: i64 = 5_000;

/// Bounded, insertion-ordered set of recently recorded keys. Oldest entries
/// are evicted first.
#[derive(Debug, Clone)]
pub struct DedupCache {
    capacity: usize,
    window_ms: i64,
    entries: VecDeque<(DedupKey, i64)>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEDUP_CAPACITY, DEDUP_WINDOW_MS)
    }
}

impl DedupCache {
    pub fn new(capacity: usize, window_ms: i64) -> Self {
        Self {
            capacity: capacity.max(1),
            window_ms,
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A matching key recorded within the window before `now_ms`.
    pub fn seen_recently(&self, key: &DedupKey, now_ms: i64) -> bool {
        self.entries
            .iter()
            .any(|(k, at)| k.overlaps(key) && (now_ms - at).abs() <= self.window_ms)
    }

    pub fn insert(&mut self, key: DedupKey, now_ms: i64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, now_ms));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Interrupted,
    Skipped,
    NotWork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum RecordOutcome {
    Forwarded,
    Duplicate,
    Rejected(RejectReason),
}

pub struct CompletionRecorder {
    cache: DedupCache,
    backend: Arc<dyn CompletionSink>,
    stats: LocalStats,
}

impl std::fmt::Debug for CompletionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRecorder")
            .field("cache", &self.cache)
            .field("backend", &self.backend.name())
            .field("stats", &self.stats)
            .finish()
    }
}

impl CompletionRecorder {
    pub fn new(backend: Arc<dyn CompletionSink>, stats: LocalStats) -> Self {
        Self::with_cache(backend, stats, DedupCache::default())
    }

    pub fn with_cache(backend: Arc<dyn CompletionSink>, stats: LocalStats, cache: DedupCache) -> Self {
        Self {
            cache,
            backend,
            stats,
        }
    }

    pub fn stats(&self) -> &LocalStats {
        &self.stats
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    /// Forward `event` unless it is not a genuine completion or was already
    /// recorded. `now_ms` is when this report is being handled.
    pub fn record(&mut self, event: &CompletionEvent, now_ms: i64) -> RecordOutcome {
        if let Some(reason) = reject_reason(event) {
            debug!(?reason, key = %event.dedup_key, "completion not counted");
            return RecordOutcome::Rejected(reason);
        }
        if self.cache.seen_recently(&event.dedup_key, now_ms) {
            debug!(key = %event.dedup_key, "duplicate completion absorbed");
            return RecordOutcome::Duplicate;
        }
        self.cache.insert(event.dedup_key.clone(), now_ms);

        if self.backend.is_authenticated() {
            self.backend.submit(event.to_record());
        }
        self.stats.record(event);

        info!(
            task_id = event.task_id.as_deref().unwrap_or("-"),
            total = self.stats.total_count,
            "work interval completed"
        );
        RecordOutcome::Forwarded
    }
}

fn reject_reason(event: &CompletionEvent) -> Option<RejectReason> {
    if event.was_interrupted {
        Some(RejectReason::Interrupted)
    } else if event.skipped {
        Some(RejectReason::Skipped)
    } else if event.kind != SessionKind::Work {
        Some(RejectReason::NotWork)
    } else {
        None
    }
}
