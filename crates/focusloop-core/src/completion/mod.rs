//! Completion accounting: dedup, backend submission and local stats.

mod backend;
mod event;
mod recorder;
mod stats;

pub use backend::{CompletionSink, HttpBackend, OfflineSink, DEFAULT_TIMEOUT};
pub use event::{CompletionEvent, CompletionRecord, DedupKey, DEDUP_BUCKET_MS};
pub use recorder::{
    CompletionRecorder, DedupCache, RecordOutcome, RejectReason, DEDUP_CAPACITY, DEDUP_WINDOW_MS,
};
pub use stats::{LocalStats, XP_PER_MINUTE};
