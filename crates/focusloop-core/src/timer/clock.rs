//! Drift-corrected one-second tick source.
//!
//! [`DriftCorrector`] holds the scheduling arithmetic and is driven purely by
//! the timestamps it is given. [`Clock`] runs it on a tokio task using
//! tokio's `Instant`, so tests can pause and advance time.
//!
//! ## Usage
//!
//! ```ignore
//! let mut clock = Clock::new();
//! clock.start(|| {
//!     engine.lock().unwrap().tick();
//!     TickControl::Continue
//! });
//! // later
//! clock.stop(); // no tick is delivered after this returns
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Wall-clock source for snapshot timestamps.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven time for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicI64,
}

impl ManualTimeSource {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Keeps ticks on a fixed grid without ever bursting to catch up.
///
/// If the host was suspended for longer than one period, the grid is
/// re-anchored at the late callback instead; the lost time is reconciled by
/// recovery, not by replaying ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftCorrector {
    period_ms: u64,
    expected_next_ms: u64,
}

impl DriftCorrector {
    pub fn new(now_ms: u64, period_ms: u64) -> Self {
        Self {
            period_ms,
            expected_next_ms: now_ms.saturating_add(period_ms),
        }
    }

    pub fn expected_next_ms(&self) -> u64 {
        self.expected_next_ms
    }

    /// Lateness of a callback firing at `now_ms`. Negative when early.
    pub fn drift_at(&self, now_ms: u64) -> i64 {
        now_ms as i64 - self.expected_next_ms as i64
    }

    /// Schedule the next expected tick after a callback at `now_ms`.
    pub fn advance(&mut self, now_ms: u64) {
        if self.drift_at(now_ms) > self.period_ms as i64 {
            self.expected_next_ms = now_ms.saturating_add(self.period_ms);
        } else {
            self.expected_next_ms = self.expected_next_ms.saturating_add(self.period_ms);
        }
    }
}

/// What the tick loop should do after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Single-loop tick source.
///
/// Must be started from inside a tokio runtime. Do not call [`Clock::stop`]
/// or [`Clock::start`] while holding a lock the tick callback also takes:
/// `stop` waits for an in-flight callback to return.
#[derive(Debug)]
pub struct Clock {
    period: Duration,
    generation: Arc<Mutex<u64>>,
    handle: Option<JoinHandle<()>>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            generation: Arc::new(Mutex::new(0)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Begin ticking. A previously started loop is stopped first.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        self.stop();
        let generation = {
            let mut current = lock(&self.generation);
            *current += 1;
            *current
        };
        let shared = Arc::clone(&self.generation);
        let period_ms = u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX);
        debug!(generation, period_ms, "clock started");

        self.handle = Some(tokio::spawn(async move {
            let origin = Instant::now();
            let mut corrector = DriftCorrector::new(0, period_ms);
            loop {
                tokio::time::sleep_until(origin + Duration::from_millis(corrector.expected_next_ms()))
                    .await;
                let now_ms = u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX);
                let drift_ms = corrector.drift_at(now_ms);
                trace!(drift_ms, "tick");

                let control = {
                    let current = lock(&shared);
                    if *current != generation {
                        break;
                    }
                    on_tick()
                };
                if control == TickControl::Stop {
                    debug!(generation, "clock stopped by callback");
                    break;
                }
                corrector.advance(now_ms);
            }
        }));
    }

    /// Halt ticking. Returns after any in-flight callback has finished.
    pub fn stop(&mut self) {
        {
            let mut current = lock(&self.generation);
            *current += 1;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("clock stopped");
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(generation: &Mutex<u64>) -> MutexGuard<'_, u64> {
    generation.lock().unwrap_or_else(PoisonError::into_inner)
}
