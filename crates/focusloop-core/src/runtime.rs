//! Couples a [`FocusEngine`] with a [`Clock`].
//!
//! The engine lives behind one mutex; the clock callback and every command
//! go through it, so only one actor ever mutates the snapshot. The clock
//! runs only while the snapshot says `is_running`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::engine::FocusEngine;
use crate::timer::{Clock, SessionSnapshot, TickControl};

pub struct FocusRuntime {
    engine: Arc<Mutex<FocusEngine>>,
    clock: Clock,
}

impl FocusRuntime {
    /// Wrap the engine and start ticking if it is already running.
    /// Must be called inside a tokio runtime.
    pub fn launch(engine: FocusEngine) -> Self {
        Self::with_clock(engine, Clock::new())
    }

    pub fn with_clock(engine: FocusEngine, clock: Clock) -> Self {
        let mut runtime = Self {
            engine: Arc::new(Mutex::new(engine)),
            clock,
        };
        runtime.sync_clock();
        runtime
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.engine).snapshot().clone()
    }

    pub fn is_ticking(&self) -> bool {
        self.clock.is_running()
    }

    /// Run a command against the engine, then start or stop the clock to
    /// match the resulting snapshot.
    pub fn with_engine<R>(&mut self, f: impl FnOnce(&mut FocusEngine) -> R) -> R {
        let result = {
            let mut engine = lock(&self.engine);
            f(&mut engine)
        };
        self.sync_clock();
        result
    }

    /// Read-only access without touching the clock.
    pub fn inspect<R>(&self, f: impl FnOnce(&FocusEngine) -> R) -> R {
        f(&lock(&self.engine))
    }

    pub fn sync_clock(&mut self) {
        let running = lock(&self.engine).snapshot().is_running;
        if running && !self.clock.is_running() {
            let engine = Arc::clone(&self.engine);
            self.clock.start(move || {
                let mut engine = lock(&engine);
                engine.tick();
                if engine.snapshot().is_running {
                    TickControl::Continue
                } else {
                    TickControl::Stop
                }
            });
        } else if !running && self.clock.is_running() {
            self.clock.stop();
        }
        debug!(running, ticking = self.clock.is_running(), "clock synced");
    }

    /// Stop ticking. The engine keeps its last persisted state.
    pub fn shutdown(&mut self) {
        self.clock.stop();
    }
}

fn lock(engine: &Mutex<FocusEngine>) -> MutexGuard<'_, FocusEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}
