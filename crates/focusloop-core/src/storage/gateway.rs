use tracing::warn;

use super::KeyValueStore;
use crate::completion::LocalStats;
use crate::error::Result;
use crate::timer::{PersistedSnapshot, SessionSnapshot};

pub const SNAPSHOT_KEY: &str = "focusloop.session";
pub const STATS_KEY: &str = "focusloop.stats";

/// JSON (de)serialization of engine state over a [`KeyValueStore`].
///
/// Reads never fail: unreadable data is reported as malformed so recovery
/// can default it.
pub struct PersistenceGateway {
    store: Box<dyn KeyValueStore>,
}

impl PersistenceGateway {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load_snapshot(&self) -> PersistedSnapshot {
        match self.store.get(SNAPSHOT_KEY) {
            Ok(None) => PersistedSnapshot::Missing,
            Ok(Some(json)) => match serde_json::from_str::<SessionSnapshot>(&json) {
                Ok(snapshot) => PersistedSnapshot::Found(snapshot),
                Err(e) => PersistedSnapshot::Malformed(e.to_string()),
            },
            Err(e) => PersistedSnapshot::Malformed(e.to_string()),
        }
    }

    pub fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.store.set(SNAPSHOT_KEY, &json)?;
        Ok(())
    }

    pub fn load_stats(&self) -> LocalStats {
        match self.store.get(STATS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, "discarding malformed stats");
                LocalStats::default()
            }),
            Ok(None) => LocalStats::default(),
            Err(e) => {
                warn!(error = %e, "could not read stats");
                LocalStats::default()
            }
        }
    }

    pub fn save_stats(&self, stats: &LocalStats) -> Result<()> {
        let json = serde_json::to_string(stats)?;
        self.store.set(STATS_KEY, &json)?;
        Ok(())
    }
}
