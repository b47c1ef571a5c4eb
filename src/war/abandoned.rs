//! Abandoned-faction window tracking
//!
//! A faction observed with zero members becomes damageable by anyone for a
//! configured window. The window restarts every time the faction is seen
//! empty and is dropped as soon as it has members again.

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::core::types::{FactionId, Timestamp};
use crate::host::GameHost;

/// Faction → end of its abandoned window
#[derive(Debug, Default)]
pub struct AbandonedTracker {
    until: Mutex<AHashMap<FactionId, Timestamp>>,
}

impl AbandonedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh windows from the host's member counts
    ///
    /// Member counts are read before the tracker lock is taken.
    pub fn refresh(&self, host: &dyn GameHost, now: Timestamp, window_seconds: i64) {
        if window_seconds <= 0 {
            return;
        }

        let observed: Vec<(FactionId, u32)> = host
            .known_factions()
            .into_iter()
            .filter(|f| !f.is_none())
            .filter_map(|f| host.member_count(f).map(|count| (f, count)))
            .collect();

        let deadline = now.saturating_add(window_seconds);
        let mut until = self.until.lock();
        until.retain(|_, end| *end > now);

        for (faction, members) in observed {
            if members == 0 {
                if !until.contains_key(&faction) {
                    tracing::info!(faction = faction.0, until = deadline, "Faction abandoned");
                }
                until.insert(faction, deadline);
            } else {
                until.remove(&faction);
            }
        }
    }

    /// Is the faction inside its abandoned window?
    pub fn is_vulnerable(&self, faction: FactionId, now: Timestamp) -> bool {
        if faction.is_none() {
            return false;
        }
        self.until
            .lock()
            .get(&faction)
            .is_some_and(|end| now < *end)
    }

    pub fn window_end(&self, faction: FactionId) -> Option<Timestamp> {
        self.until.lock().get(&faction).copied()
    }

    pub fn len(&self) -> usize {
        self.until.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.until.lock().is_empty()
    }

    pub fn clear(&self) {
        self.until.lock().clear();
    }
}
