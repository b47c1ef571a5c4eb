//! The war registry - owner of every war record
//!
//! All shared war state lives behind one mutex: the id → record map, the
//! derived faction → war index, and the id counter. Readers copy records out
//! and evaluate phases after releasing the lock; nothing that calls into the
//! host runs while the lock is held.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::config::WarConfig;
use crate::core::error::{Result, TribeWarError};
use crate::core::types::{FactionId, Timestamp, WarId};
use crate::war::record::{Phase, Side, WarRecord};

/// Registry contents as written to and read from durable storage
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub next_war_id: u64,
    pub wars: Vec<WarRecord>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self {
            next_war_id: 1,
            wars: Vec::new(),
        }
    }
}

/// A war seen from one faction, possibly through an alliance
#[derive(Debug, Clone, PartialEq)]
pub struct SideView {
    pub war: WarRecord,
    /// The war participant whose side the faction is on
    pub side_root: FactionId,
}

/// Result of a cancellation request
#[derive(Debug, Clone, PartialEq)]
pub struct CancelRequested {
    pub war: WarRecord,
    pub requester: FactionId,
    pub opponent: FactionId,
}

/// Result of accepting a cancellation
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    /// The faction has no open, unended war
    NoOpenWar,
    /// Flag recorded; the other side has not agreed yet
    AwaitingOpponent(WarRecord),
    /// Both sides agreed; the war ended and cooldown started
    Ended(WarRecord),
}

/// What the timer decided about one record during a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visit {
    pub changed: bool,
    pub remove: bool,
}

/// Summary of a sweep over all records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub changed: bool,
    pub removed: Vec<WarId>,
}

struct RegistryState {
    wars: AHashMap<WarId, WarRecord>,
    faction_index: AHashMap<FactionId, WarId>,
    next_war_id: u64,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            wars: AHashMap::new(),
            faction_index: AHashMap::new(),
            next_war_id: 1,
        }
    }

    /// Rebuild the faction index from scratch; never patched incrementally
    fn rebuild_index(&mut self, now: Timestamp) {
        self.faction_index.clear();
        for war in self.wars.values() {
            if war.phase(now) == Phase::None {
                continue;
            }
            for faction in [war.faction_a, war.faction_b] {
                let slot = self.faction_index.entry(faction).or_insert(war.war_id);
                // Newest war wins when a stale one is still inside its window
                if war.war_id > *slot {
                    *slot = war.war_id;
                }
            }
        }
    }

    fn has_open_war(&self, faction: FactionId, now: Timestamp) -> bool {
        self.wars
            .values()
            .any(|war| war.side_of(faction).is_some() && war.phase(now).is_open())
    }

    fn indexed_war(&self, faction: FactionId) -> Option<&WarRecord> {
        let war_id = self.faction_index.get(&faction)?;
        self.wars.get(war_id)
    }

    fn indexed_war_mut(&mut self, faction: FactionId) -> Option<&mut WarRecord> {
        let war_id = *self.faction_index.get(&faction)?;
        self.wars.get_mut(&war_id)
    }

    fn allocate_id(&mut self) -> WarId {
        // Skip ids still held by loaded records
        while self.wars.contains_key(&WarId(self.next_war_id)) || self.next_war_id == 0 {
            self.next_war_id += 1;
        }
        let id = WarId(self.next_war_id);
        self.next_war_id += 1;
        id
    }
}

/// Thread-safe registry of all wars
pub struct WarRegistry {
    state: Mutex<RegistryState>,
    dirty: AtomicBool,
    war_delay_seconds: i64,
    cooldown_seconds: i64,
}

impl WarRegistry {
    pub fn new(war_delay_seconds: i64, cooldown_seconds: i64) -> Self {
        Self {
            state: Mutex::new(RegistryState::new()),
            dirty: AtomicBool::new(false),
            war_delay_seconds,
            cooldown_seconds,
        }
    }

    pub fn from_config(config: &WarConfig) -> Self {
        Self::new(config.war_delay_seconds, config.cooldown_seconds)
    }

    pub fn war_delay_seconds(&self) -> i64 {
        self.war_delay_seconds
    }

    pub fn cooldown_seconds(&self) -> i64 {
        self.cooldown_seconds
    }

    /// Create a new Pending war between `a` and `b`
    ///
    /// Fails with `FactionEngaged` when either faction already has an open
    /// war, checked under the same lock that inserts the record. The rest of
    /// eligibility (alliances, online targets, leadership) is the caller's.
    pub fn declare_war(&self, a: FactionId, b: FactionId, now: Timestamp) -> Result<WarRecord> {
        let record = {
            let mut state = self.state.lock();
            if let Some(busy) = [a, b].into_iter().find(|f| state.has_open_war(*f, now)) {
                return Err(TribeWarError::FactionEngaged(busy));
            }
            let war_id = state.allocate_id();
            let record = WarRecord::declare(war_id, a, b, now, self.war_delay_seconds)?;
            state.wars.insert(war_id, record.clone());
            state.rebuild_index(now);
            record
        };
        self.mark_dirty();

        tracing::info!(
            war_id = record.war_id.0,
            faction_a = a.0,
            faction_b = b.0,
            start_at = record.start_at,
            "War declared"
        );
        Ok(record)
    }

    /// Seed a war only if the registry holds no wars at all
    pub fn seed_if_empty(
        &self,
        a: FactionId,
        b: FactionId,
        now: Timestamp,
    ) -> Result<Option<WarRecord>> {
        let record = {
            let mut state = self.state.lock();
            if !state.wars.is_empty() {
                return Ok(None);
            }
            let war_id = state.allocate_id();
            let record = WarRecord::declare(war_id, a, b, now, self.war_delay_seconds)?;
            state.wars.insert(war_id, record.clone());
            state.rebuild_index(now);
            record
        };
        self.mark_dirty();
        Ok(Some(record))
    }

    /// The faction's open war, if any
    ///
    /// The index is only rebuilt on structural changes, so the phase is
    /// re-checked here against `now`.
    pub fn war_for_faction(&self, faction: FactionId, now: Timestamp) -> Option<WarRecord> {
        let war = {
            let state = self.state.lock();
            state.indexed_war(faction)?.clone()
        };
        war.phase(now).is_open().then_some(war)
    }

    pub fn war_by_id(&self, war_id: WarId) -> Option<WarRecord> {
        self.state.lock().wars.get(&war_id).cloned()
    }

    /// The war a faction takes part in, directly or through an ally
    ///
    /// `allied` is called after the registry lock is released.
    pub fn war_for_side(
        &self,
        faction: FactionId,
        now: Timestamp,
        allied: impl Fn(FactionId, FactionId) -> bool,
    ) -> Option<SideView> {
        if faction.is_none() {
            return None;
        }

        if let Some(war) = self.war_for_faction(faction, now) {
            let side_root = faction;
            return Some(SideView { war, side_root });
        }

        let on_side = |side: FactionId| faction == side || allied(faction, side);
        self.open_wars(now).into_iter().find_map(|war| {
            let on_a = on_side(war.faction_a);
            let on_b = on_side(war.faction_b);
            if on_a == on_b {
                return None;
            }
            let side_root = if on_a { war.faction_a } else { war.faction_b };
            Some(SideView { war, side_root })
        })
    }

    /// Is this faction's own cooldown deadline still ahead?
    pub fn is_in_cooldown(&self, faction: FactionId, now: Timestamp) -> bool {
        let Some(war) = self.war_for_faction(faction, now) else {
            return false;
        };
        if war.phase(now) != Phase::Cooldown {
            return false;
        }
        war.cooldown_end_for(faction).is_some_and(|end| now < end)
    }

    /// Is there an open war or cooldown involving this faction?
    pub fn is_engaged(&self, faction: FactionId, now: Timestamp) -> bool {
        self.war_for_faction(faction, now).is_some() || self.is_in_cooldown(faction, now)
    }

    pub fn has_incoming_cancel(&self, faction: FactionId, now: Timestamp) -> bool {
        self.war_for_faction(faction, now)
            .is_some_and(|war| war.has_incoming_cancel(faction))
    }

    /// Flag that this faction wants to cancel its open war
    ///
    /// No-op (returns `None`) when there is no unended war. Idempotent.
    pub fn request_cancel(&self, faction: FactionId, now: Timestamp) -> Option<CancelRequested> {
        let requested = {
            let mut state = self.state.lock();
            let war = state.indexed_war_mut(faction)?;
            if war.is_ended() || !war.phase(now).is_open() {
                return None;
            }
            war.mark_cancel(faction);
            let opponent = war.opponent_of(faction)?;
            CancelRequested {
                war: war.clone(),
                requester: faction,
                opponent,
            }
        };
        self.mark_dirty();

        tracing::info!(
            war_id = requested.war.war_id.0,
            faction = faction.0,
            "War cancellation requested"
        );
        Some(requested)
    }

    /// Agree to cancel; ends the war once both sides have agreed
    pub fn accept_cancel(&self, faction: FactionId, now: Timestamp) -> Result<AcceptOutcome> {
        let outcome = {
            let mut state = self.state.lock();
            let Some(war) = state.indexed_war_mut(faction) else {
                return Ok(AcceptOutcome::NoOpenWar);
            };
            if war.is_ended() || !war.phase(now).is_open() {
                return Ok(AcceptOutcome::NoOpenWar);
            }

            war.mark_cancel(faction);
            if war.cancel_requested_by_a && war.cancel_requested_by_b {
                war.end(now, self.cooldown_seconds)?;
                let ended = war.clone();
                state.rebuild_index(now);
                AcceptOutcome::Ended(ended)
            } else {
                AcceptOutcome::AwaitingOpponent(war.clone())
            }
        };
        self.mark_dirty();

        if let AcceptOutcome::Ended(war) = &outcome {
            tracing::info!(
                war_id = war.war_id.0,
                cooldown_end = war.cooldown_end_a,
                "War cancelled by mutual consent"
            );
        }
        Ok(outcome)
    }

    /// Erase a war; used only by garbage collection
    pub fn remove_war(&self, war_id: WarId, now: Timestamp) -> Option<WarRecord> {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.wars.remove(&war_id);
            state.rebuild_index(now);
            removed
        };
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Copies of every war currently Active
    pub fn active_wars(&self, now: Timestamp) -> Vec<WarRecord> {
        let state = self.state.lock();
        state
            .wars
            .values()
            .filter(|war| war.phase(now) == Phase::Active)
            .cloned()
            .collect()
    }

    /// Copies of every war not yet decayed to `Phase::None`
    pub fn open_wars(&self, now: Timestamp) -> Vec<WarRecord> {
        let state = self.state.lock();
        let mut wars: Vec<WarRecord> = state
            .wars
            .values()
            .filter(|war| war.phase(now).is_open())
            .cloned()
            .collect();
        wars.sort_by_key(|war| war.war_id);
        wars
    }

    pub fn len(&self) -> usize {
        self.state.lock().wars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().wars.is_empty()
    }

    pub fn next_war_id(&self) -> u64 {
        self.state.lock().next_war_id
    }

    /// Consistent copy of the whole registry, ordered by war id
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock();
        let mut wars: Vec<WarRecord> = state.wars.values().cloned().collect();
        wars.sort_by_key(|war| war.war_id);
        RegistrySnapshot {
            next_war_id: state.next_war_id,
            wars,
        }
    }

    /// Replace the registry contents with a loaded snapshot
    pub fn restore(&self, snapshot: RegistrySnapshot, now: Timestamp) {
        let mut state = self.state.lock();
        state.wars.clear();
        for war in snapshot.wars {
            state.wars.insert(war.war_id, war);
        }
        let max_id = state.wars.keys().map(|id| id.0).max().unwrap_or(0);
        state.next_war_id = snapshot.next_war_id.max(max_id + 1).max(1);
        state.rebuild_index(now);
    }

    /// Drop everything and reset the counter
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.wars.clear();
        state.faction_index.clear();
        state.next_war_id = 1;
    }

    /// Visit every record under the lock, then remove the ones marked
    ///
    /// Visits work on copies. The copies are written back only when every
    /// visit succeeded, so a failing sweep leaves the registry untouched.
    /// Removal happens after the write-back, followed by a single index
    /// rebuild.
    pub(crate) fn sweep(
        &self,
        now: Timestamp,
        mut visit: impl FnMut(&mut WarRecord) -> Result<Visit>,
    ) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();
        {
            let mut state = self.state.lock();
            let mut updated = Vec::new();
            for (war_id, war) in state.wars.iter() {
                let mut copy = war.clone();
                let outcome = visit(&mut copy)?;
                if outcome.changed {
                    summary.changed = true;
                    updated.push(copy);
                }
                if outcome.remove {
                    summary.removed.push(*war_id);
                }
            }

            for war in updated {
                state.wars.insert(war.war_id, war);
            }
            for war_id in &summary.removed {
                state.wars.remove(war_id);
            }
            if summary.changed || !summary.removed.is_empty() {
                state.rebuild_index(now);
            }
        }

        if summary.changed || !summary.removed.is_empty() {
            self.mark_dirty();
        }
        summary.removed.sort();
        Ok(summary)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Clear and return the dirty flag
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }
}

/// Side of a faction in a war, counting alliances
pub fn alliance_side(
    war: &WarRecord,
    faction: FactionId,
    allied: impl Fn(FactionId, FactionId) -> bool,
) -> (bool, bool) {
    let on = |side: Side| {
        let root = war.faction_on(side);
        faction == root || (!faction.is_none() && allied(faction, root))
    };
    (on(Side::A), on(Side::B))
}
