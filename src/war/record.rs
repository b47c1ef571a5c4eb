//! War records and phase derivation
//!
//! A `WarRecord` only stores timestamps and flags. The phase is never stored:
//! it is derived from the record and the current time, so a missed timer tick
//! delays a transition but can never lose it.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TribeWarError};
use crate::core::types::{FactionId, Timestamp, WarId};

/// Derived lifecycle state of a war
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No war, or a war whose cooldown has fully elapsed
    None,
    /// Declared, waiting for `start_at`
    Pending,
    /// Structures of opposing sides are damageable
    Active,
    /// Ended, at least one side's cooldown still running
    Cooldown,
}

impl Phase {
    /// Pending, Active or Cooldown
    pub fn is_open(self) -> bool {
        self != Phase::None
    }
}

/// Which side of a war a faction stands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

/// One war between exactly two factions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarRecord {
    pub war_id: WarId,
    #[serde(alias = "tribe_a")]
    pub faction_a: FactionId,
    #[serde(alias = "tribe_b")]
    pub faction_b: FactionId,
    pub declared_at: Timestamp,
    pub start_at: Timestamp,
    /// 0 while the war has not concluded
    pub ended_at: Timestamp,
    pub cooldown_end_a: Timestamp,
    pub cooldown_end_b: Timestamp,
    pub cancel_requested_by_a: bool,
    pub cancel_requested_by_b: bool,
    pub start_notified: bool,
    pub cooldown_notified: bool,
}

impl WarRecord {
    /// Create a freshly declared war
    pub fn declare(
        war_id: WarId,
        faction_a: FactionId,
        faction_b: FactionId,
        declared_at: Timestamp,
        war_delay_seconds: i64,
    ) -> Result<Self> {
        if faction_a.is_none() || faction_b.is_none() || faction_a == faction_b {
            return Err(TribeWarError::InvalidFactions(faction_a, faction_b));
        }
        let start_at = declared_at
            .checked_add(war_delay_seconds)
            .ok_or(TribeWarError::TimestampOverflow("start_at"))?;

        Ok(Self {
            war_id,
            faction_a,
            faction_b,
            declared_at,
            start_at,
            ended_at: 0,
            cooldown_end_a: 0,
            cooldown_end_b: 0,
            cancel_requested_by_a: false,
            cancel_requested_by_b: false,
            start_notified: false,
            cooldown_notified: false,
        })
    }

    pub fn phase(&self, now: Timestamp) -> Phase {
        phase(self, now)
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at != 0
    }

    /// Structural validity: non-zero id, two distinct real factions
    pub fn is_well_formed(&self) -> bool {
        self.war_id.0 > 0
            && !self.faction_a.is_none()
            && !self.faction_b.is_none()
            && self.faction_a != self.faction_b
    }

    /// Both cooldown deadlines are set and have passed
    pub fn cooldown_elapsed(&self, now: Timestamp) -> bool {
        self.is_ended()
            && self.cooldown_end_a > 0
            && self.cooldown_end_b > 0
            && now >= self.cooldown_end_a
            && now >= self.cooldown_end_b
    }

    /// Direct participation only; alliances are resolved elsewhere
    pub fn side_of(&self, faction: FactionId) -> Option<Side> {
        if faction == self.faction_a {
            Some(Side::A)
        } else if faction == self.faction_b {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn faction_on(&self, side: Side) -> FactionId {
        match side {
            Side::A => self.faction_a,
            Side::B => self.faction_b,
        }
    }

    pub fn opponent_of(&self, faction: FactionId) -> Option<FactionId> {
        match self.side_of(faction)? {
            Side::A => Some(self.faction_b),
            Side::B => Some(self.faction_a),
        }
    }

    pub fn cooldown_end_for(&self, faction: FactionId) -> Option<Timestamp> {
        match self.side_of(faction)? {
            Side::A => Some(self.cooldown_end_a),
            Side::B => Some(self.cooldown_end_b),
        }
    }

    /// Has the *other* side asked to cancel?
    pub fn has_incoming_cancel(&self, faction: FactionId) -> bool {
        match self.side_of(faction) {
            Some(Side::A) => self.cancel_requested_by_b,
            Some(Side::B) => self.cancel_requested_by_a,
            None => false,
        }
    }

    /// Set this faction's cancel flag, returning false for non-participants
    pub fn mark_cancel(&mut self, faction: FactionId) -> bool {
        match self.side_of(faction) {
            Some(Side::A) => self.cancel_requested_by_a = true,
            Some(Side::B) => self.cancel_requested_by_b = true,
            None => return false,
        }
        true
    }

    /// Conclude the war now and start both cooldowns
    pub fn end(&mut self, now: Timestamp, cooldown_seconds: i64) -> Result<()> {
        let cooldown_end = now
            .checked_add(cooldown_seconds)
            .ok_or(TribeWarError::TimestampOverflow("cooldown_end"))?;
        self.ended_at = now;
        self.cooldown_end_a = cooldown_end;
        self.cooldown_end_b = cooldown_end;
        self.cancel_requested_by_a = false;
        self.cancel_requested_by_b = false;
        self.cooldown_notified = false;
        Ok(())
    }

    /// Recompute `start_at` for records that were saved without one
    ///
    /// Returns true if the record changed.
    pub fn repair_start_at(&mut self, now: Timestamp, war_delay_seconds: i64) -> Result<bool> {
        if self.start_at != 0 {
            return Ok(false);
        }
        let base = if self.declared_at != 0 { self.declared_at } else { now };
        self.start_at = base
            .checked_add(war_delay_seconds)
            .ok_or(TribeWarError::TimestampOverflow("start_at"))?;
        Ok(true)
    }

    /// Fill in cooldown deadlines missing from an ended record
    ///
    /// A missing deadline is taken as `ended_at + cooldown_seconds`. Returns
    /// true if the record changed.
    pub fn repair_cooldown_end(&mut self, cooldown_seconds: i64) -> Result<bool> {
        if !self.is_ended() || (self.cooldown_end_a != 0 && self.cooldown_end_b != 0) {
            return Ok(false);
        }
        let cooldown_end = self
            .ended_at
            .checked_add(cooldown_seconds)
            .ok_or(TribeWarError::TimestampOverflow("cooldown_end"))?;
        if self.cooldown_end_a == 0 {
            self.cooldown_end_a = cooldown_end;
        }
        if self.cooldown_end_b == 0 {
            self.cooldown_end_b = cooldown_end;
        }
        Ok(true)
    }
}

/// Derive the phase of a war at `now`
///
/// The start boundary is inclusive: at exactly `start_at` the war is Active.
/// Cooldown lasts while `now` is before either side's deadline.
pub fn phase(record: &WarRecord, now: Timestamp) -> Phase {
    if record.war_id.0 == 0 {
        return Phase::None;
    }

    if record.ended_at == 0 {
        return if now < record.start_at {
            Phase::Pending
        } else {
            Phase::Active
        };
    }

    if now < record.cooldown_end_a || now < record.cooldown_end_b {
        Phase::Cooldown
    } else {
        Phase::None
    }
}
