//! Structure damage authorization
//!
//! Called on every structure damage event. The active-wars snapshot is taken
//! once per call under the registry lock and scanned in memory afterwards.
//!
//! Rules, first match wins:
//! 1. Unowned target: allowed at 1.0
//! 2. Excluded blueprint: allowed at 1.0
//! 3. Attacker or owner unresolved: allowed only for abandoned targets
//! 4. Same faction: allowed at 1.0
//! 5. Abandoned target: allowed at the abandoned multiplier
//! 6. Attacker and target on opposing sides of an active war: allowed at the
//!    war multiplier; otherwise denied

use crate::core::config::WarConfig;
use crate::core::types::{FactionId, Timestamp};
use crate::host::GameHost;
use crate::war::abandoned::AbandonedTracker;
use crate::war::record::WarRecord;
use crate::war::registry::{alliance_side, WarRegistry};

/// Outcome of a damage check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageDecision {
    pub allowed: bool,
    /// Factor applied to the incoming damage when allowed
    pub multiplier: f32,
}

impl DamageDecision {
    pub const DENY: DamageDecision = DamageDecision {
        allowed: false,
        multiplier: 1.0,
    };

    pub const ALLOW: DamageDecision = DamageDecision {
        allowed: true,
        multiplier: 1.0,
    };

    pub fn allow_with(multiplier: f32) -> Self {
        Self {
            allowed: true,
            multiplier,
        }
    }

    /// Damage after applying the decision
    pub fn apply(&self, damage: f32) -> f32 {
        if self.allowed {
            damage * self.multiplier
        } else {
            0.0
        }
    }
}

/// What is being damaged
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageTarget<'a> {
    /// Not a faction structure; left to the engine's default rules
    Unowned,
    Structure {
        /// `FactionId::NONE` when the owner could not be resolved
        owner: FactionId,
        blueprint: &'a str,
    },
}

/// Apply the damage rules to an already-taken snapshot of active wars
///
/// `is_abandoned` must return false when the abandoned window is disabled.
pub fn evaluate(
    config: &WarConfig,
    target: DamageTarget<'_>,
    attacker: FactionId,
    active_wars: &[WarRecord],
    is_abandoned: impl Fn(FactionId) -> bool,
    allied: impl Fn(FactionId, FactionId) -> bool,
) -> DamageDecision {
    let (owner, blueprint) = match target {
        DamageTarget::Unowned => return DamageDecision::ALLOW,
        DamageTarget::Structure { owner, blueprint } => (owner, blueprint),
    };

    if config.is_excluded_blueprint(blueprint) {
        return DamageDecision::ALLOW;
    }

    let abandoned = || DamageDecision::allow_with(config.abandoned_structure_damage_multiplier);

    if owner.is_none() || attacker.is_none() {
        if !owner.is_none() && is_abandoned(owner) {
            return abandoned();
        }
        return DamageDecision::DENY;
    }

    if owner == attacker {
        return DamageDecision::ALLOW;
    }

    if is_abandoned(owner) {
        return abandoned();
    }

    for war in active_wars {
        let (attacker_a, attacker_b) = alliance_side(war, attacker, &allied);
        let (target_a, target_b) = alliance_side(war, owner, &allied);
        if (attacker_a && target_b) || (attacker_b && target_a) {
            tracing::trace!(
                war_id = war.war_id.0,
                attacker = attacker.0,
                target = owner.0,
                "Structure damage allowed by war"
            );
            return DamageDecision::allow_with(config.war_damage_multiplier());
        }
    }

    DamageDecision::DENY
}

/// Damage check against live registry state
pub struct DamageAuthorizer<'a> {
    pub config: &'a WarConfig,
    pub registry: &'a WarRegistry,
    pub abandoned: &'a AbandonedTracker,
    pub host: &'a dyn GameHost,
}

impl<'a> DamageAuthorizer<'a> {
    pub fn check(&self, target: DamageTarget<'_>, attacker: FactionId, now: Timestamp) -> DamageDecision {
        if matches!(target, DamageTarget::Unowned) {
            return DamageDecision::ALLOW;
        }
        if !self.host.is_ready() {
            return DamageDecision::DENY;
        }

        let window_enabled = self.config.abandoned_window().is_some();
        let active_wars = self.registry.active_wars(now);
        evaluate(
            self.config,
            target,
            attacker,
            &active_wars,
            |faction| window_enabled && self.abandoned.is_vulnerable(faction, now),
            |a, b| self.host.are_allied(a, b),
        )
    }
}
