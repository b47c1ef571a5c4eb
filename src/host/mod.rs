//! Boundary to the game server hosting the war system
//!
//! Everything the engine knows about players, factions and alliances is read
//! through [`GameHost`]. Calls may fail inside the engine (invalidated actors,
//! missing data); implementations report such failures as "no data" rather
//! than erroring. Faction ids returned here are already canonical.

pub mod memory;

use crate::core::types::{ActorId, FactionId};
use crate::notify::MessageStyle;

/// Read-only oracles plus the message sink provided by the host engine
pub trait GameHost: Send + Sync {
    /// Is the engine ready to answer queries and deliver messages?
    fn is_ready(&self) -> bool;

    /// Faction of a player; `None` for no faction or an invalid actor
    fn faction_of(&self, actor: ActorId) -> Option<FactionId>;

    fn are_allied(&self, a: FactionId, b: FactionId) -> bool;

    /// Strict leadership flags (admin, founder, owner)
    fn is_leader_or_admin(&self, actor: ActorId) -> bool;

    /// Plain membership with valid faction data
    fn is_member(&self, actor: ActorId) -> bool;

    fn is_any_member_online(&self, faction: FactionId) -> bool;

    /// Registered member count, `None` when unknown
    fn member_count(&self, faction: FactionId) -> Option<u32>;

    /// Every faction the engine currently knows about
    fn known_factions(&self) -> Vec<FactionId>;

    fn faction_name(&self, faction: FactionId) -> Option<String>;

    fn online_players(&self) -> Vec<ActorId>;

    fn send_message(&self, actor: ActorId, text: &str, style: MessageStyle);
}
