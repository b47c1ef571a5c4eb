//! In-memory game host
//!
//! Backs the console binary and the test suites. Players, factions and
//! alliances are set up explicitly; every delivered message is recorded.

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::types::{ActorId, FactionId};
use crate::host::GameHost;
use crate::notify::MessageStyle;
use crate::promo::{ItemGranter, PromoEntry};

/// A message delivered to a player
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub actor: ActorId,
    pub text: String,
    pub style: MessageStyle,
}

/// An item handed out through [`ItemGranter`]
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedItem {
    pub player_key: u64,
    pub blueprint: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
struct Player {
    faction: Option<FactionId>,
    leader: bool,
    online: bool,
}

#[derive(Debug, Default)]
struct HostState {
    players: AHashMap<ActorId, Player>,
    names: AHashMap<FactionId, String>,
    /// Factions registered without any player (e.g. abandoned ones)
    empty_factions: AHashSet<FactionId>,
    alliances: AHashSet<(FactionId, FactionId)>,
}

impl HostState {
    fn members(&self, faction: FactionId) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(move |p| p.faction == Some(faction))
    }
}

/// Host implementation holding the whole world in memory
pub struct InMemoryHost {
    state: RwLock<HostState>,
    sent: Mutex<Vec<SentMessage>>,
    granted: Mutex<Vec<GrantedItem>>,
    ready: AtomicBool,
    grants_fail: AtomicBool,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HostState::default()),
            sent: Mutex::new(Vec::new()),
            granted: Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
            grants_fail: AtomicBool::new(false),
        }
    }

    /// Register an online player in `faction`
    pub fn add_player(&self, actor: ActorId, faction: FactionId, leader: bool) {
        let faction = (!faction.is_none()).then_some(faction);
        let mut state = self.state.write();
        if let Some(f) = faction {
            state.empty_factions.remove(&f);
        }
        state.players.insert(
            actor,
            Player {
                faction,
                leader,
                online: true,
            },
        );
    }

    pub fn remove_player(&self, actor: ActorId) {
        self.state.write().players.remove(&actor);
    }

    pub fn set_online(&self, actor: ActorId, online: bool) {
        if let Some(player) = self.state.write().players.get_mut(&actor) {
            player.online = online;
        }
    }

    pub fn set_leader(&self, actor: ActorId, leader: bool) {
        if let Some(player) = self.state.write().players.get_mut(&actor) {
            player.leader = leader;
        }
    }

    /// Register a faction that has no members
    pub fn add_empty_faction(&self, faction: FactionId) {
        if !faction.is_none() {
            self.state.write().empty_factions.insert(faction);
        }
    }

    pub fn set_faction_name(&self, faction: FactionId, name: impl Into<String>) {
        self.state.write().names.insert(faction, name.into());
    }

    pub fn set_allied(&self, a: FactionId, b: FactionId) {
        let mut state = self.state.write();
        state.alliances.insert((a, b));
        state.alliances.insert((b, a));
    }

    pub fn break_alliance(&self, a: FactionId, b: FactionId) {
        let mut state = self.state.write();
        state.alliances.remove(&(a, b));
        state.alliances.remove(&(b, a));
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every following item grant fail
    pub fn set_grants_fail(&self, fail: bool) {
        self.grants_fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn messages_for(&self, actor: ActorId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.actor == actor)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Remove and return every recorded message
    pub fn take_messages(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Discard recorded messages
    pub fn clear_messages(&self) {
        self.sent.lock().clear();
    }

    pub fn granted_items(&self) -> Vec<GrantedItem> {
        self.granted.lock().clone()
    }
}

impl GameHost for InMemoryHost {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn faction_of(&self, actor: ActorId) -> Option<FactionId> {
        self.state.read().players.get(&actor)?.faction
    }

    fn are_allied(&self, a: FactionId, b: FactionId) -> bool {
        if a.is_none() || b.is_none() {
            return false;
        }
        self.state.read().alliances.contains(&(a, b))
    }

    fn is_leader_or_admin(&self, actor: ActorId) -> bool {
        self.state
            .read()
            .players
            .get(&actor)
            .is_some_and(|p| p.leader && p.faction.is_some())
    }

    fn is_member(&self, actor: ActorId) -> bool {
        self.faction_of(actor).is_some()
    }

    fn is_any_member_online(&self, faction: FactionId) -> bool {
        self.state.read().members(faction).any(|p| p.online)
    }

    fn member_count(&self, faction: FactionId) -> Option<u32> {
        let state = self.state.read();
        let count = state.members(faction).count() as u32;
        if count == 0 && !state.empty_factions.contains(&faction) {
            return None;
        }
        Some(count)
    }

    fn known_factions(&self) -> Vec<FactionId> {
        let state = self.state.read();
        let mut factions: Vec<FactionId> = state
            .players
            .values()
            .filter_map(|p| p.faction)
            .chain(state.empty_factions.iter().copied())
            .collect();
        factions.sort();
        factions.dedup();
        factions
    }

    fn faction_name(&self, faction: FactionId) -> Option<String> {
        self.state.read().names.get(&faction).cloned()
    }

    fn online_players(&self) -> Vec<ActorId> {
        let state = self.state.read();
        let mut players: Vec<ActorId> = state
            .players
            .iter()
            .filter(|(_, p)| p.online)
            .map(|(id, _)| *id)
            .collect();
        players.sort();
        players
    }

    fn send_message(&self, actor: ActorId, text: &str, style: MessageStyle) {
        tracing::debug!(actor = actor.0, "{}", text);
        self.sent.lock().push(SentMessage {
            actor,
            text: text.to_string(),
            style,
        });
    }
}

impl ItemGranter for InMemoryHost {
    fn grant_item(&self, player_key: u64, entry: &PromoEntry) -> bool {
        if self.grants_fail.load(Ordering::SeqCst) {
            return false;
        }
        self.granted.lock().push(GrantedItem {
            player_key,
            blueprint: entry.blueprint.clone(),
            quantity: entry.quantity,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_count_for_known_factions() {
        let host = InMemoryHost::new();
        host.add_player(ActorId(1), FactionId(5), false);
        host.add_empty_faction(FactionId(6));

        assert_eq!(host.member_count(FactionId(5)), Some(1));
        assert_eq!(host.member_count(FactionId(6)), Some(0));
        assert_eq!(host.member_count(FactionId(7)), None);
        assert_eq!(host.known_factions(), vec![FactionId(5), FactionId(6)]);
    }

    #[test]
    fn test_leadership_requires_faction() {
        let host = InMemoryHost::new();
        host.add_player(ActorId(1), FactionId::NONE, true);
        host.add_player(ActorId(2), FactionId(3), true);
        assert!(!host.is_leader_or_admin(ActorId(1)));
        assert!(host.is_leader_or_admin(ActorId(2)));
        assert!(!host.is_member(ActorId(1)));
    }

    #[test]
    fn test_alliances_are_symmetric() {
        let host = InMemoryHost::new();
        host.set_allied(FactionId(1), FactionId(2));
        assert!(host.are_allied(FactionId(2), FactionId(1)));
        host.break_alliance(FactionId(2), FactionId(1));
        assert!(!host.are_allied(FactionId(1), FactionId(2)));
    }
}
