//! Structure action menu
//!
//! Each time the menu is shown to a player, a fresh table maps the selection
//! ids handed to the host to war actions. A selection is looked up in the
//! player's current table; ids not in it belong to someone else.

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::command::{CommandOutcome, WarCommands};
use crate::core::types::{ActorId, FactionId, Timestamp};

/// Lowest selection id the war menu hands out
pub const FIRST_MENU_ID: i32 = 100;

/// What a menu selection does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Status,
    RequestCancel,
    AcceptCancel,
    DeclareOn(FactionId),
}

/// One entry to add to the host's menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: i32,
    pub label: String,
    pub action: MenuAction,
}

/// Per-player selection tables
#[derive(Debug, Default)]
pub struct PendingActions {
    tables: Mutex<AHashMap<ActorId, AHashMap<i32, MenuAction>>>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the player's table with the entries just shown
    pub fn replace(&self, actor: ActorId, entries: &[MenuEntry]) {
        let table = entries.iter().map(|e| (e.id, e.action)).collect();
        self.tables.lock().insert(actor, table);
    }

    pub fn lookup(&self, actor: ActorId, id: i32) -> Option<MenuAction> {
        self.tables.lock().get(&actor)?.get(&id).copied()
    }

    pub fn clear(&self, actor: ActorId) {
        self.tables.lock().remove(&actor);
    }
}

impl<'a> WarCommands<'a> {
    /// Menu gating: feature flag, faction, leadership, structure ownership
    fn menu_faction(&self, actor: ActorId, structure_owner: Option<FactionId>) -> Option<FactionId> {
        if !self.config.enable_multiuse_menu {
            return None;
        }
        let faction = self.host.faction_of(actor).filter(|f| !f.is_none())?;
        if self.config.multiuse_require_leader && !self.is_leader(actor) {
            tracing::debug!(target: "tribe_war::menu", actor = actor.0, "Menu skipped: not leader");
            return None;
        }
        if self.config.multiuse_require_owned_structure && structure_owner != Some(faction) {
            tracing::debug!(target: "tribe_war::menu", actor = actor.0, "Menu skipped: structure not owned");
            return None;
        }
        Some(faction)
    }

    /// Build the war entries for a structure's action menu
    ///
    /// `existing_ids` are the selection ids the host already uses; new ids
    /// start after the largest of them, and never below [`FIRST_MENU_ID`].
    /// Entries that would need an id past `i32::MAX` are left out.
    pub fn build_menu(
        &self,
        actions: &PendingActions,
        actor: ActorId,
        structure_owner: Option<FactionId>,
        existing_ids: &[i32],
        now: Timestamp,
    ) -> Vec<MenuEntry> {
        let Some(faction) = self.menu_faction(actor, structure_owner) else {
            return Vec::new();
        };

        let max_existing = existing_ids.iter().copied().max().unwrap_or(0);
        // `None` once the id space is used up; later entries are dropped
        let mut next_id = max_existing.checked_add(1).map(|id| id.max(FIRST_MENU_ID));
        let mut entries = Vec::new();
        let mut push = |label: String, action: MenuAction| {
            let Some(id) = next_id else {
                return;
            };
            entries.push(MenuEntry { id, label, action });
            next_id = id.checked_add(1);
        };

        push("Tribe War: Status".into(), MenuAction::Status);

        if self.registry.war_for_faction(faction, now).is_some() {
            push("Tribe War: Cancel".into(), MenuAction::RequestCancel);
            if self.registry.has_incoming_cancel(faction, now) {
                push("Tribe War: Accept cancellation".into(), MenuAction::AcceptCancel);
            }
        }

        if !self.is_engaged(faction, now) {
            for target in self.declare_candidates(faction, now) {
                let label = match self.names.get(target) {
                    Some(name) => format!("Declare war: {}", name),
                    None => format!("Declare war: ID {}", target),
                };
                push(label, MenuAction::DeclareOn(target));
            }
        }

        if next_id.is_none() {
            tracing::debug!(target: "tribe_war::menu", actor = actor.0, "Menu id range exhausted");
        }
        actions.replace(actor, &entries);
        tracing::debug!(
            target: "tribe_war::menu",
            actor = actor.0,
            faction = faction.0,
            entries = entries.len(),
            "Built war menu"
        );
        entries
    }

    /// Factions with members that are free to be declared on
    fn declare_candidates(&self, faction: FactionId, now: Timestamp) -> Vec<FactionId> {
        let limit = self.config.menu_target_limit();
        let mut known = self.host.known_factions();
        known.sort();
        known.dedup();
        known
            .into_iter()
            .filter(|other| !other.is_none() && *other != faction)
            .filter(|other| self.host.member_count(*other).unwrap_or(0) > 0)
            .filter(|other| !self.is_engaged(*other, now))
            .take(limit)
            .collect()
    }

    /// Handle a menu selection
    ///
    /// Returns `None` when the id is not one of ours, so the host can pass the
    /// selection on.
    pub fn select_menu(
        &self,
        actions: &PendingActions,
        actor: ActorId,
        structure_owner: Option<FactionId>,
        id: i32,
        now: Timestamp,
    ) -> Option<CommandOutcome> {
        let action = actions.lookup(actor, id)?;
        let faction = self.menu_faction(actor, structure_owner)?;

        tracing::debug!(target: "tribe_war::menu", actor = actor.0, id, ?action, "Menu selection");
        let outcome = match action {
            MenuAction::Status => Ok(Some(self.status_text(faction, now))),
            MenuAction::RequestCancel => self.request_cancel_for(faction, now),
            MenuAction::AcceptCancel => self.accept_cancel_for(faction, now),
            MenuAction::DeclareOn(target) => self.declare_for(faction, target, now),
        };
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Refusal;
    use crate::core::config::WarConfig;
    use crate::host::memory::InMemoryHost;
    use crate::names::NameCache;
    use crate::notify::NotificationQueue;
    use crate::war::registry::WarRegistry;

    const LEADER: ActorId = ActorId(1);
    const OWN: FactionId = FactionId(10);

    fn host() -> InMemoryHost {
        let host = InMemoryHost::new();
        host.add_player(LEADER, OWN, true);
        host.add_player(ActorId(2), FactionId(20), true);
        host.add_player(ActorId(3), FactionId(30), false);
        host.add_empty_faction(FactionId(40));
        host
    }

    macro_rules! commands {
        ($config:expr, $registry:expr, $host:expr, $names:expr, $queue:expr) => {
            WarCommands {
                config: &$config,
                registry: &$registry,
                host: &$host,
                names: &$names,
                queue: &$queue,
            }
        };
    }

    #[test]
    fn test_menu_lists_status_and_targets() {
        let config = WarConfig::default();
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        names.remember(FactionId(20), "Wolves");
        let queue = NotificationQueue::new();
        let cmds = commands!(config, registry, host, names, queue);
        let actions = PendingActions::new();

        let entries = cmds.build_menu(&actions, LEADER, Some(OWN), &[0, 3], 0);
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Tribe War: Status", "Declare war: Wolves", "Declare war: ID 30"]
        );
        assert_eq!(entries[0].id, 100);
        assert_eq!(entries[2].id, 102);
    }

    #[test]
    fn test_ids_follow_existing_entries() {
        let config = WarConfig::default();
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        let queue = NotificationQueue::new();
        let cmds = commands!(config, registry, host, names, queue);
        let actions = PendingActions::new();

        let entries = cmds.build_menu(&actions, LEADER, Some(OWN), &[150], 0);
        assert_eq!(entries[0].id, 151);
    }

    #[test]
    fn test_menu_gating() {
        let mut config = WarConfig::default();
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        let queue = NotificationQueue::new();
        let actions = PendingActions::new();

        {
            let cmds = commands!(config, registry, host, names, queue);
            assert!(cmds.build_menu(&actions, LEADER, Some(FactionId(20)), &[], 0).is_empty());
            assert!(cmds.build_menu(&actions, ActorId(3), Some(FactionId(30)), &[], 0).is_empty());
        }

        config.multiuse_require_owned_structure = false;
        config.multiuse_require_leader = false;
        let cmds = commands!(config, registry, host, names, queue);
        assert!(!cmds.build_menu(&actions, ActorId(3), None, &[], 0).is_empty());

        config.enable_multiuse_menu = false;
        let cmds = commands!(config, registry, host, names, queue);
        assert!(cmds.build_menu(&actions, LEADER, Some(OWN), &[], 0).is_empty());
    }

    #[test]
    fn test_target_limit() {
        let mut config = WarConfig::default();
        config.multiuse_max_targets = 1;
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        let queue = NotificationQueue::new();
        let cmds = commands!(config, registry, host, names, queue);
        let actions = PendingActions::new();

        let entries = cmds.build_menu(&actions, LEADER, Some(OWN), &[], 0);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_select_declare_and_cancel() {
        let config = WarConfig::default();
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        let queue = NotificationQueue::new();
        let cmds = commands!(config, registry, host, names, queue);
        let actions = PendingActions::new();

        let entries = cmds.build_menu(&actions, LEADER, Some(OWN), &[], 0);
        let declare = entries
            .iter()
            .find(|e| e.action == MenuAction::DeclareOn(FactionId(20)))
            .unwrap();
        assert_eq!(cmds.select_menu(&actions, LEADER, Some(OWN), declare.id, 0), Some(Ok(None)));
        assert!(registry.war_for_faction(OWN, 0).is_some());

        // Selecting the same stale entry again is refused by the eligibility checks
        assert_eq!(
            cmds.select_menu(&actions, LEADER, Some(OWN), declare.id, 0),
            Some(Err(Refusal::AlreadyEngaged))
        );

        let entries = cmds.build_menu(&actions, LEADER, Some(OWN), &[], 0);
        let actions_shown: Vec<MenuAction> = entries.iter().map(|e| e.action).collect();
        assert_eq!(actions_shown, vec![MenuAction::Status, MenuAction::RequestCancel]);
    }

    #[test]
    fn test_foreign_id_not_ours() {
        let config = WarConfig::default();
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        let queue = NotificationQueue::new();
        let cmds = commands!(config, registry, host, names, queue);
        let actions = PendingActions::new();

        cmds.build_menu(&actions, LEADER, Some(OWN), &[], 0);
        assert_eq!(cmds.select_menu(&actions, LEADER, Some(OWN), 7, 0), None);
        assert_eq!(cmds.select_menu(&actions, ActorId(2), Some(FactionId(20)), 100, 0), None);
    }

    #[test]
    fn test_ids_stop_at_the_end_of_the_range() {
        let config = WarConfig::default();
        let registry = WarRegistry::from_config(&config);
        let host = host();
        let names = NameCache::new("unused.json");
        let queue = NotificationQueue::new();
        let cmds = commands!(config, registry, host, names, queue);
        let actions = PendingActions::new();

        assert!(cmds.build_menu(&actions, LEADER, Some(OWN), &[i32::MAX], 0).is_empty());

        let entries = cmds.build_menu(&actions, LEADER, Some(OWN), &[i32::MAX - 2], 0);
        let ids: Vec<i32> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![i32::MAX - 1, i32::MAX]);
        assert_eq!(actions.lookup(LEADER, i32::MAX), Some(entries[1].action));
    }
}
