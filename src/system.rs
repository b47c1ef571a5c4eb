//! The war system as seen by the host
//!
//! `TribeWarSystem` owns every piece of war state and exposes the entry
//! points a game server calls: the periodic timer, the structure damage hook,
//! chat commands, the structure menu, and shutdown.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::{parse_chat, MenuEntry, PendingActions, WarCommands};
use crate::core::clock::Clock;
use crate::core::config::WarConfig;
use crate::core::types::{ActorId, FactionId, Timestamp};
use crate::host::GameHost;
use crate::names::NameCache;
use crate::notify::NotificationQueue;
use crate::persistence::{SaveDebouncer, WarStore};
use crate::war::abandoned::AbandonedTracker;
use crate::war::authorization::{DamageAuthorizer, DamageDecision, DamageTarget};
use crate::war::registry::WarRegistry;
use crate::war::timer::{TickReport, TimerDriver};

pub const CONFIG_FILE: &str = "config.json";

pub struct TribeWarSystem {
    config: WarConfig,
    data_dir: PathBuf,
    host: Arc<dyn GameHost>,
    clock: Arc<dyn Clock>,
    registry: WarRegistry,
    timer: TimerDriver,
    queue: NotificationQueue,
    abandoned: AbandonedTracker,
    names: NameCache,
    store: WarStore,
    debouncer: SaveDebouncer,
    menu: PendingActions,
}

impl TribeWarSystem {
    /// Start from the files in `data_dir`, creating defaults where missing
    pub fn init(data_dir: &Path, host: Arc<dyn GameHost>, clock: Arc<dyn Clock>) -> Self {
        if let Err(e) = fs::create_dir_all(data_dir) {
            tracing::warn!("Failed to create data dir {}: {}", data_dir.display(), e);
        }
        let config = WarConfig::load_or_create(&data_dir.join(CONFIG_FILE));
        Self::with_config(config, data_dir, host, clock)
    }

    /// Start with an explicit config; war data and names still come from disk
    pub fn with_config(
        config: WarConfig,
        data_dir: &Path,
        host: Arc<dyn GameHost>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!("Invalid war config: {}", e);
        }

        let system = Self {
            registry: WarRegistry::from_config(&config),
            timer: TimerDriver::from_config(&config),
            queue: NotificationQueue::new(),
            abandoned: AbandonedTracker::new(),
            names: NameCache::in_dir(data_dir),
            store: WarStore::in_dir(data_dir),
            debouncer: SaveDebouncer::new(config.save_interval_seconds),
            menu: PendingActions::new(),
            data_dir: data_dir.to_path_buf(),
            config,
            host,
            clock,
        };

        let now = system.now();
        let report = system.store.load(&system.registry, now);
        if report.missing {
            system.registry.mark_dirty();
        }
        system.names.load();
        system.seed_self_test(now);

        tracing::info!(
            wars = system.registry.len(),
            delay = system.config.war_delay_seconds,
            cooldown = system.config.cooldown_seconds,
            menu = system.config.enable_multiuse_menu,
            self_test = system.config.self_test,
            "Tribe war system initialized"
        );
        system
    }

    fn seed_self_test(&self, now: Timestamp) {
        if !self.config.self_test {
            return;
        }
        self.registry.mark_dirty();

        let (a, b) = self.config.self_test_factions();
        if a.is_none() || b.is_none() || a == b {
            return;
        }
        match self.registry.seed_if_empty(a, b, now) {
            Ok(Some(war)) => tracing::info!(
                target: "tribe_war::self_test",
                war_id = war.war_id.0,
                faction_a = a.0,
                faction_b = b.0,
                start_in = self.config.war_delay_seconds,
                "Seeded self-test war"
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!(target: "tribe_war::self_test", "Failed to seed self-test war: {}", e),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn config(&self) -> &WarConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry(&self) -> &WarRegistry {
        &self.registry
    }

    pub fn timer(&self) -> &TimerDriver {
        &self.timer
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn names(&self) -> &NameCache {
        &self.names
    }

    pub fn abandoned(&self) -> &AbandonedTracker {
        &self.abandoned
    }

    pub fn store(&self) -> &WarStore {
        &self.store
    }

    pub fn commands(&self) -> WarCommands<'_> {
        WarCommands {
            config: &self.config,
            registry: &self.registry,
            host: self.host.as_ref(),
            names: &self.names,
            queue: &self.queue,
        }
    }

    /// Periodic callback from the host's main thread
    pub fn on_timer(&self) -> Option<TickReport> {
        let now = self.now();
        let host = self.host.as_ref();

        self.names.refresh(host);
        if let Some(window) = self.config.abandoned_window() {
            if host.is_ready() {
                self.abandoned.refresh(host, now, window);
            }
        }

        let report = self.timer.tick(&self.registry, now);
        if let Some(report) = &report {
            self.queue.extend(report.notifications.iter().cloned());
        }
        self.queue.flush(host);

        if let Err(e) = self.debouncer.flush_if_needed(&self.store, &self.registry, now) {
            tracing::warn!("Failed to save war data: {}", e);
        }
        if let Err(e) = self.names.save_if_dirty() {
            tracing::warn!("Failed to save faction names: {}", e);
        }
        report
    }

    /// Structure damage hook
    pub fn on_structure_damage(&self, target: DamageTarget<'_>, attacker: FactionId) -> DamageDecision {
        let authorizer = DamageAuthorizer {
            config: &self.config,
            registry: &self.registry,
            abandoned: &self.abandoned,
            host: self.host.as_ref(),
        };
        authorizer.check(target, attacker, self.now())
    }

    /// Chat hook; returns false if the line is not a war command
    pub fn handle_chat(&self, actor: ActorId, message: &str) -> bool {
        let Some(command) = parse_chat(message) else {
            return false;
        };
        self.names.refresh(self.host.as_ref());

        let commands = self.commands();
        let outcome = commands.execute(actor, command, self.now());
        commands.reply(actor, &outcome);
        self.queue.flush(self.host.as_ref());
        true
    }

    /// Entries to add to a structure's action menu
    pub fn build_menu(
        &self,
        actor: ActorId,
        structure_owner: Option<FactionId>,
        existing_ids: &[i32],
    ) -> Vec<MenuEntry> {
        self.commands()
            .build_menu(&self.menu, actor, structure_owner, existing_ids, self.now())
    }

    /// Menu selection hook; returns false if the id is not ours
    pub fn select_menu(&self, actor: ActorId, structure_owner: Option<FactionId>, id: i32) -> bool {
        let commands = self.commands();
        let Some(outcome) = commands.select_menu(&self.menu, actor, structure_owner, id, self.now()) else {
            return false;
        };
        commands.reply(actor, &outcome);
        self.queue.flush(self.host.as_ref());
        true
    }

    /// Final save before the host unloads the system
    pub fn shutdown(&self) {
        match self.store.save(&self.registry) {
            Ok(wars) => {
                self.registry.take_dirty();
                tracing::info!(wars, "Saved war data on shutdown");
            }
            Err(e) => tracing::warn!("Failed to save war data on shutdown: {}", e),
        }
        if let Err(e) = self.names.save_if_dirty() {
            tracing::warn!("Failed to save faction names: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::host::memory::InMemoryHost;

    #[test]
    fn test_init_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(InMemoryHost::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let system = TribeWarSystem::init(dir.path(), host, clock);

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(system.config(), &WarConfig::default());
        assert!(system.registry().is_dirty());
    }

    #[test]
    fn test_first_tick_creates_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(InMemoryHost::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let system = TribeWarSystem::with_config(WarConfig::default(), dir.path(), host, clock);

        system.on_timer();
        assert!(system.store().exists());
    }

    #[test]
    fn test_non_war_chat_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(InMemoryHost::new());
        let clock = Arc::new(ManualClock::new(0));
        let system = TribeWarSystem::with_config(WarConfig::default(), dir.path(), host.clone(), clock);

        assert!(!system.handle_chat(ActorId(1), "hello there"));
        assert!(host.sent_messages().is_empty());
    }
}
