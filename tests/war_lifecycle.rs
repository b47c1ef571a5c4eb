//! War lifecycle integration tests: chat commands, timer ticks and self-test mode

use std::sync::Arc;

use tribe_war::core::clock::ManualClock;
use tribe_war::core::config::WarConfig;
use tribe_war::core::types::{ActorId, FactionId};
use tribe_war::host::memory::InMemoryHost;
use tribe_war::war::authorization::DamageTarget;
use tribe_war::war::record::Phase;
use tribe_war::war::timer::{COOLDOWN_ENDED_TEXT, WAR_STARTED_TEXT};
use tribe_war::TribeWarSystem;

const T0: i64 = 1_700_000_000;
const HOUR: i64 = 3600;

const WOLVES: FactionId = FactionId(10);
const BEARS: FactionId = FactionId(20);
const WOLF_LEADER: ActorId = ActorId(1);
const BEAR_LEADER: ActorId = ActorId(2);
const BEAR_MEMBER: ActorId = ActorId(3);

fn wall(owner: FactionId) -> DamageTarget<'static> {
    DamageTarget::Structure {
        owner,
        blueprint: "/Game/Structures/Stone/Wall.Wall_C",
    }
}

fn world() -> Arc<InMemoryHost> {
    let host = Arc::new(InMemoryHost::new());
    host.add_player(WOLF_LEADER, WOLVES, true);
    host.add_player(BEAR_LEADER, BEARS, true);
    host.add_player(BEAR_MEMBER, BEARS, false);
    host
}

#[test]
fn test_declare_start_cancel_and_decay() {
    let dir = tempfile::tempdir().unwrap();
    let host = world();
    let clock = Arc::new(ManualClock::new(T0));
    let system = TribeWarSystem::with_config(WarConfig::default(), dir.path(), host.clone(), clock.clone());

    // Declaration reaches both sides
    assert!(system.handle_chat(WOLF_LEADER, "/war 20"));
    let wolf_msgs = host.messages_for(WOLF_LEADER);
    assert_eq!(wolf_msgs.len(), 1);
    assert!(wolf_msgs[0].contains("You declared war on ID: 20"));
    assert!(wolf_msgs[0].contains("12h 0m 0s"));
    assert!(host.messages_for(BEAR_MEMBER)[0].contains("has declared war on you"));

    let war = system.registry().war_for_faction(WOLVES, T0).unwrap();
    assert_eq!(war.phase(T0), Phase::Pending);

    // Structures are safe while pending
    assert!(!system.on_structure_damage(wall(BEARS), WOLVES).allowed);

    // Non-leaders are refused, leaders see the countdown
    host.clear_messages();
    system.handle_chat(BEAR_MEMBER, "/status");
    assert_eq!(
        host.messages_for(BEAR_MEMBER),
        vec!["Only the tribe leader or an admin can use this command.".to_string()]
    );
    system.handle_chat(BEAR_LEADER, "/status");
    assert_eq!(
        host.messages_for(BEAR_LEADER),
        vec!["Waiting for the war to start: 12h 0m 0s".to_string()]
    );

    // The war starts on the first tick past start_at
    host.clear_messages();
    clock.set(war.start_at);
    let report = system.on_timer().unwrap();
    assert_eq!(report.started, vec![war.war_id]);
    for actor in [WOLF_LEADER, BEAR_LEADER, BEAR_MEMBER] {
        assert_eq!(host.messages_for(actor), vec![WAR_STARTED_TEXT.to_string()]);
    }
    assert!(system.on_structure_damage(wall(BEARS), WOLVES).allowed);
    assert!(system.on_structure_damage(wall(WOLVES), BEARS).allowed);

    // A second tick does not repeat the announcement
    host.clear_messages();
    clock.advance(60);
    assert!(system.on_timer().unwrap().started.is_empty());
    assert!(host.sent_messages().is_empty());

    // Mutual cancellation
    system.handle_chat(WOLF_LEADER, "/stop");
    assert!(host.messages_for(BEAR_LEADER)[0].contains("/accept"));
    host.clear_messages();
    system.handle_chat(BEAR_LEADER, "/accept");
    for actor in [WOLF_LEADER, BEAR_LEADER, BEAR_MEMBER] {
        assert_eq!(
            host.messages_for(actor),
            vec!["The war was cancelled. Cooldown started (48h 0m 0s).".to_string()]
        );
    }

    let now = clock.advance(1);
    let war = system.registry().war_by_id(war.war_id).unwrap();
    assert_eq!(war.phase(now), Phase::Cooldown);
    assert!(!system.on_structure_damage(wall(BEARS), WOLVES).allowed);

    // No new war during the cooldown
    host.clear_messages();
    system.handle_chat(WOLF_LEADER, "/war 20");
    assert_eq!(
        host.messages_for(WOLF_LEADER),
        vec!["One of the tribes already has an active war or cooldown.".to_string()]
    );
    assert_eq!(system.registry().len(), 1);

    // Cooldown expiry is announced and the record is collected in the same tick
    host.clear_messages();
    clock.set(war.cooldown_end_a);
    let report = system.on_timer().unwrap();
    assert_eq!(report.cooldowns_finished, vec![war.war_id]);
    assert_eq!(report.removed, vec![war.war_id]);
    assert_eq!(host.messages_for(WOLF_LEADER), vec![COOLDOWN_ENDED_TEXT.to_string()]);
    assert!(system.registry().is_empty());

    // And the factions are free again
    assert!(system.handle_chat(BEAR_LEADER, "/war 10"));
    assert!(system.registry().war_for_faction(WOLVES, war.cooldown_end_a).is_some());
}

#[test]
fn test_allies_follow_the_war() {
    let dir = tempfile::tempdir().unwrap();
    let host = world();
    let foxes = FactionId(30);
    let fox = ActorId(4);
    host.add_player(fox, foxes, true);
    host.set_allied(foxes, WOLVES);

    let clock = Arc::new(ManualClock::new(T0));
    let system = TribeWarSystem::with_config(WarConfig::default(), dir.path(), host.clone(), clock.clone());

    system.handle_chat(WOLF_LEADER, "/war 20");
    assert!(host.messages_for(fox)[0].contains("You declared war"));

    let war = system.registry().war_for_faction(WOLVES, T0).unwrap();
    clock.set(war.start_at + 1);
    system.on_timer();

    // The ally fights on the wolves' side only
    assert!(system.on_structure_damage(wall(BEARS), foxes).allowed);
    assert!(system.on_structure_damage(wall(foxes), BEARS).allowed);
    assert!(!system.on_structure_damage(wall(WOLVES), foxes).allowed);

    host.clear_messages();
    system.handle_chat(fox, "/status");
    assert_eq!(host.messages_for(fox), vec!["The war is active.".to_string()]);

    // The ally is not a party and cannot cancel
    host.clear_messages();
    system.handle_chat(fox, "/stop");
    assert_eq!(host.messages_for(fox), vec!["There is no active war.".to_string()]);
}

#[test]
fn test_self_test_runs_every_phase() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(InMemoryHost::new());
    let a = FactionId(111_111);
    let b = FactionId(222_222);
    host.add_player(ActorId(1), a, true);
    host.add_player(ActorId(2), b, true);

    let mut config = WarConfig::default();
    config.self_test = true;
    config.war_delay_seconds = HOUR;
    config.cooldown_seconds = 2 * HOUR;
    config.self_test_active_seconds = 15;

    let clock = Arc::new(ManualClock::new(T0));
    let system = TribeWarSystem::with_config(config, dir.path(), host.clone(), clock.clone());

    let war = system.registry().war_for_faction(a, T0).unwrap();
    assert_eq!(war.opponent_of(a), Some(b));
    assert_eq!(war.start_at, T0 + HOUR);
    assert_eq!(war.phase(T0), Phase::Pending);

    // Nothing happens before the start
    clock.set(T0 + HOUR - 1);
    assert!(system.on_timer().unwrap().is_quiet());

    clock.set(T0 + HOUR);
    let report = system.on_timer().unwrap();
    assert_eq!(report.started, vec![war.war_id]);
    let war_now = system.registry().war_by_id(war.war_id).unwrap();
    assert!(war_now.start_notified);
    assert_eq!(war_now.phase(T0 + HOUR), Phase::Active);

    clock.set(T0 + HOUR + 15);
    let report = system.on_timer().unwrap();
    assert_eq!(report.ended, vec![war.war_id]);
    let ended = system.registry().war_by_id(war.war_id).unwrap();
    assert_eq!(ended.phase(T0 + HOUR + 15), Phase::Cooldown);
    assert_eq!(ended.cooldown_end_a, T0 + HOUR + 15 + 2 * HOUR);

    clock.set(ended.cooldown_end_a);
    let report = system.on_timer().unwrap();
    assert_eq!(report.cooldowns_finished, vec![war.war_id]);
    assert_eq!(report.removed, vec![war.war_id]);
    assert!(system.registry().is_empty());
    assert!(host.messages_for(ActorId(2)).contains(&COOLDOWN_ENDED_TEXT.to_string()));
}

#[test]
fn test_self_test_does_not_reseed_existing_data() {
    let dir = tempfile::tempdir().unwrap();
    let host = world();
    let clock = Arc::new(ManualClock::new(T0));

    {
        let system =
            TribeWarSystem::with_config(WarConfig::default(), dir.path(), host.clone(), clock.clone());
        system.handle_chat(WOLF_LEADER, "/war 20");
        system.shutdown();
    }

    let mut config = WarConfig::default();
    config.self_test = true;
    let system = TribeWarSystem::with_config(config, dir.path(), host, clock);
    assert_eq!(system.registry().len(), 1);
    assert!(system.registry().war_for_faction(WOLVES, T0).is_some());
}
