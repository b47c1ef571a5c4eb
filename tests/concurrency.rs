//! Commands, timer ticks and notification delivery racing on shared state

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tribe_war::core::clock::{Clock, ManualClock};
use tribe_war::core::config::WarConfig;
use tribe_war::core::types::{ActorId, FactionId};
use tribe_war::host::memory::InMemoryHost;
use tribe_war::notify::Notification;
use tribe_war::TribeWarSystem;

const T0: i64 = 1_700_000_000;
const FACTIONS: [u32; 8] = [10, 20, 30, 40, 50, 60, 70, 80];
const WORKERS: usize = 4;
const ROUNDS: usize = 300;
const TICKS: usize = 400;
const BROADCASTS: usize = 200;

/// Factions in more than one open war at the same instant
fn overlapping(system: &TribeWarSystem, clock: &ManualClock) -> Vec<u32> {
    let wars = system.registry().snapshot().wars;
    // Read after the snapshot so it is never behind a record's declaration
    let now = clock.now();
    FACTIONS
        .iter()
        .copied()
        .filter(|faction| {
            wars.iter()
                .filter(|war| war.faction_a.0 == *faction || war.faction_b.0 == *faction)
                .filter(|war| war.phase(now).is_open())
                .count()
                > 1
        })
        .collect()
}

#[test]
fn test_concurrent_commands_ticks_and_flushes() {
    let dir = tempfile::tempdir().unwrap();
    // One online player per faction and no alliances: each notification reaches exactly one player
    let host = Arc::new(InMemoryHost::new());
    for faction in FACTIONS {
        host.add_player(ActorId(faction as u64), FactionId(faction), true);
    }
    let mut config = WarConfig::default();
    config.war_delay_seconds = 100;
    config.cooldown_seconds = 300;
    let clock = Arc::new(ManualClock::new(T0));
    let system = TribeWarSystem::with_config(config, dir.path(), host.clone(), clock.clone());

    let done = AtomicBool::new(false);
    let requests = AtomicUsize::new(0);
    let timer_notes = AtomicUsize::new(0);
    let removed = AtomicUsize::new(0);
    let delivered = AtomicUsize::new(0);
    let violations = AtomicUsize::new(0);

    thread::scope(|s| {
        let mut workers = Vec::new();
        for worker in 0..WORKERS {
            let (system, clock, requests) = (&system, &clock, &requests);
            workers.push(s.spawn(move || {
                let commands = system.commands();
                for round in 0..ROUNDS {
                    let own = FactionId(FACTIONS[(worker + round) % FACTIONS.len()]);
                    let target = FactionId(FACTIONS[(worker * 3 + round * 5 + 1) % FACTIONS.len()]);
                    let now = clock.now();
                    match round % 3 {
                        0 => {
                            let _ = commands.declare_for(own, target, now);
                        }
                        1 => {
                            if commands.request_cancel_for(own, now).is_ok() {
                                requests.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        _ => {
                            let _ = commands.accept_cancel_for(own, now);
                        }
                    }
                }
            }));
        }

        workers.push(s.spawn(|| {
            for _ in 0..TICKS {
                let now = clock.advance(25);
                let report = system.timer().tick(system.registry(), now).unwrap();
                timer_notes.fetch_add(report.notifications.len(), Ordering::SeqCst);
                removed.fetch_add(report.removed.len(), Ordering::SeqCst);
                system.queue().extend(report.notifications);
            }
        }));

        workers.push(s.spawn(|| {
            for i in 0..BROADCASTS {
                let side = FactionId(FACTIONS[i % FACTIONS.len()]);
                system.queue().push(Notification::new(side, "Server restart in 5 minutes."));
            }
        }));

        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                delivered.fetch_add(system.queue().flush(&*host), Ordering::SeqCst);
                thread::yield_now();
            }
        });

        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                violations.fetch_add(overlapping(&system, &clock).len(), Ordering::SeqCst);
                thread::yield_now();
            }
        });

        for worker in workers {
            worker.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
    });

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert!(overlapping(&system, &clock).is_empty());
    assert!(system.timer().is_enabled());

    let delivered = delivered.load(Ordering::SeqCst) + system.queue().flush(&*host);
    assert!(system.queue().is_empty());

    // Every declaration, request and cancellation queues one message per side
    let snapshot = system.registry().snapshot();
    let declared = (snapshot.next_war_id - 1) as usize;
    let ended = snapshot.wars.iter().filter(|war| war.is_ended()).count() + removed.load(Ordering::SeqCst);
    let queued = 2 * (declared + requests.load(Ordering::SeqCst) + ended)
        + timer_notes.load(Ordering::SeqCst)
        + BROADCASTS;

    assert!(declared > 0);
    assert_eq!(delivered, queued);
    assert_eq!(host.sent_messages().len(), queued);
}
