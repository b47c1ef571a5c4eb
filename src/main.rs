//! Tribe War - console host
//!
//! Runs the war system against an in-memory game world. A ticker drives the
//! timer callback while stdin lines set up players and issue chat commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;

use tribe_war::core::clock::{Clock, ManualClock, SystemClock};
use tribe_war::core::config::WarConfig;
use tribe_war::core::error::Result;
use tribe_war::core::types::{ActorId, FactionId};
use tribe_war::host::memory::InMemoryHost;
use tribe_war::promo::PromoLedger;
use tribe_war::system::{TribeWarSystem, CONFIG_FILE};
use tribe_war::war::authorization::DamageTarget;

/// Console host for the tribe war system
#[derive(Parser, Debug)]
#[command(name = "tribe-war")]
#[command(about = "Run the tribe war system against an in-memory game world")]
struct Args {
    /// Directory holding config.json, data.json and tribe_names.json
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Seed a synthetic war and drive it through every phase
    #[arg(long)]
    self_test: bool,

    /// Timer period in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,

    /// Advance a simulated clock by this many seconds per tick instead of
    /// reading the wall clock
    #[arg(long)]
    step_seconds: Option<i64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tribe_war=info")),
        )
        .init();

    let args = Args::parse();
    let rt = Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    std::fs::create_dir_all(&args.data_dir)?;
    let mut config = WarConfig::load_or_create(&args.data_dir.join(CONFIG_FILE));
    if args.self_test {
        config.self_test = true;
    }

    let host = Arc::new(InMemoryHost::new());
    let manual_clock = args.step_seconds.map(|_| Arc::new(ManualClock::new(SystemClock.now())));
    let clock: Arc<dyn Clock> = match &manual_clock {
        Some(clock) => clock.clone(),
        None => Arc::new(SystemClock),
    };

    let system = TribeWarSystem::with_config(config, &args.data_dir, host.clone(), clock);
    let promo = PromoLedger::open(&args.data_dir);

    print_help();

    let mut ticker = tokio::time::interval(Duration::from_millis(args.tick_ms.max(10)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let (Some(clock), Some(step)) = (&manual_clock, args.step_seconds) {
                    clock.advance(step);
                }
                if let Some(report) = system.on_timer() {
                    for war_id in &report.removed {
                        println!("[timer] war #{} removed", war_id.0);
                    }
                }
                print_messages(&host);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&system, &host, &promo, line.trim()) {
                    break;
                }
                print_messages(&host);
            }
        }
    }

    system.shutdown();
    if let Err(e) = promo.save() {
        tracing::warn!("Failed to save promo ledger: {}", e);
    }
    Ok(())
}

fn print_help() {
    println!("\n=== TRIBE WAR ===");
    println!("Commands:");
    println!("  player <actor> <tribe> [leader]  - Add an online player");
    println!("  offline <actor>                  - Take a player offline");
    println!("  empty <tribe>                    - Register a tribe without members");
    println!("  name <tribe> <name>              - Set a tribe name");
    println!("  ally <tribe> <tribe>             - Ally two tribes");
    println!("  as <actor> <chat line>           - Chat as a player (/info, /war, ...)");
    println!("  menu <actor> <owner tribe>       - Show the structure menu");
    println!("  pick <actor> <owner tribe> <id>  - Select a menu entry");
    println!("  hit <attacker tribe> <owner tribe> [blueprint]");
    println!("  wars                             - List open wars");
    println!("  quit                             - Save and exit");
    println!();
}

fn print_messages(host: &InMemoryHost) {
    for message in host.take_messages() {
        println!("[to {}] {}", message.actor, message.text);
    }
}

fn parse_faction(token: Option<&str>) -> Option<FactionId> {
    token?.parse::<i64>().ok().map(FactionId::from_raw)
}

fn parse_actor(token: Option<&str>) -> Option<ActorId> {
    token?.parse::<u64>().ok().map(ActorId)
}

/// Returns false when the console should exit
fn handle_line(system: &TribeWarSystem, host: &InMemoryHost, promo: &PromoLedger, line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return true;
    };

    match command {
        "quit" | "q" => return false,
        "help" => print_help(),
        "player" => match (parse_actor(tokens.next()), parse_faction(tokens.next())) {
            (Some(actor), Some(faction)) => {
                host.add_player(actor, faction, tokens.next() == Some("leader"));
            }
            _ => println!("usage: player <actor> <tribe> [leader]"),
        },
        "offline" => match parse_actor(tokens.next()) {
            Some(actor) => host.set_online(actor, false),
            None => println!("usage: offline <actor>"),
        },
        "empty" => match parse_faction(tokens.next()) {
            Some(faction) => host.add_empty_faction(faction),
            None => println!("usage: empty <tribe>"),
        },
        "name" => match parse_faction(tokens.next()) {
            Some(faction) => {
                let name = tokens.collect::<Vec<_>>().join(" ");
                host.set_faction_name(faction, name);
            }
            None => println!("usage: name <tribe> <name>"),
        },
        "ally" => match (parse_faction(tokens.next()), parse_faction(tokens.next())) {
            (Some(a), Some(b)) => host.set_allied(a, b),
            _ => println!("usage: ally <tribe> <tribe>"),
        },
        "as" => match parse_actor(tokens.next()) {
            Some(actor) => {
                let chat = tokens.collect::<Vec<_>>().join(" ");
                if system.handle_chat(actor, &chat) {
                    return true;
                }
                match promo.handle_chat(host, actor.0, &chat, system.now()) {
                    Some(reply) => println!("[to {}] {}", actor, reply),
                    None => println!("(not a war command)"),
                }
            }
            None => println!("usage: as <actor> <chat line>"),
        },
        "menu" => match (parse_actor(tokens.next()), parse_faction(tokens.next())) {
            (Some(actor), owner) => {
                let entries = system.build_menu(actor, owner, &[]);
                if entries.is_empty() {
                    println!("(no war menu)");
                }
                for entry in entries {
                    println!("  [{}] {}", entry.id, entry.label);
                }
            }
            _ => println!("usage: menu <actor> <owner tribe>"),
        },
        "pick" => {
            let actor = parse_actor(tokens.next());
            let owner = parse_faction(tokens.next());
            let id = tokens.next().and_then(|t| t.parse::<i32>().ok());
            match (actor, id) {
                (Some(actor), Some(id)) => {
                    if !system.select_menu(actor, owner, id) {
                        println!("(not a war menu entry)");
                    }
                }
                _ => println!("usage: pick <actor> <owner tribe> <id>"),
            }
        }
        "hit" => match (parse_faction(tokens.next()), parse_faction(tokens.next())) {
            (Some(attacker), Some(owner)) => {
                let blueprint = tokens.next().unwrap_or("/Game/Structures/Wall.Wall_C");
                let decision = system.on_structure_damage(DamageTarget::Structure { owner, blueprint }, attacker);
                println!(
                    "damage {} (x{:.2})",
                    if decision.allowed { "allowed" } else { "blocked" },
                    decision.multiplier
                );
            }
            _ => println!("usage: hit <attacker tribe> <owner tribe> [blueprint]"),
        },
        "wars" => {
            let now = system.now();
            let wars = system.registry().open_wars(now);
            if wars.is_empty() {
                println!("(no wars)");
            }
            for war in wars {
                println!(
                    "  {} {} vs {}: {:?}",
                    war.war_id,
                    system.names().display(war.faction_a),
                    system.names().display(war.faction_b),
                    war.phase(now)
                );
            }
        }
        other => println!("unknown command: {}", other),
    }
    true
}
