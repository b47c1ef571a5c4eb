//! Player-facing war commands
//!
//! Handlers validate preconditions, delegate to the registry and queue side
//! notifications. A rejected command produces exactly one [`Refusal`], whose
//! `Display` text is what the player sees.

pub mod chat;
pub mod menu;

use thiserror::Error;

use crate::core::config::WarConfig;
use crate::core::error::TribeWarError;
use crate::core::types::{format_duration, ActorId, FactionId, Timestamp};
use crate::host::GameHost;
use crate::names::NameCache;
use crate::notify::{MessageStyle, Notification, NotificationQueue};
use crate::war::record::{Phase, WarRecord};
use crate::war::registry::{AcceptOutcome, WarRegistry};

pub use chat::{parse_chat, parse_war_argument, ChatCommand, WarArgument};
pub use menu::{MenuAction, MenuEntry, PendingActions};

/// Why a command was not carried out
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    #[error("You must be a member of a tribe.")]
    NotInFaction,

    #[error("Only the tribe leader or an admin can use this command.")]
    NotLeader,

    #[error("You cannot declare war on your own tribe.")]
    OwnFaction,

    #[error("You cannot declare war on an allied tribe. Break the alliance first.")]
    Allied,

    #[error("One of the tribes already has an active war or cooldown.")]
    AlreadyEngaged,

    #[error("A member of the target tribe must be online.")]
    TargetOffline,

    #[error("A cooldown is currently in effect.")]
    InCooldown,

    #[error("Your tribe already has an active war or cooldown.")]
    OwnFactionEngaged,

    #[error("No tribes are available for war.")]
    NoAvailableTargets,

    #[error("Invalid tribe ID.")]
    InvalidFactionId,

    #[error("There is no active war.")]
    NoOpenWar,

    #[error("No cancellation request has been received.")]
    NoCancelRequest,

    #[error("The server is not ready yet.")]
    HostNotReady,

    #[error("The war could not be declared.")]
    DeclareFailed,
}

/// Text for the acting player (if any), or the reason for refusing
pub type CommandOutcome = std::result::Result<Option<String>, Refusal>;

pub const HELP_TEXT: &str = "Tribe war commands:\n\
/info - this help\n\
/status - status of the current war\n\
/war - list tribes available for war\n\
/war <tribe_id> - declare war on a tribe\n\
/stop - request cancellation of the war\n\
/accept - accept a cancellation request\n";

/// Command handlers bound to the live war state
pub struct WarCommands<'a> {
    pub config: &'a WarConfig,
    pub registry: &'a WarRegistry,
    pub host: &'a dyn GameHost,
    pub names: &'a NameCache,
    pub queue: &'a NotificationQueue,
}

impl<'a> WarCommands<'a> {
    /// Does this player count as leadership of their faction?
    pub fn is_leader(&self, actor: ActorId) -> bool {
        if self.host.is_leader_or_admin(actor) {
            return true;
        }
        self.config.allow_member_fallback && self.host.is_member(actor)
    }

    /// Resolve the acting player's faction and check leadership
    pub fn authorize(&self, actor: ActorId) -> Result<FactionId, Refusal> {
        let faction = self
            .host
            .faction_of(actor)
            .filter(|f| !f.is_none())
            .ok_or(Refusal::NotInFaction)?;
        if !self.is_leader(actor) {
            return Err(Refusal::NotLeader);
        }
        Ok(faction)
    }

    /// Open war or running cooldown for this faction
    pub fn is_engaged(&self, faction: FactionId, now: Timestamp) -> bool {
        self.registry.is_engaged(faction, now)
    }

    /// Can `attacker` declare war on `target` right now?
    ///
    /// Checks run in a fixed order; the first failure is the reason given.
    pub fn is_war_allowed(&self, attacker: FactionId, target: FactionId, now: Timestamp) -> Result<(), Refusal> {
        if attacker.is_none() || target.is_none() {
            return Err(Refusal::NotInFaction);
        }
        if attacker == target {
            return Err(Refusal::OwnFaction);
        }
        if self.host.is_ready() && self.host.are_allied(attacker, target) {
            return Err(Refusal::Allied);
        }
        if self.registry.war_for_faction(attacker, now).is_some()
            || self.registry.war_for_faction(target, now).is_some()
        {
            return Err(Refusal::AlreadyEngaged);
        }
        if !self.host.is_ready() || !self.host.is_any_member_online(target) {
            return Err(Refusal::TargetOffline);
        }
        if self.registry.is_in_cooldown(attacker, now) || self.registry.is_in_cooldown(target, now) {
            return Err(Refusal::InCooldown);
        }
        Ok(())
    }

    /// Create the war and tell both sides; eligibility already checked
    pub fn declare_war(&self, attacker: FactionId, target: FactionId, now: Timestamp) -> Result<WarRecord, Refusal> {
        let war = self.registry.declare_war(attacker, target, now).map_err(|e| match e {
            TribeWarError::FactionEngaged(_) => Refusal::AlreadyEngaged,
            e => {
                tracing::error!("Failed to declare war {} -> {}: {}", attacker, target, e);
                Refusal::DeclareFailed
            }
        })?;

        let delay = format_duration(self.config.war_delay_seconds);
        self.queue.push(Notification::new(
            attacker,
            format!(
                "You declared war on {}. It starts in {}.",
                self.names.display(target),
                delay
            ),
        ));
        self.queue.push(Notification::new(
            target,
            format!(
                "{} has declared war on you. It starts in {}.",
                self.names.display(attacker),
                delay
            ),
        ));
        Ok(war)
    }

    /// Validate and declare on behalf of a faction
    pub fn declare_for(&self, faction: FactionId, target: FactionId, now: Timestamp) -> CommandOutcome {
        self.is_war_allowed(faction, target, now)?;
        self.declare_war(faction, target, now)?;
        Ok(None)
    }

    pub fn declare(&self, actor: ActorId, target: FactionId, now: Timestamp) -> CommandOutcome {
        let faction = self.authorize(actor)?;
        self.declare_for(faction, target, now)
    }

    /// Status line for a faction, following alliances to an ally's war
    pub fn status_text(&self, faction: FactionId, now: Timestamp) -> String {
        let view = self
            .registry
            .war_for_side(faction, now, |a, b| self.host.are_allied(a, b));
        match view {
            Some(view) => war_status_text(Some(&view.war), view.side_root, now),
            None => war_status_text(None, faction, now),
        }
    }

    pub fn status(&self, actor: ActorId, now: Timestamp) -> CommandOutcome {
        let faction = self.authorize(actor)?;
        Ok(Some(self.status_text(faction, now)))
    }

    /// Factions with an online member that are free to be declared on
    pub fn available_targets(&self, faction: FactionId, now: Timestamp) -> Vec<FactionId> {
        let mut targets: Vec<FactionId> = self
            .host
            .online_players()
            .into_iter()
            .filter_map(|actor| self.host.faction_of(actor))
            .filter(|other| !other.is_none() && *other != faction)
            .collect();
        targets.sort();
        targets.dedup();
        targets.retain(|other| !self.is_engaged(*other, now));
        targets
    }

    pub fn list_targets(&self, actor: ActorId, now: Timestamp) -> CommandOutcome {
        let faction = self.authorize(actor)?;
        if self.is_engaged(faction, now) {
            return Err(Refusal::OwnFactionEngaged);
        }
        if !self.host.is_ready() {
            return Err(Refusal::HostNotReady);
        }

        let targets = self.available_targets(faction, now);
        if targets.is_empty() {
            return Err(Refusal::NoAvailableTargets);
        }

        let mut message = String::from("Available tribes:\n");
        for target in targets {
            message.push_str(&self.names.display(target));
            message.push('\n');
        }
        message.push_str("\nUse /war <tribe_id> to declare war.");
        Ok(Some(message))
    }

    pub fn request_cancel_for(&self, faction: FactionId, now: Timestamp) -> CommandOutcome {
        if self.registry.war_for_faction(faction, now).is_none() {
            return Err(Refusal::NoOpenWar);
        }
        let requested = self
            .registry
            .request_cancel(faction, now)
            .ok_or(Refusal::NoOpenWar)?;

        self.queue.push(Notification::new(
            requested.opponent,
            "The enemy has asked to cancel the war. Type /accept to confirm.",
        ));
        self.queue.push(Notification::new(
            requested.requester,
            "Cancellation request sent. Waiting for the enemy to /accept.",
        ));
        Ok(None)
    }

    pub fn request_cancel(&self, actor: ActorId, now: Timestamp) -> CommandOutcome {
        let faction = self.authorize(actor)?;
        self.request_cancel_for(faction, now)
    }

    pub fn accept_cancel_for(&self, faction: FactionId, now: Timestamp) -> CommandOutcome {
        if self.registry.war_for_faction(faction, now).is_none() {
            return Err(Refusal::NoOpenWar);
        }
        if !self.registry.has_incoming_cancel(faction, now) {
            return Err(Refusal::NoCancelRequest);
        }

        let outcome = self.registry.accept_cancel(faction, now).map_err(|e| {
            tracing::error!("Failed to cancel war for {}: {}", faction, e);
            Refusal::NoOpenWar
        })?;

        match outcome {
            AcceptOutcome::Ended(war) => {
                let text = format!(
                    "The war was cancelled. Cooldown started ({}).",
                    format_duration(self.config.cooldown_seconds)
                );
                for side in [war.faction_a, war.faction_b] {
                    self.queue
                        .push(Notification::styled(side, text.clone(), MessageStyle::WAR_CANCELLED));
                }
                Ok(None)
            }
            AcceptOutcome::AwaitingOpponent(_) => Ok(None),
            AcceptOutcome::NoOpenWar => Err(Refusal::NoOpenWar),
        }
    }

    pub fn accept_cancel(&self, actor: ActorId, now: Timestamp) -> CommandOutcome {
        let faction = self.authorize(actor)?;
        self.accept_cancel_for(faction, now)
    }

    pub fn help(&self) -> CommandOutcome {
        Ok(Some(HELP_TEXT.to_string()))
    }

    /// Run a parsed chat command
    pub fn execute(&self, actor: ActorId, command: ChatCommand, now: Timestamp) -> CommandOutcome {
        match command {
            ChatCommand::Help => self.help(),
            ChatCommand::Status => self.status(actor, now),
            ChatCommand::War(WarArgument::List) => self.list_targets(actor, now),
            ChatCommand::War(WarArgument::Declare(target)) => self.declare(actor, target, now),
            ChatCommand::War(WarArgument::Invalid) => {
                self.authorize(actor)?;
                Err(Refusal::InvalidFactionId)
            }
            ChatCommand::Stop => self.request_cancel(actor, now),
            ChatCommand::Accept => self.accept_cancel(actor, now),
        }
    }

    /// Deliver a command outcome to the acting player
    pub fn reply(&self, actor: ActorId, outcome: &CommandOutcome) {
        let text = match outcome {
            Ok(Some(text)) => text.clone(),
            Ok(None) => return,
            Err(refusal) => refusal.to_string(),
        };
        self.host.send_message(actor, &text, MessageStyle::DEFAULT);
    }
}

/// Status line for a war as seen from `side`
pub fn war_status_text(war: Option<&WarRecord>, side: FactionId, now: Timestamp) -> String {
    let Some(war) = war else {
        return "No war.".to_string();
    };

    match war.phase(now) {
        Phase::Pending => format!(
            "Waiting for the war to start: {}",
            format_duration(war.start_at.saturating_sub(now))
        ),
        Phase::Active => "The war is active.".to_string(),
        Phase::Cooldown => {
            let end = war.cooldown_end_for(side).unwrap_or(0);
            format!("Cooldown: {}", format_duration(end.saturating_sub(now)))
        }
        Phase::None => "No war.".to_string(),
    }
}
