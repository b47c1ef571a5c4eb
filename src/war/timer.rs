//! Timer driver for time-based war transitions
//!
//! Phases are derived from timestamps, so the timer never "moves" a war
//! between phases. It only does the bookkeeping that must happen once per
//! transition: start and cooldown notifications, self-test force-ending and
//! garbage collection of fully decayed wars. A late tick detects a transition
//! late but never loses it.
//!
//! Any error or panic during a tick permanently disables automatic
//! transitions for the rest of the process. A failed tick leaves every record
//! as it was, so no transition is marked done without its notification.
//! Manual commands are unaffected.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::config::WarConfig;
use crate::core::error::{Result, TribeWarError};
use crate::core::types::{Timestamp, WarId};
use crate::notify::{MessageStyle, Notification};
use crate::war::registry::{Visit, WarRegistry};

pub const WAR_STARTED_TEXT: &str = "The war has started!";
pub const COOLDOWN_ENDED_TEXT: &str = "The war cooldown has ended.";

/// Everything that happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub notifications: Vec<Notification>,
    pub started: Vec<WarId>,
    /// Wars force-ended by self-test mode
    pub ended: Vec<WarId>,
    pub cooldowns_finished: Vec<WarId>,
    pub removed: Vec<WarId>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.notifications.is_empty() && self.removed.is_empty() && self.ended.is_empty()
    }
}

/// Periodic driver of war bookkeeping
pub struct TimerDriver {
    enabled: AtomicBool,
    war_delay_seconds: i64,
    cooldown_seconds: i64,
    /// Set only in self-test mode
    self_test_active_seconds: Option<i64>,
}

impl TimerDriver {
    pub fn new(war_delay_seconds: i64, cooldown_seconds: i64) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            war_delay_seconds,
            cooldown_seconds,
            self_test_active_seconds: None,
        }
    }

    pub fn from_config(config: &WarConfig) -> Self {
        let mut driver = Self::new(config.war_delay_seconds, config.cooldown_seconds);
        if config.self_test {
            driver.self_test_active_seconds = Some(config.self_test_active_seconds.max(1));
        }
        driver
    }

    /// Force-end wars that have been active for `seconds`
    pub fn with_self_test(mut self, seconds: i64) -> Self {
        self.self_test_active_seconds = Some(seconds.max(1));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Run one tick, containing any failure
    ///
    /// Returns `None` when the driver is (or just became) disabled.
    pub fn tick(&self, registry: &WarRegistry, now: Timestamp) -> Option<TickReport> {
        if !self.is_enabled() {
            return None;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.advance(registry, now)));
        match outcome {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                tracing::error!("War timer failed, disabling automatic transitions: {}", e);
                self.disable();
                None
            }
            Err(_) => {
                tracing::error!("War timer panicked, disabling automatic transitions");
                self.disable();
                None
            }
        }
    }

    /// One pass over every war record
    pub fn advance(&self, registry: &WarRegistry, now: Timestamp) -> Result<TickReport> {
        if !self.is_enabled() {
            return Err(TribeWarError::TimersDisabled);
        }

        let mut report = TickReport::default();
        let summary = registry.sweep(now, |war| {
            let mut visit = Visit::default();
            if !war.is_well_formed() {
                return Ok(visit);
            }

            visit.changed |= war.repair_start_at(now, self.war_delay_seconds)?;
            visit.changed |= war.repair_cooldown_end(self.cooldown_seconds)?;

            if !war.is_ended() && now >= war.start_at && !war.start_notified {
                for side in [war.faction_a, war.faction_b] {
                    report.notifications.push(Notification::styled(
                        side,
                        WAR_STARTED_TEXT,
                        MessageStyle::WAR_STARTED,
                    ));
                }
                war.start_notified = true;
                visit.changed = true;
                report.started.push(war.war_id);
                tracing::info!(war_id = war.war_id.0, "War started");
            }

            if let Some(active_seconds) = self.self_test_active_seconds {
                if !war.is_ended() && war.start_notified {
                    let end_at = war
                        .start_at
                        .checked_add(active_seconds)
                        .ok_or(TribeWarError::TimestampOverflow("self_test_end"))?;
                    if now >= end_at {
                        war.end(now, self.cooldown_seconds)?;
                        visit.changed = true;
                        report.ended.push(war.war_id);
                        tracing::info!(
                            target: "tribe_war::self_test",
                            war_id = war.war_id.0,
                            cooldown = self.cooldown_seconds,
                            "Self-test war ended"
                        );
                    }
                }
            }

            if war.is_ended() {
                if !war.cooldown_notified
                    && now >= war.cooldown_end_a
                    && now >= war.cooldown_end_b
                {
                    for side in [war.faction_a, war.faction_b] {
                        report
                            .notifications
                            .push(Notification::new(side, COOLDOWN_ENDED_TEXT));
                    }
                    war.cooldown_notified = true;
                    visit.changed = true;
                    report.cooldowns_finished.push(war.war_id);
                    tracing::info!(war_id = war.war_id.0, "War cooldown ended");
                }

                visit.remove = war.cooldown_elapsed(now);
            }

            Ok(visit)
        })?;

        if !summary.removed.is_empty() {
            tracing::debug!(count = summary.removed.len(), "Removed finished wars");
        }
        report.removed = summary.removed;
        Ok(report)
    }
}
