//! Notification queue
//!
//! State changes may happen on any thread, but messages can only be delivered
//! from the thread the host allows. Mutations append to this queue; the host
//! thread swaps the buffer out and delivers each message.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::mem;

use crate::core::types::FactionId;
use crate::host::GameHost;

/// On-screen styling of a notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MessageStyle {
    /// RGBA, each channel in [0, 1]
    pub color: [f32; 4],
    pub scale: f32,
    /// How long the message stays on screen (seconds)
    pub display_seconds: f32,
}

impl MessageStyle {
    /// Yellow, normal size
    pub const DEFAULT: MessageStyle = MessageStyle {
        color: [1.0, 0.85, 0.1, 1.0],
        scale: 1.0,
        display_seconds: 6.0,
    };

    /// Large red banner
    pub const WAR_STARTED: MessageStyle = MessageStyle {
        color: [1.0, 0.15, 0.15, 1.0],
        scale: 2.2,
        display_seconds: 12.0,
    };

    /// Green
    pub const WAR_CANCELLED: MessageStyle = MessageStyle {
        color: [0.2, 1.0, 0.2, 1.0],
        scale: 1.4,
        display_seconds: 8.0,
    };
}

impl Default for MessageStyle {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A message addressed to a side: a faction and everyone allied with it
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub side: FactionId,
    pub text: String,
    pub style: MessageStyle,
}

impl Notification {
    pub fn new(side: FactionId, text: impl Into<String>) -> Self {
        Self::styled(side, text, MessageStyle::DEFAULT)
    }

    pub fn styled(side: FactionId, text: impl Into<String>, style: MessageStyle) -> Self {
        Self {
            side,
            text: text.into(),
            style,
        }
    }
}

/// Buffer of undelivered notifications, locked independently of the registry
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Mutex<Vec<Notification>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: Notification) {
        self.pending.lock().push(notification);
    }

    pub fn extend(&self, notifications: impl IntoIterator<Item = Notification>) {
        let mut pending = self.pending.lock();
        pending.extend(notifications);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Take every queued notification, leaving the queue empty
    pub fn drain(&self) -> Vec<Notification> {
        mem::take(&mut *self.pending.lock())
    }

    /// Deliver everything queued so far; returns the number of messages sent
    ///
    /// Call only from the thread allowed to talk to the host. Nothing is
    /// delivered while the host is not ready; the queue is kept for later.
    pub fn flush(&self, host: &dyn GameHost) -> usize {
        if !host.is_ready() {
            return 0;
        }
        let batch = self.drain();
        batch
            .iter()
            .map(|note| notify_side(host, note.side, &note.text, note.style))
            .sum()
    }
}

/// Send a message to every online player on a side
///
/// A player is on the side if their faction is `side` or allied with it.
pub fn notify_side(host: &dyn GameHost, side: FactionId, text: &str, style: MessageStyle) -> usize {
    if side.is_none() {
        return 0;
    }

    let mut sent = 0;
    for actor in host.online_players() {
        let Some(faction) = host.faction_of(actor) else {
            continue;
        };
        if faction == side || host.are_allied(faction, side) {
            host.send_message(actor, text, style);
            sent += 1;
        }
    }
    sent
}
