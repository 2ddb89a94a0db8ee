//! In-process notification fan-out.
//!
//! Subscribers are tasks in the same process holding a receiver from
//! [`NotifyHub::subscribe`]. The wire protocol has no subscribe op, so remote
//! clients never see these messages; a delivery transport (email, push)
//! would sit behind a subscriber here.

use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Slot;

const CHANNEL_CAPACITY: usize = 256;

/// Post-commit messages pushed to students and tutors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    SessionRequested {
        session_id: Ulid,
        date: NaiveDate,
        slot: Slot,
    },
    SessionConfirmed {
        session_id: Ulid,
        date: NaiveDate,
        slot: Slot,
    },
    PaymentCompleted {
        payment_id: Ulid,
        session_id: Ulid,
        amount: Decimal,
    },
    Reminder {
        session_id: Ulid,
        starts_at: NaiveDateTime,
    },
}

/// Broadcast hub keyed by user (student or tutor) id.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a user. Creates the channel if needed.
    pub fn subscribe(&self, user_id: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, user_id: Ulid, notification: &Notification) {
        if let Some(sender) = self.channels.get(&user_id) {
            let _ = sender.send(notification.clone());
        }
    }
}
