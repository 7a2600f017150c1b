//! Settlement notifications.
//!
//! The engine only produces [`SettlementEvent`]s; delivering them (push,
//! email, ...) belongs to whoever implements [`NotificationSink`]. Events are
//! emitted after the ledger transaction commits and a failing sink never
//! rolls back or fails the ledger operation.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementEventKind {
    SettlementRequested,
    SettlementConfirmed,
    SettlementRejected,
}

impl SettlementEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SettlementRequested => "settlement_requested",
            Self::SettlementConfirmed => "settlement_confirmed",
            Self::SettlementRejected => "settlement_rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub kind: SettlementEventKind,
    pub settlement_id: Uuid,
    pub group_id: Uuid,
    /// User the event is addressed to.
    pub recipient_id: String,
    /// User whose action produced the event.
    pub actor_id: String,
    pub payer_id: String,
    pub payer_name: String,
    pub receiver_id: String,
    pub receiver_name: String,
    pub amount: MoneyCents,
}

impl SettlementEvent {
    /// Human readable text for the recipient.
    pub fn message(&self) -> String {
        match self.kind {
            SettlementEventKind::SettlementRequested if self.recipient_id == self.payer_id => {
                format!(
                    "{} asks you to settle a debt of {}",
                    self.receiver_name, self.amount
                )
            }
            SettlementEventKind::SettlementRequested => format!(
                "{} wants to settle a debt of {} with you",
                self.payer_name, self.amount
            ),
            SettlementEventKind::SettlementConfirmed => format!(
                "{} confirmed receiving your payment of {}",
                self.receiver_name, self.amount
            ),
            SettlementEventKind::SettlementRejected => format!(
                "{} rejected your settlement of {}",
                self.receiver_name, self.amount
            ),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Port receiving workflow events.
pub trait NotificationSink: Send + Sync + fmt::Debug {
    fn emit(&self, event: SettlementEvent) -> Result<(), NotifyError>;
}

/// Sink that only records events in the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn emit(&self, event: SettlementEvent) -> Result<(), NotifyError> {
        tracing::info!(
            kind = event.kind.as_str(),
            settlement_id = %event.settlement_id,
            recipient = %event.recipient_id,
            "{}",
            event.message()
        );
        Ok(())
    }
}

/// Events kept per recipient; older ones are dropped first.
pub const INBOX_CAPACITY: usize = 100;

/// In-memory per-user inbox, at most [`INBOX_CAPACITY`] events per user.
#[derive(Debug, Default)]
pub struct InboxNotifier {
    inbox: Mutex<HashMap<String, VecDeque<SettlementEvent>>>,
}

impl InboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<SettlementEvent>>> {
        self.inbox
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Events waiting for `user_id`, oldest first, without removing them.
    pub fn pending(&self, user_id: &str) -> Vec<SettlementEvent> {
        self.lock()
            .get(user_id)
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return the events waiting for `user_id`.
    pub fn drain(&self, user_id: &str) -> Vec<SettlementEvent> {
        self.lock()
            .remove(user_id)
            .map(Vec::from)
            .unwrap_or_default()
    }
}

impl NotificationSink for InboxNotifier {
    fn emit(&self, event: SettlementEvent) -> Result<(), NotifyError> {
        let mut inbox = self.lock();
        let events = inbox.entry(event.recipient_id.clone()).or_default();
        if events.len() == INBOX_CAPACITY {
            let dropped = events.pop_front();
            tracing::debug!(
                recipient = %event.recipient_id,
                dropped = ?dropped.map(|e| e.settlement_id),
                "inbox full, dropping oldest event"
            );
        }
        events.push_back(event);
        Ok(())
    }
}
