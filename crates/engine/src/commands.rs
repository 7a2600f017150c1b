//! Command structs for engine operations.
//!
//! These types group parameters for write operations (settlement requests,
//! expense splits), keeping call sites readable and avoiding long argument
//! lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MoneyCents, SettlementStatus};

/// Request a settlement of `amount` from `from_user_id` (debtor) to
/// `to_user_id` (creditor). `requested_by` must be one of the two.
#[derive(Clone, Debug)]
pub struct CreateSettlementCmd {
    pub group_id: Uuid,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: MoneyCents,
    pub requested_by: String,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CreateSettlementCmd {
    #[must_use]
    pub fn new(
        group_id: Uuid,
        from_user_id: impl Into<String>,
        to_user_id: impl Into<String>,
        amount: MoneyCents,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            group_id,
            from_user_id: from_user_id.into(),
            to_user_id: to_user_id.into(),
            amount,
            requested_by: requested_by.into(),
            note: None,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Record the splits of one expense paid by `payer_id`.
#[derive(Clone, Debug)]
pub struct RecordSplitsCmd {
    pub group_id: Uuid,
    pub expense_id: String,
    pub payer_id: String,
    /// `(owed_by, amount)` shares; the payer's own share is skipped.
    pub shares: Vec<(String, MoneyCents)>,
    pub created_at: DateTime<Utc>,
}

impl RecordSplitsCmd {
    #[must_use]
    pub fn new(group_id: Uuid, expense_id: impl Into<String>, payer_id: impl Into<String>) -> Self {
        Self {
            group_id,
            expense_id: expense_id.into(),
            payer_id: payer_id.into(),
            shares: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn share(mut self, owed_by: impl Into<String>, amount: MoneyCents) -> Self {
        self.shares.push((owed_by.into(), amount));
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Terminal transition requested on a pending settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementAction {
    Confirm,
    Reject,
}

impl SettlementAction {
    pub fn target_status(self) -> SettlementStatus {
        match self {
            Self::Confirm => SettlementStatus::Confirmed,
            Self::Reject => SettlementStatus::Rejected,
        }
    }
}
