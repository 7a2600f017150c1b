use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: Uuid,
        pub name: String,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
    }

    /// A member of a group; `left_at` is set once the member left.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub username: String,
        pub display_name: String,
        pub joined_at: DateTime<Utc>,
        pub left_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }
}

pub mod expense {
    use super::*;

    /// One share of an expense owed to the payer.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareNew {
        pub owed_by: String,
        /// Must be > 0.
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseSplitsNew {
        /// Identifier of the expense in the caller's system.
        pub expense_id: String,
        /// Defaults to the authenticated user.
        pub payer_id: Option<String>,
        /// The payer's own share, if listed, is ignored.
        pub shares: Vec<ShareNew>,
        /// RFC3339 timestamp, including timezone offset (local user time).
        pub occurred_at: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitView {
        pub id: Uuid,
        pub expense_id: String,
        pub payer_id: String,
        pub owed_by_id: String,
        pub amount_minor: i64,
        pub is_paid: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseSplitsCreated {
        pub splits: Vec<SplitView>,
    }
}

pub mod settlement {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum SettlementStatus {
        Pending,
        Confirmed,
        Rejected,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SettlementAction {
        Confirm,
        Reject,
    }

    /// Request body for creating a settlement. The requester is the
    /// authenticated user and must be one of the two parties.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementNew {
        /// Debtor paying the amount.
        pub from_user_id: String,
        /// Creditor receiving the amount.
        pub to_user_id: String,
        /// Must be > 0.
        pub amount_minor: i64,
        pub note: Option<String>,
        /// Optional idempotency key for safely retrying the same create request.
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementUpdate {
        pub action: SettlementAction,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        pub id: Uuid,
        pub group_id: Uuid,
        pub from_user_id: String,
        pub to_user_id: String,
        pub amount_minor: i64,
        pub status: SettlementStatus,
        pub note: Option<String>,
        pub requested_by: String,
        pub created_at: DateTime<Utc>,
        pub settled_at: Option<DateTime<Utc>>,
        pub confirmed_at: Option<DateTime<Utc>>,
        pub rejected_at: Option<DateTime<Utc>>,
    }

    /// Direct debt between the viewer and one counterparty.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DebtView {
        pub user_id: String,
        pub name: String,
        pub amount_minor: i64,
        pub split_ids: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub user_id: String,
        pub name: String,
        /// Positive: is owed. Negative: owes.
        pub net_minor: i64,
    }

    /// Suggested payment. Advisory only: settlements are checked against
    /// direct debts.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferView {
        pub from_user_id: String,
        pub to_user_id: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementsView {
        pub you_owe: Vec<DebtView>,
        pub owes_you: Vec<DebtView>,
        pub net_balance_minor: i64,
        pub balances: Vec<BalanceView>,
        pub suggestions: Vec<TransferView>,
        pub pending_settlements: Vec<SettlementView>,
        /// Last confirmed or rejected settlements, newest first.
        pub history: Vec<SettlementView>,
    }
}

pub mod notification {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationView {
        /// `settlement_requested`, `settlement_confirmed` or `settlement_rejected`.
        pub kind: String,
        pub settlement_id: Uuid,
        pub group_id: Uuid,
        pub actor_id: String,
        pub amount_minor: i64,
        pub message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationsResponse {
        pub notifications: Vec<NotificationView>,
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}
