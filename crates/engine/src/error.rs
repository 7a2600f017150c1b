//! The module contains the errors the ledger engine can return.
//!
//! The errors are grouped by how a caller should react:
//!
//! - [`Validation`] input rejected before touching the store.
//! - [`NotAMember`] / [`Forbidden`] the caller lacks standing in the group.
//! - [`NoDebtFound`] / [`AmountExceedsDebt`] business rules checked against
//!   the current splits; fix the input, do not retry.
//! - [`DuplicatePendingSettlement`] the pending-pair guard tripped; query the
//!   existing pending settlement instead of retrying.
//! - [`InvalidStateTransition`] confirm/reject on a terminal settlement.
//! - [`Database`] store failures, the only retryable category.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotAMember`]: EngineError::NotAMember
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`NoDebtFound`]: EngineError::NoDebtFound
//!  [`AmountExceedsDebt`]: EngineError::AmountExceedsDebt
//!  [`DuplicatePendingSettlement`]: EngineError::DuplicatePendingSettlement
//!  [`InvalidStateTransition`]: EngineError::InvalidStateTransition
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::{MoneyCents, SettlementStatus};

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("\"{user_id}\" is not an active member of group {group_id}")]
    NotAMember { group_id: Uuid, user_id: String },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("\"{debtor_id}\" has no unpaid debt towards \"{creditor_id}\"")]
    NoDebtFound {
        debtor_id: String,
        creditor_id: String,
    },
    #[error("Amount {requested} exceeds total debt of {available}")]
    AmountExceedsDebt {
        requested: MoneyCents,
        available: MoneyCents,
    },
    #[error("A pending settlement from \"{from_user_id}\" to \"{to_user_id}\" already exists")]
    DuplicatePendingSettlement {
        from_user_id: String,
        to_user_id: String,
    },
    #[error("Settlement {settlement_id} is already {status}")]
    InvalidStateTransition {
        settlement_id: Uuid,
        status: SettlementStatus,
    },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Stable machine readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotAMember { .. } => "not_a_member",
            Self::Forbidden(_) => "forbidden",
            Self::KeyNotFound(_) => "not_found",
            Self::InvalidId(_) => "invalid_id",
            Self::NoDebtFound { .. } => "no_debt_found",
            Self::AmountExceedsDebt { .. } => "amount_exceeds_debt",
            Self::DuplicatePendingSettlement { .. } => "duplicate_pending_settlement",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::Database(_) => "database",
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (
                Self::NotAMember {
                    group_id: ga,
                    user_id: ua,
                },
                Self::NotAMember {
                    group_id: gb,
                    user_id: ub,
                },
            ) => ga == gb && ua == ub,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (
                Self::NoDebtFound {
                    debtor_id: da,
                    creditor_id: ca,
                },
                Self::NoDebtFound {
                    debtor_id: db,
                    creditor_id: cb,
                },
            ) => da == db && ca == cb,
            (
                Self::AmountExceedsDebt {
                    requested: ra,
                    available: aa,
                },
                Self::AmountExceedsDebt {
                    requested: rb,
                    available: ab,
                },
            ) => ra == rb && aa == ab,
            (
                Self::DuplicatePendingSettlement {
                    from_user_id: fa,
                    to_user_id: ta,
                },
                Self::DuplicatePendingSettlement {
                    from_user_id: fb,
                    to_user_id: tb,
                },
            ) => fa == fb && ta == tb,
            (
                Self::InvalidStateTransition {
                    settlement_id: ia,
                    status: sa,
                },
                Self::InvalidStateTransition {
                    settlement_id: ib,
                    status: sb,
                },
            ) => ia == ib && sa == sb,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
