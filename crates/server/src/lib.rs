use api_types::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{ServerState, router, run_with_listener};

mod groups;
mod notifications;
mod server;
mod settlements;
mod user;

pub mod types {
    pub mod group {
        pub use api_types::group::{GroupNew, GroupView, MemberView, MembersResponse};
    }

    pub mod expense {
        pub use api_types::expense::{ExpenseSplitsCreated, ExpenseSplitsNew, ShareNew, SplitView};
    }

    pub mod settlement {
        pub use api_types::settlement::{
            BalanceView, DebtView, SettlementAction, SettlementNew, SettlementStatus,
            SettlementUpdate, SettlementView, SettlementsView, TransferView,
        };
    }

    pub mod notification {
        pub use api_types::notification::{NotificationView, NotificationsResponse};
    }
}

pub enum ServerError {
    Engine(EngineError),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_)
        | EngineError::NoDebtFound { .. }
        | EngineError::AmountExceedsDebt { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NotAMember { .. } | EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::DuplicatePendingSettlement { .. }
        | EngineError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        EngineError::Database(_) | EngineError::InvalidId(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::InvalidId(id) => {
            tracing::error!("corrupt id in store: {id}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let ServerError::Engine(err) = self;
        let status = status_for_engine_error(&err);
        let body = ErrorBody {
            kind: err.kind().to_string(),
            error: message_for_engine_error(err),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
