//! Settlement API endpoints

use api_types::settlement::{
    BalanceView, DebtView, SettlementAction as ApiAction, SettlementNew,
    SettlementStatus as ApiStatus, SettlementUpdate, SettlementView, SettlementsView,
    TransferView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{
    BalanceLine, CreateSettlementCmd, DebtLine, MoneyCents, Settlement, SettlementAction,
    SettlementStatus, Transfer,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn map_status(status: SettlementStatus) -> ApiStatus {
    match status {
        SettlementStatus::Pending => ApiStatus::Pending,
        SettlementStatus::Confirmed => ApiStatus::Confirmed,
        SettlementStatus::Rejected => ApiStatus::Rejected,
    }
}

fn map_action(action: ApiAction) -> SettlementAction {
    match action {
        ApiAction::Confirm => SettlementAction::Confirm,
        ApiAction::Reject => SettlementAction::Reject,
    }
}

pub(crate) fn settlement_view(settlement: Settlement) -> SettlementView {
    SettlementView {
        id: settlement.id,
        group_id: settlement.group_id,
        from_user_id: settlement.from_user_id,
        to_user_id: settlement.to_user_id,
        amount_minor: settlement.amount.cents(),
        status: map_status(settlement.status),
        note: settlement.note,
        requested_by: settlement.requested_by,
        created_at: settlement.created_at,
        settled_at: settlement.settled_at,
        confirmed_at: settlement.confirmed_at,
        rejected_at: settlement.rejected_at,
    }
}

fn debt_view(line: DebtLine) -> DebtView {
    DebtView {
        user_id: line.counterparty_id,
        name: line.counterparty_name,
        amount_minor: line.amount.cents(),
        split_ids: line.split_ids,
    }
}

fn balance_view(line: BalanceLine) -> BalanceView {
    BalanceView {
        user_id: line.member_id,
        name: line.display_name,
        net_minor: line.net.cents(),
    }
}

fn transfer_view(transfer: Transfer) -> TransferView {
    TransferView {
        from_user_id: transfer.from_id,
        to_user_id: transfer.to_id,
        amount_minor: transfer.amount.cents(),
    }
}

pub async fn view(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<SettlementsView>, ServerError> {
    let view = state
        .engine
        .settlements_view(group_id, &user.username)
        .await?;

    Ok(Json(SettlementsView {
        you_owe: view.you_owe.into_iter().map(debt_view).collect(),
        owes_you: view.owes_you.into_iter().map(debt_view).collect(),
        net_balance_minor: view.net_balance.cents(),
        balances: view.balances.into_iter().map(balance_view).collect(),
        suggestions: view.suggestions.into_iter().map(transfer_view).collect(),
        pending_settlements: view
            .pending_settlements
            .into_iter()
            .map(settlement_view)
            .collect(),
        history: view.history.into_iter().map(settlement_view).collect(),
    }))
}

pub async fn settlement_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<SettlementView>), ServerError> {
    let mut cmd = CreateSettlementCmd::new(
        group_id,
        payload.from_user_id,
        payload.to_user_id,
        MoneyCents::new(payload.amount_minor),
        user.username,
    );
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }

    let settlement = state.engine.create_settlement(cmd).await?;
    Ok((StatusCode::CREATED, Json(settlement_view(settlement))))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SettlementView>, ServerError> {
    let settlement = state
        .engine
        .get_settlement(group_id, settlement_id, &user.username)
        .await?;
    Ok(Json(settlement_view(settlement)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SettlementUpdate>,
) -> Result<Json<SettlementView>, ServerError> {
    let settlement = state
        .engine
        .finish_settlement(
            group_id,
            settlement_id,
            &user.username,
            map_action(payload.action),
        )
        .await?;
    Ok(Json(settlement_view(settlement)))
}

pub async fn confirm(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SettlementView>, ServerError> {
    let settlement = state
        .engine
        .confirm_settlement(group_id, settlement_id, &user.username)
        .await?;
    Ok(Json(settlement_view(settlement)))
}

pub async fn reject(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SettlementView>, ServerError> {
    let settlement = state
        .engine
        .reject_settlement(group_id, settlement_id, &user.username)
        .await?;
    Ok(Json(settlement_view(settlement)))
}
