//! Group and expense-split API endpoints

use api_types::{
    expense::{ExpenseSplitsCreated, ExpenseSplitsNew, SplitView},
    group::{GroupNew, GroupView, MemberView, MembersResponse},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{Group, Member, MoneyCents, RecordSplitsCmd, Split};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn group_view(group: Group) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name,
        created_by: group.created_by,
        created_at: group.created_at,
    }
}

fn member_view(member: Member) -> MemberView {
    MemberView {
        username: member.member_id,
        display_name: member.display_name,
        joined_at: member.joined_at,
        left_at: member.left_at,
    }
}

fn split_view(split: Split) -> SplitView {
    SplitView {
        id: split.id,
        expense_id: split.expense_id,
        payer_id: split.payer_id,
        owed_by_id: split.owed_by_id,
        amount_minor: split.amount.cents(),
        is_paid: split.is_paid,
    }
}

pub async fn group_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let group = state
        .engine
        .create_group(&payload.name, &user.username)
        .await?;

    Ok((StatusCode::CREATED, Json(group_view(group))))
}

pub async fn join(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MemberView>, ServerError> {
    let member = state.engine.join_group(group_id, &user.username).await?;
    Ok(Json(member_view(member)))
}

pub async fn leave(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.leave_group(group_id, &user.username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MembersResponse>, ServerError> {
    let members = state.engine.list_members(group_id, &user.username).await?;

    Ok(Json(MembersResponse {
        members: members.into_iter().map(member_view).collect(),
    }))
}

pub async fn expense_splits_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<ExpenseSplitsNew>,
) -> Result<(StatusCode, Json<ExpenseSplitsCreated>), ServerError> {
    let payer_id = payload.payer_id.unwrap_or_else(|| user.username.clone());
    let created_at = payload
        .occurred_at
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

    let cmd = payload.shares.into_iter().fold(
        RecordSplitsCmd::new(group_id, payload.expense_id, payer_id).created_at(created_at),
        |cmd, share| cmd.share(share.owed_by, MoneyCents::new(share.amount_minor)),
    );
    let splits = state
        .engine
        .record_expense_splits(cmd, &user.username)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ExpenseSplitsCreated {
            splits: splits.into_iter().map(split_view).collect(),
        }),
    ))
}
