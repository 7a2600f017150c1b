//! Notification inbox endpoint

use api_types::notification::{NotificationView, NotificationsResponse};
use axum::{Extension, Json, extract::State};
use engine::SettlementEvent;

use crate::{server::ServerState, user};

fn notification_view(event: SettlementEvent) -> NotificationView {
    NotificationView {
        kind: event.kind.as_str().to_string(),
        message: event.message(),
        settlement_id: event.settlement_id,
        group_id: event.group_id,
        actor_id: event.actor_id,
        amount_minor: event.amount.cents(),
    }
}

/// Returns and clears the caller's pending notifications, oldest first.
pub async fn drain(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Json<NotificationsResponse> {
    let notifications = state
        .inbox
        .drain(&user.username)
        .into_iter()
        .map(notification_view)
        .collect();

    Json(NotificationsResponse { notifications })
}
