use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{groups, notifications, settlements, user};
use engine::{Engine, InboxNotifier};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    /// Same inbox the engine emits settlement events into.
    pub inbox: Arc<InboxNotifier>,
}

async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Username.eq(auth_header.username()))
        .filter(user::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|err| {
            tracing::error!("failed to look up user: {err}");
            StatusCode::UNAUTHORIZED
        })?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/groups", post(groups::group_new))
        .route("/groups/{group_id}/join", post(groups::join))
        .route("/groups/{group_id}/leave", post(groups::leave))
        .route("/groups/{group_id}/members", get(groups::members))
        .route("/groups/{group_id}/expenses", post(groups::expense_splits_new))
        .route(
            "/groups/{group_id}/settlements",
            get(settlements::view).post(settlements::settlement_new),
        )
        .route(
            "/groups/{group_id}/settlements/{settlement_id}",
            get(settlements::get).patch(settlements::update),
        )
        .route(
            "/groups/{group_id}/settlements/{settlement_id}/confirm",
            post(settlements::confirm),
        )
        .route(
            "/groups/{group_id}/settlements/{settlement_id}/reject",
            post(settlements::reject),
        )
        .route("/notifications", get(notifications::drain))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}
