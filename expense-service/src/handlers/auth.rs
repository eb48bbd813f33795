use axum::{extract::State, response::Response};

use crate::dtos::auth::{LoginRequest, RegisterRequest};
use crate::middleware::Session;
use crate::utils::JsonBody;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Response {
    let result = state.users.register(req).await;
    session.reply(result)
}

pub async fn register_admin(
    State(state): State<AppState>,
    session: Session,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Response {
    let result = state.users.register_admin(req).await;
    session.reply(result)
}

/// Issues a new token pair as cookies; the pair is echoed in the body.
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Response {
    let result = state.sessions.login(&mut session, req).await;
    session.reply(result)
}

pub async fn logout(State(state): State<AppState>, mut session: Session) -> Response {
    let result = state.sessions.logout(&mut session).await;
    session.reply(result)
}
