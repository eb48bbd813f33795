use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::dtos::auth::DeleteUserRequest;
use crate::middleware::Session;
use crate::utils::JsonBody;
use crate::AppState;

pub async fn list_users(State(state): State<AppState>, mut session: Session) -> Response {
    let result = state.users.list(&mut session).await;
    session.reply(result)
}

pub async fn get_user(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
) -> Response {
    let result = state.users.get(&mut session, &username).await;
    session.reply(result)
}

pub async fn delete_user(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<DeleteUserRequest>,
) -> Response {
    let result = state.users.delete(&mut session, req).await;
    session.reply(result)
}
