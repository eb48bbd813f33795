//! Group routes. Membership edits exist twice: `add`/`remove` for members
//! of the group and `insert`/`pull` for admins.

use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::dtos::groups::{CreateGroupRequest, DeleteGroupRequest, MembersRequest};
use crate::middleware::Session;
use crate::services::Audience;
use crate::utils::JsonBody;
use crate::AppState;

pub async fn create_group(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<CreateGroupRequest>,
) -> Response {
    let result = state.groups.create(&mut session, req).await;
    session.reply(result)
}

pub async fn list_groups(State(state): State<AppState>, mut session: Session) -> Response {
    let result = state.groups.list(&mut session).await;
    session.reply(result)
}

pub async fn get_group(
    State(state): State<AppState>,
    mut session: Session,
    Path(name): Path<String>,
) -> Response {
    let result = state.groups.get(&mut session, &name).await;
    session.reply(result)
}

pub async fn add_to_group(
    state: State<AppState>,
    session: Session,
    name: Path<String>,
    body: JsonBody<MembersRequest>,
) -> Response {
    add_members(state, session, name, body, Audience::Member).await
}

pub async fn insert_into_group(
    state: State<AppState>,
    session: Session,
    name: Path<String>,
    body: JsonBody<MembersRequest>,
) -> Response {
    add_members(state, session, name, body, Audience::Admin).await
}

pub async fn remove_from_group(
    state: State<AppState>,
    session: Session,
    name: Path<String>,
    body: JsonBody<MembersRequest>,
) -> Response {
    remove_members(state, session, name, body, Audience::Member).await
}

pub async fn pull_from_group(
    state: State<AppState>,
    session: Session,
    name: Path<String>,
    body: JsonBody<MembersRequest>,
) -> Response {
    remove_members(state, session, name, body, Audience::Admin).await
}

pub async fn delete_group(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<DeleteGroupRequest>,
) -> Response {
    let result = state.groups.delete(&mut session, req).await;
    session.reply(result)
}

async fn add_members(
    State(state): State<AppState>,
    mut session: Session,
    Path(name): Path<String>,
    JsonBody(req): JsonBody<MembersRequest>,
    audience: Audience,
) -> Response {
    let result = state
        .groups
        .add_members(&mut session, &name, req, audience)
        .await;
    session.reply(result)
}

async fn remove_members(
    State(state): State<AppState>,
    mut session: Session,
    Path(name): Path<String>,
    JsonBody(req): JsonBody<MembersRequest>,
    audience: Audience,
) -> Response {
    let result = state
        .groups
        .remove_members(&mut session, &name, req, audience)
        .await;
    session.reply(result)
}
