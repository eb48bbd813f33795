//! Transaction routes. Listings come in member and admin flavours that
//! share a service call and differ only in the [`Audience`].

use axum::{
    extract::{Path, Query, State},
    response::Response,
};

use crate::dtos::transactions::{
    CreateTransactionRequest, DeleteTransactionRequest, DeleteTransactionsRequest,
};
use crate::middleware::Session;
use crate::services::filters::TransactionQuery;
use crate::services::Audience;
use crate::utils::JsonBody;
use crate::AppState;

pub async fn create_transaction(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
    JsonBody(req): JsonBody<CreateTransactionRequest>,
) -> Response {
    let result = state
        .transactions
        .create(&mut session, &username, req)
        .await;
    session.reply(result)
}

pub async fn list_transactions(State(state): State<AppState>, mut session: Session) -> Response {
    let result = state.transactions.list_all(&mut session).await;
    session.reply(result)
}

/// Own transactions, narrowed by `date`, `from`, `upTo`, `min` and `max`.
pub async fn list_user_transactions(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
    Query(query): Query<TransactionQuery>,
) -> Response {
    let result = state
        .transactions
        .list_by_user(&mut session, &username, &query, Audience::Member)
        .await;
    session.reply(result)
}

pub async fn admin_list_user_transactions(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
) -> Response {
    let result = state
        .transactions
        .list_by_user(
            &mut session,
            &username,
            &TransactionQuery::default(),
            Audience::Admin,
        )
        .await;
    session.reply(result)
}

pub async fn list_user_category_transactions(
    state: State<AppState>,
    session: Session,
    path: Path<(String, String)>,
) -> Response {
    user_category(state, session, path, Audience::Member).await
}

pub async fn admin_list_user_category_transactions(
    state: State<AppState>,
    session: Session,
    path: Path<(String, String)>,
) -> Response {
    user_category(state, session, path, Audience::Admin).await
}

pub async fn list_group_transactions(
    state: State<AppState>,
    session: Session,
    name: Path<String>,
) -> Response {
    group(state, session, name, Audience::Member).await
}

pub async fn admin_list_group_transactions(
    state: State<AppState>,
    session: Session,
    name: Path<String>,
) -> Response {
    group(state, session, name, Audience::Admin).await
}

pub async fn list_group_category_transactions(
    state: State<AppState>,
    session: Session,
    path: Path<(String, String)>,
) -> Response {
    group_category(state, session, path, Audience::Member).await
}

pub async fn admin_list_group_category_transactions(
    state: State<AppState>,
    session: Session,
    path: Path<(String, String)>,
) -> Response {
    group_category(state, session, path, Audience::Admin).await
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
    JsonBody(req): JsonBody<DeleteTransactionRequest>,
) -> Response {
    let result = state
        .transactions
        .delete(&mut session, &username, req)
        .await;
    session.reply(result)
}

pub async fn delete_transactions(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<DeleteTransactionsRequest>,
) -> Response {
    let result = state.transactions.delete_many(&mut session, req).await;
    session.reply(result)
}

async fn user_category(
    State(state): State<AppState>,
    mut session: Session,
    Path((username, category)): Path<(String, String)>,
    audience: Audience,
) -> Response {
    let result = state
        .transactions
        .list_by_user_category(&mut session, &username, &category, audience)
        .await;
    session.reply(result)
}

async fn group(
    State(state): State<AppState>,
    mut session: Session,
    Path(name): Path<String>,
    audience: Audience,
) -> Response {
    let result = state
        .transactions
        .list_by_group(&mut session, &name, audience)
        .await;
    session.reply(result)
}

async fn group_category(
    State(state): State<AppState>,
    mut session: Session,
    Path((name, category)): Path<(String, String)>,
    audience: Audience,
) -> Response {
    let result = state
        .transactions
        .list_by_group_category(&mut session, &name, &category, audience)
        .await;
    session.reply(result)
}
