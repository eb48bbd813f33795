use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::dtos::categories::{CategoryRequest, DeleteCategoriesRequest};
use crate::middleware::Session;
use crate::utils::JsonBody;
use crate::AppState;

pub async fn create_category(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Response {
    let result = state.categories.create(&mut session, req).await;
    session.reply(result)
}

pub async fn update_category(
    State(state): State<AppState>,
    mut session: Session,
    Path(category_type): Path<String>,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Response {
    let result = state
        .categories
        .update(&mut session, &category_type, req)
        .await;
    session.reply(result)
}

pub async fn delete_categories(
    State(state): State<AppState>,
    mut session: Session,
    JsonBody(req): JsonBody<DeleteCategoriesRequest>,
) -> Response {
    let result = state.categories.delete(&mut session, req).await;
    session.reply(result)
}

pub async fn list_categories(State(state): State<AppState>, mut session: Session) -> Response {
    let result = state.categories.list(&mut session).await;
    session.reply(result)
}
