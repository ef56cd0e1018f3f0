use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{
    entities::{NewTodo, TodoUpdate},
    error::AuthError,
    guard::AuthUser,
    AppState,
};

pub async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(todo): Json<NewTodo>,
) -> Result<impl IntoResponse, AuthError> {
    if todo.text.trim().is_empty() {
        return Err(AuthError::Validation("todo text is required"));
    }

    let todo = state
        .store
        .create_todo(user.id, &todo.text, todo.completed)
        .await?;
    tracing::debug!(user_id = user.id, todo_id = todo.id, "created todo");

    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_todos(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    let todos = state.store.list_todos(user.id).await?;
    Ok(Json(todos))
}

pub async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(todo_id): Path<i64>,
    Json(update): Json<TodoUpdate>,
) -> Result<impl IntoResponse, AuthError> {
    if update.text.as_deref().is_some_and(|text| text.trim().is_empty()) {
        return Err(AuthError::Validation("todo text is required"));
    }

    match state.store.update_todo(todo_id, user.id, &update).await? {
        Some(todo) => Ok(Json(todo)),
        None => Err(AuthError::NotFound),
    }
}

pub async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(todo_id): Path<i64>,
) -> Result<impl IntoResponse, AuthError> {
    if !state.store.delete_todo(todo_id, user.id).await? {
        return Err(AuthError::NotFound);
    }

    tracing::debug!(user_id = user.id, todo_id, "deleted todo");
    Ok(Json(json!({ "message": "Todo deleted successfully" })))
}
