//! Conversation session routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::conversation::{Session, DEFAULT_CONTEXT_LIMIT};
use crate::error::{DeskError, Result};

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.conversations.list_sessions().await;
    let current = state.conversations.current_session().await.map(|s| s.id);
    Json(json!({ "sessions": sessions, "currentSessionId": current }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleRequest {
    title: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    body: Option<Json<TitleRequest>>,
) -> Result<(StatusCode, Json<Session>)> {
    let title = body.and_then(|Json(b)| b.title);
    let session = state.conversations.create_session(title.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn current(State(state): State<AppState>) -> Result<Json<Session>> {
    state
        .conversations
        .current_session()
        .await
        .map(Json)
        .ok_or_else(|| DeskError::NotFound("no current conversation".into()))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Session>> {
    Ok(Json(state.conversations.get_session(&id).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.conversations.delete_session(&id).await?;
    let current = state.conversations.current_session().await.map(|s| s.id);
    Ok(Json(json!({ "deleted": true, "currentSessionId": current })))
}

pub async fn rename(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TitleRequest>,
) -> Result<Json<Session>> {
    let title = body
        .title
        .ok_or_else(|| DeskError::Validation("title is required".into()))?;
    Ok(Json(state.conversations.rename_session(&id, &title).await?))
}

pub async fn switch(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Session>> {
    Ok(Json(state.conversations.switch_session(&id).await?))
}

pub async fn clear(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Session>> {
    Ok(Json(state.conversations.clear_session(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ContextParams {
    limit: Option<usize>,
}

pub async fn context(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ContextParams>,
) -> Result<Json<Value>> {
    let limit = params.limit.unwrap_or(DEFAULT_CONTEXT_LIMIT);
    let context = state.conversations.context_window(Some(&id), limit).await?;
    Ok(Json(json!({ "sessionId": id, "limit": limit, "context": context })))
}
