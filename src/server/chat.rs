//! Chat routes.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;

use super::AppState;
use crate::chat::ChatReply;
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    message: String,
    session_id: Option<String>,
}

pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Json<ChatReply>> {
    let reply = state
        .chat
        .handle(&request.message, request.session_id.as_deref())
        .await?;
    Ok(Json(reply))
}

/// Chunked `text/plain` answer. Failures after the first chunk are reported in-band.
pub async fn chat_stream(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Response> {
    let chunks = state
        .chat
        .stream(&request.message, request.session_id.as_deref())
        .await?
        .map(|chunk| {
            Ok::<_, Infallible>(match chunk {
                Ok(text) => text,
                Err(e) => format!("\n\n[error] {e}"),
            })
        });
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response())
}
