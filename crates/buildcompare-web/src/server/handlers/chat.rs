//! `POST /api/chat`: concierge answer streamed as plain text.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use buildcompare_core::chunk_stream;
use futures::StreamExt;
use serde::Deserialize;

use super::super::error::ApiError;
use super::super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Answer source, exposed for clients that want to label the reply.
pub const HEADER_ANSWER_TIER: &str = "x-answer-tier";

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::invalid("message is required"));
    }

    let answer = state.concierge.answer(message).await?;
    tracing::debug!(tier = %answer.tier, model = ?answer.model, "chat answered");

    let chunks = chunk_stream(answer.text, state.chunking).map(Ok::<_, Infallible>);
    let mut response = Body::from_stream(chunks).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(HEADER_ANSWER_TIER, HeaderValue::from_static(answer.tier.as_str()));
    Ok(response)
}
