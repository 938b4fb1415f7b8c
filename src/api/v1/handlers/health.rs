/*
 * Responsibility
 * - GET /health (死活確認。他の v1 route と同じく pipeline の後ろ)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
