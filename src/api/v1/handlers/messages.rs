/*
 * Responsibility
 * - /rooms/{room_id}/messages の handler (メンバーのみ)
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    api::v1::{
        dto::messages::{CreateMessageRequest, MarkReadRequest, MarkReadResponse, MessageResponse},
        extractors::{JsonOrForm, RoomCtx},
    },
    error::AppError,
    services::rooms::policy,
    state::AppState,
};

pub async fn list_messages(
    State(state): State<AppState>,
    ctx: RoomCtx,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    policy::require_member(&ctx.facts)?;

    let rows = state.messages.list(ctx.facts.room.id).await?;
    let res = rows
        .into_iter()
        .map(|m| MessageResponse::for_caller(m, &ctx.identity.subject))
        .collect();

    Ok(Json(res))
}

pub async fn create_message(
    State(state): State<AppState>,
    ctx: RoomCtx,
    JsonOrForm(req): JsonOrForm<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    policy::require_member(&ctx.facts)?;
    req.validate()
        .map_err(|m| AppError::bad_request("VALIDATION_ERROR", m))?;

    let row = state
        .messages
        .create(ctx.facts.room.id, &ctx.identity.subject, &req.message)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::for_caller(row, &ctx.identity.subject)),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    ctx: RoomCtx,
    JsonOrForm(req): JsonOrForm<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, AppError> {
    policy::require_member(&ctx.facts)?;
    req.validate()
        .map_err(|m| AppError::bad_request("VALIDATION_ERROR", m))?;

    let updated = state
        .messages
        .mark_read(ctx.facts.room.id, &req.message_ids, &ctx.identity.subject)
        .await?;

    Ok(Json(MarkReadResponse { updated }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    ctx: RoomCtx,
    Path((_, message_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    policy::require_member(&ctx.facts)?;

    let message = state
        .messages
        .find(ctx.facts.room.id, message_id)
        .await?
        .ok_or(AppError::not_found("message"))?;

    policy::can_delete_message(&ctx.facts, &ctx.identity.subject, &message.sender)?;

    if !state.messages.delete(ctx.facts.room.id, message_id).await? {
        return Err(AppError::not_found("message"));
    }
    Ok(StatusCode::NO_CONTENT)
}
