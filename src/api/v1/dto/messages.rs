/*
 * Responsibility
 * - messages の request/response DTO
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::repos::Message;

pub const MESSAGE_MAX_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub message: String,
}

impl CreateMessageRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.message.trim().is_empty() {
            return Err("message is required");
        }
        if self.message.chars().count() > MESSAGE_MAX_CHARS {
            return Err("message must be <= 2000 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(deserialize_with = "message_ids")]
    pub message_ids: Vec<Uuid>,
}

/// JSON sends an array; a form sends `message_ids=<id>,<id>`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageIds {
    List(Vec<Uuid>),
    Joined(String),
}

fn message_ids<'de, D>(deserializer: D) -> Result<Vec<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    match MessageIds::deserialize(deserializer)? {
        MessageIds::List(ids) => Ok(ids),
        MessageIds::Joined(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Uuid::parse_str(s).map_err(serde::de::Error::custom))
            .collect(),
    }
}

impl MarkReadRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.message_ids.is_empty() {
            return Err("message_ids must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// `is_read` is from the caller's point of view.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl MessageResponse {
    pub fn for_caller(m: Message, caller: &str) -> Self {
        Self {
            is_read: m.is_read_by(caller),
            id: m.id,
            room_id: m.room_id,
            sender: m.sender,
            message: m.body,
            created_at: m.created_at,
        }
    }
}
