/*
 * Responsibility
 * - rooms の request/response DTO
 * - validate() は形式チェックのみ。メンバー規則は services::rooms::policy
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repos::{Room, RoomListTarget};

pub const ROOM_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RoomListQuery {
    pub target: Option<String>,
}

impl RoomListQuery {
    pub fn target(&self) -> Result<RoomListTarget, &'static str> {
        match self.target.as_deref() {
            None | Some("") => Ok(RoomListTarget::default()),
            Some(raw) => raw
                .parse()
                .map_err(|_| "target must be one of: all, joined"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

impl CreateRoomRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("name is required");
        }
        if name.chars().count() > ROOM_NAME_MAX_CHARS {
            return Err("name must be <= 100 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub member_id: String,
}

impl AddMemberRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.member_id.trim().is_empty() {
            return Err("member_id is required");
        }
        Ok(())
    }
}

/// A room as seen by one caller.
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub is_private: bool,
    pub is_member: bool,
    pub is_owner: bool,
    pub member_count: usize,
    pub created_at: DateTime<Utc>,
}

impl RoomResponse {
    pub fn for_caller(room: Room, caller: &str) -> Self {
        Self {
            is_member: room.has_member(caller),
            is_owner: room.owner_id == caller,
            member_count: room.members.len(),
            id: room.id,
            name: room.name,
            owner_id: room.owner_id,
            is_private: room.is_private,
            created_at: room.created_at,
        }
    }
}
