/*
 * Responsibility
 * - room route の room を読み込み is_member / is_owner を導出
 * - 毎回 store から読む (リクエスト間でメンバーは変わりうる)
 * - id 不正 / 不在 / store 障害 / timeout はすべて RoomNotFound に寄せる
 */
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::repos::{Room, RoomRepo};
use crate::services::auth::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("room not found")]
pub struct RoomNotFound;

/// Per-request membership facts. Read-only once attached to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAccessFacts {
    pub room: Room,
    pub is_member: bool,
    pub is_owner: bool,
}

impl RoomAccessFacts {
    pub fn derive(room: Room, identity: &Identity) -> Self {
        let is_member = room.has_member(&identity.subject);
        let is_owner = room.owner_id == identity.subject;
        Self {
            room,
            is_member,
            is_owner,
        }
    }
}

#[derive(Clone)]
pub struct RoomAccessResolver {
    rooms: Arc<dyn RoomRepo>,
    timeout: Duration,
}

impl RoomAccessResolver {
    pub fn new(rooms: Arc<dyn RoomRepo>, timeout: Duration) -> Self {
        Self { rooms, timeout }
    }

    pub async fn resolve(
        &self,
        room_id: &str,
        identity: &Identity,
    ) -> Result<RoomAccessFacts, RoomNotFound> {
        let Ok(id) = Uuid::parse_str(room_id) else {
            tracing::debug!(room_id, "room id is not a uuid");
            return Err(RoomNotFound);
        };

        let room = match tokio::time::timeout(self.timeout, self.rooms.find_room_by_id(id)).await {
            Ok(Ok(Some(room))) => room,
            Ok(Ok(None)) => {
                tracing::debug!(room_id = %id, "room does not exist");
                return Err(RoomNotFound);
            }
            Ok(Err(e)) => {
                tracing::warn!(room_id = %id, error = ?e, "room lookup failed");
                return Err(RoomNotFound);
            }
            Err(_) => {
                tracing::warn!(room_id = %id, timeout = ?self.timeout, "room lookup timed out");
                return Err(RoomNotFound);
            }
        };

        Ok(RoomAccessFacts::derive(room, identity))
    }
}
