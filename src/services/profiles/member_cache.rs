/*
 * Responsibility
 * - room メンバーの profile を cache-aside で返す (key は `room:<id>:members`)
 * - cache 障害は外部 lookup にフォールバックし、呼び出し側には出さない
 * - メンバー変更では無効化しない (古さは TTL まで)
 */
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repos::Room;
use crate::services::cache::CacheClient;
use crate::services::profiles::{LookupError, ProfileDirectory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub uuid: String,
    pub name: String,
    pub email: String,
}

impl Profile {
    fn bare(uuid: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            name: String::new(),
            email: String::new(),
        }
    }
}

/// Record shape returned by the identity service.
#[derive(Debug, Deserialize)]
struct ProfileRecord {
    uuid: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
}

pub fn cache_key(room_id: Uuid) -> String {
    format!("room:{room_id}:members")
}

fn parse_records(raw: &str) -> Result<Vec<ProfileRecord>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// One entry per member, in member order. Unknown members keep only their id.
fn match_members(members: &[String], records: Vec<ProfileRecord>) -> Vec<Profile> {
    let mut by_id: HashMap<String, ProfileRecord> =
        records.into_iter().map(|r| (r.uuid.clone(), r)).collect();

    members
        .iter()
        .map(|m| match by_id.remove(m) {
            Some(r) => Profile {
                uuid: r.uuid,
                name: r.username,
                email: r.email,
            },
            None => Profile::bare(m),
        })
        .collect()
}

#[derive(Clone)]
pub struct MemberProfileCache {
    cache: Arc<dyn CacheClient>,
    directory: Arc<dyn ProfileDirectory>,
    ttl: Duration,
}

impl MemberProfileCache {
    pub fn new(
        cache: Arc<dyn CacheClient>,
        directory: Arc<dyn ProfileDirectory>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            directory,
            ttl,
        }
    }

    pub async fn get_member_profiles(&self, room: &Room) -> Result<Vec<Profile>, LookupError> {
        let key = cache_key(room.id);

        if let Some(records) = self.read_cached(&key).await {
            return Ok(match_members(&room.members, records));
        }

        let raw = self.directory.fetch_profiles(&room.members).await?;
        let records = parse_records(&raw).map_err(|e| LookupError::Payload(e.to_string()))?;

        if let Err(e) = self.cache.set_with_ttl(&key, &raw, self.ttl).await {
            tracing::warn!(
                backend = self.cache.backend_name(),
                key = %key,
                error = %e,
                "failed to store member profiles"
            );
        }

        Ok(match_members(&room.members, records))
    }

    /// `None` means "go to the source": miss, empty value, backend error or unreadable entry.
    async fn read_cached(&self, key: &str) -> Option<Vec<ProfileRecord>> {
        let raw = match self.cache.get_string(key).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(
                    backend = self.cache.backend_name(),
                    key = %key,
                    error = %e,
                    "member profile cache read failed"
                );
                return None;
            }
        };

        match parse_records(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding unreadable cached profiles");
                None
            }
        }
    }
}
