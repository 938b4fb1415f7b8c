/*
 * Responsibility
 * - RoomRepo trait 経由の rooms テーブルアクセス
 * - members は重複なしの TEXT[] (add_member は集合的に追加)
 * - room 削除時は messages も同一トランザクションで削除
 */
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub members: Vec<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn has_member(&self, subject: &str) -> bool {
        self.members.iter().any(|m| m == subject)
    }
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub owner_id: String,
    pub is_private: bool,
}

/// Which rooms `GET /rooms` returns for a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomListTarget {
    /// public rooms plus every room the caller belongs to
    #[default]
    All,
    Joined,
}

impl FromStr for RoomListTarget {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "joined" => Ok(Self::Joined),
            _ => Err(()),
        }
    }
}

#[async_trait]
pub trait RoomRepo: Send + Sync {
    async fn list_for(&self, subject: &str, target: RoomListTarget)
    -> Result<Vec<Room>, RepoError>;

    async fn list_all(&self) -> Result<Vec<Room>, RepoError>;

    /// The owner is stored as the first member.
    async fn create(&self, room: NewRoom) -> Result<Room, RepoError>;

    async fn find_room_by_id(&self, room_id: Uuid) -> Result<Option<Room>, RepoError>;

    /// Returns false when the room does not exist. Adding an existing member is a no-op.
    async fn add_member(&self, room_id: Uuid, subject: &str) -> Result<bool, RepoError>;

    /// Returns false when the room does not exist.
    async fn remove_member(&self, room_id: Uuid, subject: &str) -> Result<bool, RepoError>;

    async fn delete(&self, room_id: Uuid) -> Result<bool, RepoError>;
}

#[derive(Clone, Debug)]
pub struct PgRoomRepo {
    pool: PgPool,
}

impl PgRoomRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepo for PgRoomRepo {
    async fn list_for(
        &self,
        subject: &str,
        target: RoomListTarget,
    ) -> Result<Vec<Room>, RepoError> {
        let sql = match target {
            RoomListTarget::All => {
                r#"
                SELECT id, name, owner_id, members, is_private, created_at
                FROM rooms
                WHERE is_private = false OR $1 = ANY(members)
                ORDER BY created_at DESC
                "#
            }
            RoomListTarget::Joined => {
                r#"
                SELECT id, name, owner_id, members, is_private, created_at
                FROM rooms
                WHERE $1 = ANY(members)
                ORDER BY created_at DESC
                "#
            }
        };

        let rows = sqlx::query_as::<_, Room>(sql)
            .bind(subject)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_all(&self) -> Result<Vec<Room>, RepoError> {
        let rows = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, name, owner_id, members, is_private, created_at
            FROM rooms
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn create(&self, room: NewRoom) -> Result<Room, RepoError> {
        let members = vec![room.owner_id.clone()];
        let row = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (name, owner_id, members, is_private)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, owner_id, members, is_private, created_at
            "#,
        )
        .bind(&room.name)
        .bind(&room.owner_id)
        .bind(&members)
        .bind(room.is_private)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_room_by_id(&self, room_id: Uuid) -> Result<Option<Room>, RepoError> {
        let row = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, name, owner_id, members, is_private, created_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn add_member(&self, room_id: Uuid, subject: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET members = CASE
                WHEN $2 = ANY(members) THEN members
                ELSE array_append(members, $2)
            END
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .bind(subject)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, room_id: Uuid, subject: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET members = array_remove(members, $2)
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .bind(subject)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, room_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r#"DELETE FROM messages WHERE room_id = $1"#)
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(r#"DELETE FROM rooms WHERE id = $1"#)
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
