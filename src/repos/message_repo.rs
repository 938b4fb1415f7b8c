/*
 * Responsibility
 * - MessageRepo trait 経由の messages テーブルアクセス
 * - 全操作を room_id で絞る (別 room の message id はヒットしない)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_by: Vec<String>,
}

impl Message {
    pub fn is_read_by(&self, subject: &str) -> bool {
        self.read_by.iter().any(|r| r == subject)
    }
}

#[async_trait]
pub trait MessageRepo: Send + Sync {
    async fn list(&self, room_id: Uuid) -> Result<Vec<Message>, RepoError>;

    /// The sender has implicitly read their own message.
    async fn create(&self, room_id: Uuid, sender: &str, body: &str)
    -> Result<Message, RepoError>;

    /// Returns how many messages changed.
    async fn mark_read(
        &self,
        room_id: Uuid,
        message_ids: &[Uuid],
        reader: &str,
    ) -> Result<u64, RepoError>;

    async fn find(&self, room_id: Uuid, message_id: Uuid) -> Result<Option<Message>, RepoError>;

    async fn delete(&self, room_id: Uuid, message_id: Uuid) -> Result<bool, RepoError>;
}

#[derive(Clone, Debug)]
pub struct PgMessageRepo {
    pool: PgPool,
}

impl PgMessageRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepo for PgMessageRepo {
    async fn list(&self, room_id: Uuid) -> Result<Vec<Message>, RepoError> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, room_id, sender, body, created_at, read_by
            FROM messages
            WHERE room_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn create(
        &self,
        room_id: Uuid,
        sender: &str,
        body: &str,
    ) -> Result<Message, RepoError> {
        let read_by = vec![sender.to_string()];
        let row = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (room_id, sender, body, read_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, room_id, sender, body, created_at, read_by
            "#,
        )
        .bind(room_id)
        .bind(sender)
        .bind(body)
        .bind(&read_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_read(
        &self,
        room_id: Uuid,
        message_ids: &[Uuid],
        reader: &str,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read_by = array_append(read_by, $3)
            WHERE room_id = $1
              AND id = ANY($2)
              AND NOT ($3 = ANY(read_by))
            "#,
        )
        .bind(room_id)
        .bind(message_ids)
        .bind(reader)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find(&self, room_id: Uuid, message_id: Uuid) -> Result<Option<Message>, RepoError> {
        let row = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, room_id, sender, body, created_at, read_by
            FROM messages
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete(&self, room_id: Uuid, message_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
