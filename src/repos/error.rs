/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 * - 接続系の障害 (pool 枯渇/クローズ, I/O) と query エラーを区別する
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[source] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepoError::Unavailable(e.to_string())
            }
            other => RepoError::Db(other),
        }
    }
}
