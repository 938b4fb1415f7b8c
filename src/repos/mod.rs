/*
 * Responsibility
 * - rooms / messages の永続化境界 (trait + Postgres 実装)
 */
pub mod error;
pub mod message_repo;
pub mod room_repo;

pub use error::RepoError;
pub use message_repo::{Message, MessageRepo, PgMessageRepo};
pub use room_repo::{NewRoom, PgRoomRepo, Room, RoomListTarget, RoomRepo};
