/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - ここの route はすべて request pipeline の後ろ (app.rs で適用)
 * - {room_id} を持つ route は handler 前に RoomAccessFacts を解決済み
 */
use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use crate::api::v1::handlers::{
    csrf::issue_csrf_token,
    health::health,
    messages::{create_message, delete_message, list_messages, mark_read},
    rooms::{
        add_member, create_room, delete_room, get_room, join_room, leave_room, list_members,
        list_rooms, remove_member,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/csrf", get(issue_csrf_token))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room_id}", get(get_room).delete(delete_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route(
            "/rooms/{room_id}/members",
            get(list_members).post(add_member),
        )
        .route(
            "/rooms/{room_id}/members/{member_id}",
            delete(remove_member),
        )
        .route(
            "/rooms/{room_id}/messages",
            get(list_messages).post(create_message),
        )
        .route("/rooms/{room_id}/messages/read", post(mark_read))
        .route(
            "/rooms/{room_id}/messages/{message_id}",
            delete(delete_message),
        )
}
