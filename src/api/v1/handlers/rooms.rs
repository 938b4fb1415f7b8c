/*
 * Responsibility
 * - /rooms の handler
 * - room route は pipeline から RoomCtx を受け取り、書き込み前に
 *   services::rooms::policy で操作ごとの規則を確認する
 */
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    api::v1::{
        dto::rooms::{AddMemberRequest, CreateRoomRequest, RoomListQuery, RoomResponse},
        extractors::{AuthCtx, JsonOrForm, RoomCtx},
    },
    error::AppError,
    repos::NewRoom,
    services::{profiles::Profile, rooms::policy},
    state::AppState,
};

fn invalid(message: &'static str) -> AppError {
    AppError::bad_request("VALIDATION_ERROR", message)
}

pub async fn list_rooms(
    State(state): State<AppState>,
    AuthCtx(identity): AuthCtx,
    Query(query): Query<RoomListQuery>,
) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let target = query
        .target()
        .map_err(|m| AppError::bad_request("INVALID_TARGET", m))?;

    let rooms = state.rooms.list_for(&identity.subject, target).await?;
    let res = rooms
        .into_iter()
        .map(|r| RoomResponse::for_caller(r, &identity.subject))
        .collect();

    Ok(Json(res))
}

pub async fn create_room(
    State(state): State<AppState>,
    AuthCtx(identity): AuthCtx,
    JsonOrForm(req): JsonOrForm<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    req.validate().map_err(invalid)?;

    let room = state
        .rooms
        .create(NewRoom {
            name: req.name.trim().to_string(),
            owner_id: identity.subject.clone(),
            is_private: req.is_private,
        })
        .await?;
    tracing::info!(room_id = %room.id, owner = %identity.subject, "room created");

    Ok((
        StatusCode::CREATED,
        Json(RoomResponse::for_caller(room, &identity.subject)),
    ))
}

pub async fn get_room(ctx: RoomCtx) -> Result<Json<RoomResponse>, AppError> {
    policy::can_view(&ctx.facts)?;
    Ok(Json(RoomResponse::for_caller(
        ctx.facts.room,
        &ctx.identity.subject,
    )))
}

pub async fn join_room(
    State(state): State<AppState>,
    ctx: RoomCtx,
) -> Result<StatusCode, AppError> {
    policy::can_join(&ctx.facts)?;

    if !state
        .rooms
        .add_member(ctx.facts.room.id, &ctx.identity.subject)
        .await?
    {
        return Err(AppError::not_found("room"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_room(
    State(state): State<AppState>,
    ctx: RoomCtx,
) -> Result<StatusCode, AppError> {
    policy::can_leave(&ctx.facts)?;

    if !state
        .rooms
        .remove_member(ctx.facts.room.id, &ctx.identity.subject)
        .await?
    {
        return Err(AppError::not_found("room"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_room(
    State(state): State<AppState>,
    ctx: RoomCtx,
) -> Result<StatusCode, AppError> {
    policy::require_owner(&ctx.facts)?;

    if !state.rooms.delete(ctx.facts.room.id).await? {
        return Err(AppError::not_found("room"));
    }
    tracing::info!(room_id = %ctx.facts.room.id, "room deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Display profiles may lag membership changes by up to the cache TTL.
pub async fn list_members(
    State(state): State<AppState>,
    ctx: RoomCtx,
) -> Result<Json<Vec<Profile>>, AppError> {
    policy::require_member(&ctx.facts)?;

    let profiles = state.profiles.get_member_profiles(&ctx.facts.room).await?;
    Ok(Json(profiles))
}

pub async fn add_member(
    State(state): State<AppState>,
    ctx: RoomCtx,
    JsonOrForm(req): JsonOrForm<AddMemberRequest>,
) -> Result<StatusCode, AppError> {
    policy::require_owner(&ctx.facts)?;
    req.validate().map_err(invalid)?;

    if !state
        .rooms
        .add_member(ctx.facts.room.id, req.member_id.trim())
        .await?
    {
        return Err(AppError::not_found("room"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    State(state): State<AppState>,
    ctx: RoomCtx,
    Path((_, member_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    policy::can_remove_member(&ctx.facts, &member_id)?;

    if !ctx.facts.room.has_member(&member_id) {
        return Err(AppError::not_found("member"));
    }
    if !state
        .rooms
        .remove_member(ctx.facts.room.id, &member_id)
        .await?
    {
        return Err(AppError::not_found("room"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, StatusCode},
    };
    use serde_json::json;

    use crate::testing::{FakeDirectory, TestApp, form, mutating, request, room};

    fn get(uri: &str, subject: &str) -> axum::http::Request<Body> {
        request(Method::GET, uri, Some(subject))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn list_shows_public_and_joined_rooms() {
        let public = room("a", &["a"]);
        let mut private_joined = room("a", &["a", "me"]);
        private_joined.is_private = true;
        let mut private_other = room("a", &["a"]);
        private_other.is_private = true;
        let app = TestApp::new(vec![public.clone(), private_joined.clone(), private_other]);

        let (status, body) = app.send(get("/api/v1/rooms", "me")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = app.send(get("/api/v1/rooms?target=joined", "me")).await;
        let rooms = body.as_array().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0]["id"], private_joined.id.to_string());

        let (status, body) = app.send(get("/api/v1/rooms?target=owned", "me")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_TARGET");
    }

    #[tokio::test]
    async fn create_makes_the_caller_owner_and_only_member() {
        let app = TestApp::new(vec![]);
        let (status, body) = app
            .send(mutating(
                Method::POST,
                "/api/v1/rooms",
                "u1",
                json!({"name": "  general ", "is_private": true}),
            ))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "general");
        assert_eq!(body["is_owner"], true);
        assert_eq!(body["member_count"], 1);

        let (status, body) = app
            .send(mutating(Method::POST, "/api/v1/rooms", "u1", json!({"name": ""})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn form_bodies_create_rooms_and_add_members() {
        let app = TestApp::new(vec![]);
        let (status, body) = app
            .send(form(Method::POST, "/api/v1/rooms", "u1", "name=general&is_private=true"))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "general");
        assert_eq!(body["is_private"], true);

        let id: uuid::Uuid = body["id"].as_str().unwrap().parse().unwrap();
        let (status, _) = app
            .send(form(
                Method::POST,
                &format!("/api/v1/rooms/{id}/members"),
                "u1",
                "member_id=u2",
            ))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.rooms.get(id).unwrap().has_member("u2"));
    }

    #[tokio::test]
    async fn unreadable_body_is_a_structured_400() {
        let app = TestApp::new(vec![]);
        let req = request(Method::POST, "/api/v1/rooms", Some("u1"))
            .header("x-csrf-token", crate::testing::csrf_token())
            .header(axum::http::header::CONTENT_TYPE, "text/plain")
            .body(Body::from("general"))
            .unwrap();

        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_BODY");
        assert_eq!(app.rooms.count(), 0);
    }

    #[tokio::test]
    async fn private_room_detail_is_members_only() {
        let mut r = room("owner", &["owner"]);
        r.is_private = true;
        let app = TestApp::new(vec![r.clone()]);

        let (status, body) = app
            .send(get(&format!("/api/v1/rooms/{}", r.id), "stranger"))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "NOT_ROOM_MEMBER");
    }

    #[tokio::test]
    async fn join_then_join_again_conflicts() {
        let r = room("owner", &["owner"]);
        let app = TestApp::new(vec![r.clone()]);
        let uri = format!("/api/v1/rooms/{}/join", r.id);

        let (status, _) = app.send(mutating(Method::POST, &uri, "u2", json!({}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.send(mutating(Method::POST, &uri, "u2", json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ALREADY_MEMBER");
        assert_eq!(app.rooms.get(r.id).unwrap().members, vec!["owner", "u2"]);
    }

    #[tokio::test]
    async fn owner_cannot_leave_but_member_can() {
        let r = room("owner", &["owner", "u2"]);
        let app = TestApp::new(vec![r.clone()]);
        let uri = format!("/api/v1/rooms/{}/leave", r.id);

        let (status, body) = app.send(mutating(Method::POST, &uri, "owner", json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "OWNER_CANNOT_LEAVE");

        let (status, _) = app.send(mutating(Method::POST, &uri, "u2", json!({}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!app.rooms.get(r.id).unwrap().has_member("u2"));
    }

    #[tokio::test]
    async fn only_the_owner_deletes_and_manages_members() {
        let r = room("owner", &["owner", "u2"]);
        let app = TestApp::new(vec![r.clone()]);
        let room_uri = format!("/api/v1/rooms/{}", r.id);
        let members_uri = format!("{room_uri}/members");

        let (status, body) = app
            .send(mutating(Method::DELETE, &room_uri, "u2", json!({})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "NOT_ROOM_OWNER");

        let (status, _) = app
            .send(mutating(Method::POST, &members_uri, "owner", json!({"member_id": "u3"})))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.rooms.get(r.id).unwrap().has_member("u3"));

        let (status, body) = app
            .send(mutating(
                Method::DELETE,
                &format!("{members_uri}/owner"),
                "owner",
                json!({}),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "OWNER_CANNOT_BE_REMOVED");

        let (status, _) = app
            .send(mutating(Method::DELETE, &format!("{members_uri}/u2"), "owner", json!({})))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .send(mutating(Method::DELETE, &room_uri, "owner", json!({})))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.rooms.get(r.id).is_none());
    }

    #[tokio::test]
    async fn members_are_listed_with_profiles() {
        let r = room("u1", &["u1", "u2"]);
        let app = TestApp::new(vec![r.clone()]).with_directory(FakeDirectory::returning(
            r#"[{"uuid":"u1","username":"Alice","email":"alice@example.com"}]"#,
        ));
        let uri = format!("/api/v1/rooms/{}/members", r.id);

        let (status, body) = app.send(get(&uri, "u2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"uuid": "u1", "name": "Alice", "email": "alice@example.com"},
                {"uuid": "u2", "name": "", "email": ""}
            ])
        );

        let (status, _) = app.send(get(&uri, "stranger")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn profile_service_failure_is_502() {
        let r = room("u1", &["u1"]);
        let app = TestApp::new(vec![r.clone()]).with_directory(FakeDirectory::failing());

        let (status, body) = app
            .send(get(&format!("/api/v1/rooms/{}/members", r.id), "u1"))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "PROFILE_LOOKUP_FAILED");
    }
}
