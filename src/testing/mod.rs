//! In-memory collaborators and fixtures shared by unit and router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header, request},
};
use chrono::Utc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::build_router;
use crate::config::{AppEnv, Config, Secrets};
use crate::repos::{Message, MessageRepo, NewRoom, RepoError, Room, RoomListTarget, RoomRepo};
use crate::services::auth::{AntiForgeryChecker, Identity};
use crate::services::auth::token::{AccessTokenClaims, sign_access_token};
use crate::services::cache::{CacheClient, CacheError, client::CacheResult};
use crate::services::profiles::{LookupError, ProfileDirectory};
use crate::state::{AppState, Collaborators};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const CSRF_SECRET: &str = "test-csrf-secret";

pub fn identity(subject: &str) -> Identity {
    Identity {
        subject: subject.to_string(),
        email: format!("{subject}@example.com"),
    }
}

pub fn room(owner: &str, members: &[&str]) -> Room {
    Room {
        id: Uuid::new_v4(),
        name: format!("{owner}'s room"),
        owner_id: owner.to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
        is_private: false,
        created_at: Utc::now(),
    }
}

pub fn message(room_id: Uuid, sender: &str, body: &str) -> Message {
    Message {
        id: Uuid::new_v4(),
        room_id,
        sender: sender.to_string(),
        body: body.to_string(),
        created_at: Utc::now(),
        read_by: vec![sender.to_string()],
    }
}

/// `Authorization` header value for `subject`, valid for ten minutes.
pub fn bearer(subject: &str) -> String {
    let claims = AccessTokenClaims {
        sub: subject.to_string(),
        email: format!("{subject}@example.com"),
        exp: (Utc::now().timestamp() + 600) as u64,
        iat: None,
    };
    format!("Bearer {}", sign_access_token(JWT_SECRET, &claims).unwrap())
}

fn unavailable() -> RepoError {
    RepoError::Unavailable("switched off by test".into())
}

#[derive(Default)]
pub struct MemoryRoomRepo {
    rooms: Mutex<Vec<Room>>,
    fail_reads: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl MemoryRoomRepo {
    pub fn with_rooms(rooms: Vec<Room>) -> Self {
        Self {
            rooms: Mutex::new(rooms),
            ..Default::default()
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn delay_reads(&self, d: Duration) {
        *self.read_delay.lock().unwrap() = Some(d);
    }

    pub fn count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }

    pub fn get(&self, id: Uuid) -> Option<Room> {
        self.rooms.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    fn with_room<T>(&self, id: Uuid, f: impl FnOnce(&mut Room) -> T) -> Option<T> {
        self.rooms.lock().unwrap().iter_mut().find(|r| r.id == id).map(f)
    }
}

#[async_trait]
impl RoomRepo for MemoryRoomRepo {
    async fn list_for(
        &self,
        subject: &str,
        target: RoomListTarget,
    ) -> Result<Vec<Room>, RepoError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms
            .iter()
            .filter(|r| match target {
                RoomListTarget::All => !r.is_private || r.has_member(subject),
                RoomListTarget::Joined => r.has_member(subject),
            })
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Room>, RepoError> {
        Ok(self.rooms.lock().unwrap().clone())
    }

    async fn create(&self, new: NewRoom) -> Result<Room, RepoError> {
        let created = Room {
            id: Uuid::new_v4(),
            name: new.name,
            members: vec![new.owner_id.clone()],
            owner_id: new.owner_id,
            is_private: new.is_private,
            created_at: Utc::now(),
        };
        self.rooms.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_room_by_id(&self, room_id: Uuid) -> Result<Option<Room>, RepoError> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.get(room_id))
    }

    async fn add_member(&self, room_id: Uuid, subject: &str) -> Result<bool, RepoError> {
        Ok(self
            .with_room(room_id, |r| {
                if !r.has_member(subject) {
                    r.members.push(subject.to_string());
                }
            })
            .is_some())
    }

    async fn remove_member(&self, room_id: Uuid, subject: &str) -> Result<bool, RepoError> {
        Ok(self
            .with_room(room_id, |r| r.members.retain(|m| m != subject))
            .is_some())
    }

    async fn delete(&self, room_id: Uuid) -> Result<bool, RepoError> {
        let mut rooms = self.rooms.lock().unwrap();
        let before = rooms.len();
        rooms.retain(|r| r.id != room_id);
        Ok(rooms.len() != before)
    }
}

#[derive(Default)]
pub struct MemoryMessageRepo {
    messages: Mutex<Vec<Message>>,
    failing_room: Mutex<Option<Uuid>>,
    read_delay: Mutex<Option<Duration>>,
    list_calls: AtomicUsize,
}

impl MemoryMessageRepo {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    pub fn fail_room(&self, room_id: Uuid) {
        *self.failing_room.lock().unwrap() = Some(room_id);
    }

    pub fn delay_reads(&self, d: Duration) {
        *self.read_delay.lock().unwrap() = Some(d);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageRepo for MemoryMessageRepo {
    async fn list(&self, room_id: Uuid) -> Result<Vec<Message>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if *self.failing_room.lock().unwrap() == Some(room_id) {
            return Err(unavailable());
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn create(&self, room_id: Uuid, sender: &str, body: &str) -> Result<Message, RepoError> {
        let created = message(room_id, sender, body);
        self.messages.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn mark_read(
        &self,
        room_id: Uuid,
        message_ids: &[Uuid],
        reader: &str,
    ) -> Result<u64, RepoError> {
        let mut changed = 0;
        for m in self.messages.lock().unwrap().iter_mut() {
            if m.room_id == room_id && message_ids.contains(&m.id) && !m.is_read_by(reader) {
                m.read_by.push(reader.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn find(&self, room_id: Uuid, message_id: Uuid) -> Result<Option<Message>, RepoError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.room_id == room_id && m.id == message_id)
            .cloned())
    }

    async fn delete(&self, room_id: Uuid, message_id: Uuid) -> Result<bool, RepoError> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| !(m.room_id == room_id && m.id == message_id));
        Ok(messages.len() != before)
    }
}

/// TTLs are recorded, not enforced.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    last_ttl: Mutex<Option<Duration>>,
}

impl MemoryCache {
    pub fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock().unwrap()
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::BackendCommand("read switched off".into()));
        }
        Ok(self.stored(key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::BackendCommand("write switched off".into()));
        }
        self.put(key, value);
        *self.last_ttl.lock().unwrap() = Some(ttl);
        Ok(())
    }
}

pub struct FakeDirectory {
    payload: Option<String>,
    requested: Mutex<Vec<Vec<String>>>,
}

impl FakeDirectory {
    pub fn returning(payload: &str) -> Self {
        Self {
            payload: Some(payload.to_string()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub fn requested(&self) -> Vec<Vec<String>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileDirectory for FakeDirectory {
    async fn fetch_profiles(&self, subject_ids: &[String]) -> Result<String, LookupError> {
        self.requested.lock().unwrap().push(subject_ids.to_vec());
        self.payload
            .clone()
            .ok_or_else(|| LookupError::Transport("connection refused".into()))
    }
}

pub fn config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        app_env: AppEnv::Development,
        database_url: "postgres://unused".into(),
        redis_url: "redis://unused".into(),
        profile_api_base_url: "http://profiles.test".into(),
        secrets: Secrets {
            jwt_secret: JWT_SECRET.into(),
            csrf_secret: CSRF_SECRET.into(),
        },
        access_token_leeway_seconds: 0,
        csrf_token_ttl_seconds: 3600,
        profile_cache_ttl: Duration::from_secs(60),
        store_timeout: Duration::from_secs(10),
        request_timeout: Duration::from_secs(30),
        request_body_limit_bytes: 1024 * 1024,
        cors_allowed_origins: Vec::new(),
        forbidden_words: Vec::new(),
    }
}

pub fn csrf_token() -> String {
    AntiForgeryChecker::new(CSRF_SECRET, 3600).issue(Utc::now().timestamp())
}

/// Request builder, authenticated as `subject` when given.
pub fn request(method: Method, uri: &str, subject: Option<&str>) -> request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match subject {
        Some(s) => builder.header(header::AUTHORIZATION, bearer(s)),
        None => builder,
    }
}

/// Authenticated JSON request carrying a valid anti-forgery header.
pub fn mutating(method: Method, uri: &str, subject: &str, json: serde_json::Value) -> Request<Body> {
    request(method, uri, Some(subject))
        .header("x-csrf-token", csrf_token())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Authenticated urlencoded form request; the anti-forgery token travels as `_csrf`.
pub fn form(method: Method, uri: &str, subject: &str, fields: &str) -> Request<Body> {
    request(method, uri, Some(subject))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("{fields}&_csrf={}", csrf_token())))
        .unwrap()
}

/// The real router over in-memory collaborators.
pub struct TestApp {
    pub rooms: Arc<MemoryRoomRepo>,
    pub messages: Arc<MemoryMessageRepo>,
    pub cache: Arc<MemoryCache>,
    pub directory: Arc<FakeDirectory>,
}

impl TestApp {
    pub fn new(rooms: Vec<Room>) -> Self {
        Self {
            rooms: Arc::new(MemoryRoomRepo::with_rooms(rooms)),
            messages: Arc::new(MemoryMessageRepo::default()),
            cache: Arc::new(MemoryCache::default()),
            directory: Arc::new(FakeDirectory::returning("[]")),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Arc::new(MemoryMessageRepo::with_messages(messages));
        self
    }

    pub fn with_directory(mut self, directory: FakeDirectory) -> Self {
        self.directory = Arc::new(directory);
        self
    }

    pub fn router(&self) -> Router {
        let config = config();
        let state = AppState::new(
            Collaborators {
                rooms: self.rooms.clone(),
                messages: self.messages.clone(),
                cache: self.cache.clone(),
                directory: self.directory.clone(),
            },
            &config,
        );
        build_router(state, &config)
    }

    /// Status and body: JSON when it parses, a JSON string otherwise, `Null` when empty.
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self.send_full(req).await;
        (status, body)
    }

    pub async fn send_full(
        &self,
        req: Request<Body>,
    ) -> (StatusCode, header::HeaderMap, serde_json::Value) {
        let res = self.router().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, headers, body)
    }
}
