/*
 * Responsibility
 * - Router に渡す共有状態 (AppState)
 * - 依存 (store, cache, profile directory) を service と pipeline に配線
 * - Clone は軽い (中身は Arc)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::middleware::pipeline::{
    Pipeline, Stage,
    stages::{AntiForgeryStage, AuthenticateStage, RoomAccessStage},
};
use crate::repos::{MessageRepo, RoomRepo};
use crate::services::auth::{AntiForgeryChecker, TokenVerifier};
use crate::services::cache::CacheClient;
use crate::services::profiles::{MemberProfileCache, ProfileDirectory};
use crate::services::rooms::RoomAccessResolver;

/// External collaborators the state is built from.
pub struct Collaborators {
    pub rooms: Arc<dyn RoomRepo>,
    pub messages: Arc<dyn MessageRepo>,
    pub cache: Arc<dyn CacheClient>,
    pub directory: Arc<dyn ProfileDirectory>,
}

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<dyn RoomRepo>,
    pub messages: Arc<dyn MessageRepo>,
    pub pipeline: Arc<Pipeline>,
    pub csrf: AntiForgeryChecker,
    pub profiles: MemberProfileCache,
    /// `Secure` attribute on the anti-forgery cookie.
    pub cookie_secure: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(deps: Collaborators, config: &Config) -> Self {
        let csrf = AntiForgeryChecker::new(
            &config.secrets.csrf_secret,
            config.csrf_token_ttl_seconds,
        );
        let verifier = TokenVerifier::new(
            &config.secrets.jwt_secret,
            config.access_token_leeway_seconds,
        );
        let resolver = RoomAccessResolver::new(deps.rooms.clone(), config.store_timeout);

        // 順序固定: authenticate -> anti_forgery -> room_access
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(AuthenticateStage::new(verifier)),
            Arc::new(AntiForgeryStage::new(csrf.clone())),
            Arc::new(RoomAccessStage::new(resolver)),
        ];
        let pipeline = Pipeline::new(stages, config.request_body_limit_bytes);

        let profiles =
            MemberProfileCache::new(deps.cache, deps.directory, config.profile_cache_ttl);

        Self {
            rooms: deps.rooms,
            messages: deps.messages,
            pipeline: Arc::new(pipeline),
            csrf,
            profiles,
            cookie_secure: config.app_env.is_production(),
        }
    }
}
