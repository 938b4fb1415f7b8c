/*
 * Responsibility
 * - pipeline の 3 stage を実行順に定義
 *   authenticate -> anti_forgery (unsafe method のみ) -> room_access (room route のみ)
 * - 拒否時のログは各 stage が出す
 */
use async_trait::async_trait;
use axum::http::header;

use crate::error::AppError;
use crate::middleware::pipeline::{Exchange, Flow, Stage};
use crate::services::auth::{AntiForgeryChecker, AntiForgeryError, TokenVerifier, csrf};
use crate::services::rooms::RoomAccessResolver;

pub struct AuthenticateStage {
    verifier: TokenVerifier,
}

impl AuthenticateStage {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Stage for AuthenticateStage {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn run(&self, ex: &mut Exchange) -> Flow {
        let raw = ex
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        match self.verifier.authenticate(raw) {
            Ok(identity) => {
                tracing::debug!(subject = %identity.subject, email = %identity.email, "authenticated");
                ex.ctx.identity = Some(identity);
                Flow::Continue
            }
            Err(e) => {
                tracing::warn!(reason = %e, "authentication failed");
                Flow::Reject(e.into())
            }
        }
    }
}

pub struct AntiForgeryStage {
    checker: AntiForgeryChecker,
}

impl AntiForgeryStage {
    pub fn new(checker: AntiForgeryChecker) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl Stage for AntiForgeryStage {
    fn name(&self) -> &'static str {
        "anti_forgery"
    }

    async fn run(&self, ex: &mut Exchange) -> Flow {
        if !csrf::requires_check(ex.method()) {
            return Flow::Continue;
        }

        // header が無いときだけ body を読む
        let candidate = match csrf::header_candidate(ex.headers()) {
            Some(v) => Some(v),
            None => {
                let form = match ex.form_body().await {
                    Ok(body) => body.and_then(csrf::form_field),
                    Err(e) => return Flow::Reject(e),
                };
                csrf::find_candidate(ex.headers(), form.as_deref())
            }
        };

        let Some(candidate) = candidate else {
            tracing::warn!(method = %ex.method(), "csrf token not present");
            return Flow::Reject(AntiForgeryError::NotPresent.into());
        };

        match self.checker.verify(&candidate, chrono::Utc::now().timestamp()) {
            Ok(()) => Flow::Continue,
            Err(e) => {
                tracing::warn!(reason = %e, "csrf token rejected");
                Flow::Reject(e.into())
            }
        }
    }
}

pub struct RoomAccessStage {
    resolver: RoomAccessResolver,
}

impl RoomAccessStage {
    pub fn new(resolver: RoomAccessResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for RoomAccessStage {
    fn name(&self) -> &'static str {
        "room_access"
    }

    async fn run(&self, ex: &mut Exchange) -> Flow {
        let Some(room_id) = ex.room_id().map(str::to_string) else {
            return Flow::Continue;
        };
        let Some(identity) = ex.ctx.identity.as_ref() else {
            tracing::error!("room access stage ran before authentication");
            return Flow::Reject(AppError::Internal);
        };

        match self.resolver.resolve(&room_id, identity).await {
            Ok(facts) => {
                ex.ctx.room = Some(facts);
                Flow::Continue
            }
            Err(e) => Flow::Reject(e.into()),
        }
    }
}
