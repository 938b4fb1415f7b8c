/*
 * Responsibility
 * - GET /csrf: double-submit 用の anti-forgery token を発行 (body + cookie)
 */
use axum::{
    Json,
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse},
};
use serde::Serialize;

use crate::{api::v1::extractors::AuthCtx, services::auth::csrf, state::AppState};

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

fn token_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={token}; Path=/; Max-Age={max_age}; SameSite=Strict",
        csrf::COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub async fn issue_csrf_token(
    State(state): State<AppState>,
    AuthCtx(identity): AuthCtx,
) -> impl IntoResponse {
    let token = state.csrf.issue(chrono::Utc::now().timestamp());
    tracing::debug!(subject = %identity.subject, "issued csrf token");

    let cookie = token_cookie(&token, state.csrf.ttl_seconds(), state.cookie_secure);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(CsrfTokenResponse { csrf_token: token }),
    )
}
