//! Anti-forgery (double-submit) tokens.
//!
//! Token layout: `<issued_at>.<nonce>.<mac>`
//! - `issued_at`: unix seconds
//! - `nonce`: 32 lowercase hex chars
//! - `mac`: base64url(HMAC-SHA256(secret, "<issued_at>.<nonce>"))
//!
//! Nothing is stored server side; a token is verified by recomputing its MAC.

use axum::http::{HeaderMap, Method, header};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_NAME: &str = "x-csrf-token";
pub const FORM_FIELD: &str = "_csrf";
pub const COOKIE_NAME: &str = "csrf_token";

/// Tokens stamped this far in the future are still accepted (client/server clock drift).
pub const CLOCK_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Malformed,
    Mismatch,
    Expired,
    NotYetValid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AntiForgeryError {
    #[error("csrf token not present")]
    NotPresent,
    #[error("invalid csrf token ({0:?})")]
    Invalid(InvalidReason),
}

/// Safe methods never carry an anti-forgery requirement.
pub fn requires_check(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn signature(secret: &[u8], payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub fn create_token(secret: &[u8], issued_at: i64, nonce: &str) -> String {
    let payload = format!("{issued_at}.{nonce}");
    let mac = URL_SAFE_NO_PAD.encode(signature(secret, &payload));
    format!("{payload}.{mac}")
}

/// Verify `candidate` against `secret` at `now_unix`.
///
/// Every failure is `Invalid`; the reason is only for logs.
pub fn verify(
    candidate: &str,
    secret: &[u8],
    now_unix: i64,
    ttl_seconds: i64,
) -> Result<(), AntiForgeryError> {
    let invalid = AntiForgeryError::Invalid;

    let mut parts = candidate.splitn(3, '.');
    let (Some(issued_raw), Some(nonce), Some(mac_raw)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid(InvalidReason::Malformed));
    };

    let issued_at: i64 = issued_raw
        .parse()
        .map_err(|_| invalid(InvalidReason::Malformed))?;
    if nonce.is_empty() || !nonce.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid(InvalidReason::Malformed));
    }
    let provided = URL_SAFE_NO_PAD
        .decode(mac_raw)
        .map_err(|_| invalid(InvalidReason::Malformed))?;

    let expected = signature(secret, &format!("{issued_raw}.{nonce}"));
    if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        return Err(invalid(InvalidReason::Mismatch));
    }

    if issued_at > now_unix.saturating_add(CLOCK_SKEW_SECONDS) {
        return Err(invalid(InvalidReason::NotYetValid));
    }
    if now_unix.saturating_sub(issued_at) > ttl_seconds {
        return Err(invalid(InvalidReason::Expired));
    }

    Ok(())
}

/// Finds the submitted token: header, then form field, then cookie.
///
/// The first non-empty value wins.
pub fn find_candidate(headers: &HeaderMap, form_value: Option<&str>) -> Option<String> {
    if let Some(v) = header_candidate(headers) {
        return Some(v);
    }

    if let Some(v) = form_value.map(str::trim).filter(|v| !v.is_empty()) {
        return Some(v.to_string());
    }

    cookie_value(headers, COOKIE_NAME)
}

/// Non-empty `X-CSRF-Token` header value.
pub fn header_candidate(headers: &HeaderMap) -> Option<String> {
    headers
        .get(HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads the `_csrf` field from an `application/x-www-form-urlencoded` body.
pub fn form_field(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(k, _)| k == FORM_FIELD)
        .map(|(_, v)| v.into_owned())
}

/// Cookie values may be percent-encoded by the client; undecodable values count as absent.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.trim().is_empty())
        .map(|(_, v)| v.trim().trim_matches('"'))?;

    urlencoding::decode(raw)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Holds the anti-forgery secret and tolerance window.
#[derive(Clone)]
pub struct AntiForgeryChecker {
    secret: Vec<u8>,
    ttl_seconds: i64,
}

impl std::fmt::Debug for AntiForgeryChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiForgeryChecker")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl AntiForgeryChecker {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn issue(&self, now_unix: i64) -> String {
        create_token(&self.secret, now_unix, &Uuid::new_v4().simple().to_string())
    }

    pub fn verify(&self, candidate: &str, now_unix: i64) -> Result<(), AntiForgeryError> {
        verify(candidate, &self.secret, now_unix, self.ttl_seconds)
    }
}
