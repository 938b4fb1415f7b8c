//! Bearer credential verification (HS256 JWT signed with the shared secret).
//!
//! `authenticate_at` is a pure function of (header value, secret, now); the
//! wall-clock wrapper `authenticate` is what the request pipeline calls.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("bearer credential not set")]
    MissingCredential,
    #[error("{0}")]
    InvalidCredential(String),
}

/// Who the request is for. Built once per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: String,
}

/// Access token claims.
///
/// The identity service historically names the subject `uuid`; both spellings
/// are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(alias = "uuid")]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// Extracts the token from an `Authorization` header value.
///
/// Anything other than `Bearer <non-empty token>` counts as no credential.
pub fn bearer_token(raw_header: Option<&str>) -> Result<&str, AuthError> {
    let token = raw_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::MissingCredential)?;

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    leeway_seconds: u64,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("leeway_seconds", &self.leeway_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str, leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked against the caller-supplied clock in `authenticate_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        // `sub` may arrive under its legacy name, so only `exp` is required up front.
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            leeway_seconds,
        }
    }

    pub fn authenticate(&self, raw_header: Option<&str>) -> Result<Identity, AuthError> {
        self.authenticate_at(raw_header, chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn authenticate_at(
        &self,
        raw_header: Option<&str>,
        now_unix: u64,
    ) -> Result<Identity, AuthError> {
        let token = bearer_token(raw_header)?;

        let claims =
            jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
                .map_err(|e| AuthError::InvalidCredential(e.to_string()))?
                .claims;

        if claims.exp.saturating_add(self.leeway_seconds) < now_unix {
            return Err(AuthError::InvalidCredential("token expired".into()));
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidCredential("empty 'sub' claim".into()));
        }

        Ok(Identity {
            subject: claims.sub,
            email: claims.email,
        })
    }
}

/// Signs access tokens with the same shared secret.
///
/// Tokens are normally issued by the identity service; this is used by the
/// `dev-token` command and by tests.
pub fn sign_access_token(secret: &str, claims: &AccessTokenClaims) -> Result<String, AuthError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::InvalidCredential(e.to_string()))
}
