use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::Identity;
use crate::services::rooms::RoomAccessFacts;
use crate::state::AppState;

use super::RequestContext;

fn context(parts: &Parts) -> Result<&RequestContext, AppError> {
    parts.extensions.get::<RequestContext>().ok_or_else(|| {
        // pipeline の後ろに無い route
        tracing::error!(path = %parts.uri.path(), "request context missing");
        AppError::Internal
    })
}

/// The authenticated caller.
pub struct AuthCtx(pub Identity);

impl FromRequestParts<AppState> for AuthCtx {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(AuthCtx(context(parts)?.identity.clone()))
    }
}

/// The caller plus the facts resolved for the room in the path.
pub struct RoomCtx {
    pub identity: Identity,
    pub facts: RoomAccessFacts,
}

impl FromRequestParts<AppState> for RoomCtx {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = context(parts)?;
        let facts = ctx.room.clone().ok_or_else(|| {
            tracing::error!(path = %parts.uri.path(), "room facts missing on a room route");
            AppError::Internal
        })?;

        Ok(RoomCtx {
            identity: ctx.identity.clone(),
            facts,
        })
    }
}
