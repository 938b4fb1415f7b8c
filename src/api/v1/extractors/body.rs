/*
 * Responsibility
 * - request body を JSON / urlencoded form のどちらでも受け付ける
 * - Content-Type で Json か Form を選ぶ。extractor の拒否は AppError (400) に寄せる
 */
use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Request DTO decoded from either `application/json` or a urlencoded form.
///
/// Form bodies may carry the `_csrf` field; unknown fields are ignored.
pub struct JsonOrForm<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE))
}

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                tracing::debug!(error = %e.body_text(), "form body rejected");
                AppError::bad_request("INVALID_BODY", e.body_text())
            })?;
            return Ok(JsonOrForm(value));
        }

        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e.body_text(), "json body rejected");
            AppError::bad_request("INVALID_BODY", e.body_text())
        })?;
        Ok(JsonOrForm(value))
    }
}
