/*
 * Responsibility
 * - stage から見たリクエスト (method, headers, room id, 必要時だけ読む body)
 * - 全 stage 通過後に handler 向けのリクエストを組み立て直す
 */
use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, RawPathParams},
    http::{HeaderMap, Method, Request, header, request::Parts},
};

use crate::api::v1::extractors::ctx::ContextDraft;
use crate::error::AppError;

pub const ROOM_ID_PARAM: &str = "room_id";

enum RequestBody {
    Streaming(Body),
    Buffered(Bytes),
}

pub struct Exchange {
    parts: Parts,
    body: RequestBody,
    body_limit: usize,
    room_id: Option<String>,
    pub ctx: ContextDraft,
}

impl Exchange {
    pub async fn new(req: Request<Body>, body_limit: usize) -> Self {
        let (mut parts, body) = req.into_parts();

        // path parameter の無い route では None
        let room_id = RawPathParams::from_request_parts(&mut parts, &())
            .await
            .ok()
            .and_then(|params| {
                params
                    .iter()
                    .find(|(name, _)| *name == ROOM_ID_PARAM)
                    .map(|(_, value)| value.to_string())
            });

        Self {
            parts,
            body: RequestBody::Streaming(body),
            body_limit,
            room_id,
            ctx: ContextDraft::default(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    fn is_form(&self) -> bool {
        self.parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
    }

    /// Urlencoded form body, buffered on first use and handed to the handler unchanged.
    ///
    /// A body that cannot be read (over `body_limit`, broken stream) rejects the request.
    pub async fn form_body(&mut self) -> Result<Option<&[u8]>, AppError> {
        if !self.is_form() {
            return Ok(None);
        }

        if let RequestBody::Streaming(_) = self.body {
            let RequestBody::Streaming(body) =
                std::mem::replace(&mut self.body, RequestBody::Buffered(Bytes::new()))
            else {
                return Ok(None);
            };
            let bytes = axum::body::to_bytes(body, self.body_limit)
                .await
                .map_err(buffering_error)?;
            self.body = RequestBody::Buffered(bytes);
        }

        match &self.body {
            RequestBody::Buffered(bytes) => Ok(Some(bytes.as_ref())),
            RequestBody::Streaming(_) => Ok(None),
        }
    }

    pub fn into_request(self) -> (Request<Body>, ContextDraft) {
        let body = match self.body {
            RequestBody::Streaming(body) => body,
            RequestBody::Buffered(bytes) => Body::from(bytes),
        };
        (Request::from_parts(self.parts, body), self.ctx)
    }
}

fn buffering_error(e: axum::Error) -> AppError {
    let over_limit = std::iter::successors(
        Some(&e as &(dyn std::error::Error + 'static)),
        |err| err.source(),
    )
    .any(|err| err.is::<http_body_util::LengthLimitError>());

    if over_limit {
        tracing::warn!("form body over the size limit");
        AppError::PayloadTooLarge
    } else {
        tracing::warn!(error = %e, "could not read form body");
        AppError::bad_request("INVALID_BODY", "could not read request body")
    }
}
