//! Request authorization & enrichment pipeline.
//!
//! An ordered list of stages runs on every matched `/api/v1` route. Each stage
//! either lets the request continue or rejects it with an `AppError`; the first
//! rejection ends the run and becomes the response. When every stage passes,
//! one [`RequestContext`] is attached to the request for the handler.
//!
//! Applied with `route_layer`, so unmatched paths never reach the stages and
//! the room stage can see the matched `{room_id}` segment.

mod exchange;
pub mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

pub use exchange::Exchange;

use crate::api::v1::extractors::ctx::RequestContext;
use crate::error::AppError;
use crate::state::AppState;

pub enum Flow {
    Continue,
    Reject(AppError),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ex: &mut Exchange) -> Flow;
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    body_limit: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline").field("stages", &names).finish()
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>, body_limit: usize) -> Self {
        Self { stages, body_limit }
    }

    pub async fn run(&self, req: Request<Body>) -> Result<Request<Body>, AppError> {
        let mut ex = Exchange::new(req, self.body_limit).await;

        for stage in &self.stages {
            match stage.run(&mut ex).await {
                Flow::Continue => {}
                Flow::Reject(err) => {
                    tracing::debug!(stage = stage.name(), status = %err.status(), "request rejected");
                    return Err(err);
                }
            }
        }

        let (mut req, draft) = ex.into_request();
        let ctx: RequestContext = draft.finish().ok_or_else(|| {
            tracing::error!("pipeline finished without an identity");
            AppError::Internal
        })?;
        req.extensions_mut().insert(ctx);

        Ok(req)
    }
}

/// Put the pipeline in front of every route of `router`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, pipeline_middleware))
}

async fn pipeline_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let req = state.pipeline.run(req).await?;
    Ok(next.run(req).await)
}
