/*!
 * Request context extractors
 *
 * Responsibility:
 * - Hand the pipeline's RequestContext to handlers as typed values
 * - axum glue lives in core, the context types in types
 *
 * Public API:
 * - RequestContext / ContextDraft
 * - AuthCtx / RoomCtx
 */

mod core;
mod types;

pub use core::{AuthCtx, RoomCtx};
pub use types::{ContextDraft, RequestContext};
