/*
 * Responsibility
 * - pipeline が handler に渡すリクエスト単位の型付き context
 * - pipeline が 1 回だけ組み立て、以後は読み取り専用。リクエストと一緒に破棄
 */
use crate::services::auth::Identity;
use crate::services::rooms::RoomAccessFacts;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    /// Present only on room-scoped routes.
    pub room: Option<RoomAccessFacts>,
}

/// Context under construction while the stages run.
#[derive(Debug, Default)]
pub struct ContextDraft {
    pub identity: Option<Identity>,
    pub room: Option<RoomAccessFacts>,
}

impl ContextDraft {
    /// `None` when no stage established an identity.
    pub fn finish(self) -> Option<RequestContext> {
        Some(RequestContext {
            identity: self.identity?,
            room: self.room,
        })
    }
}
