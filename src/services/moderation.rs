/*
 * Responsibility
 * - 全 room のメッセージから禁止語をまとめて検出
 * - room ごとに 1 task。最初の失敗か deadline 到達で
 *   共有 cancellation token が残りを止める
 * - 失敗時は途中結果を捨てる (全部か無しか)
 */
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repos::{Message, MessageRepo, RepoError, Room, RoomRepo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub room_id: Uuid,
    pub room_name: String,
    pub message_id: Uuid,
    pub sender: String,
    pub words: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan did not finish within {0:?}")]
    DeadlineElapsed(Duration),
    #[error("store error during scan")]
    Repo(#[from] RepoError),
    #[error("scan task failed: {0}")]
    Task(String),
}

type UnitResult = Result<Vec<Finding>, ScanError>;

/// Case-insensitive substring match of `words` (already lowercased) against one room.
fn findings_in(room: &Room, messages: &[Message], words: &[String]) -> Vec<Finding> {
    messages
        .iter()
        .filter_map(|m| {
            let body = m.body.to_lowercase();
            let hits: Vec<String> = words
                .iter()
                .filter(|w| body.contains(w.as_str()))
                .cloned()
                .collect();
            (!hits.is_empty()).then(|| Finding {
                room_id: room.id,
                room_name: room.name.clone(),
                message_id: m.id,
                sender: m.sender.clone(),
                words: hits,
            })
        })
        .collect()
}

async fn scan_room(
    room: Room,
    messages: Arc<dyn MessageRepo>,
    words: Arc<Vec<String>>,
    cancel: CancellationToken,
) -> UnitResult {
    if cancel.is_cancelled() {
        return Ok(Vec::new());
    }

    let listed = tokio::select! {
        _ = cancel.cancelled() => return Ok(Vec::new()),
        listed = messages.list(room.id) => listed?,
    };

    Ok(findings_in(&room, &listed, &words))
}

async fn drain(set: &mut JoinSet<UnitResult>) -> UnitResult {
    let mut findings = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(mut found)) => findings.append(&mut found),
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(ScanError::Task(e.to_string())),
        }
    }
    Ok(findings)
}

pub async fn scan_forbidden_words(
    rooms: Arc<dyn RoomRepo>,
    messages: Arc<dyn MessageRepo>,
    words: &[String],
    deadline: Duration,
) -> Result<Vec<Finding>, ScanError> {
    let words: Arc<Vec<String>> = Arc::new(
        words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect(),
    );
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let all_rooms = rooms.list_all().await?;
    tracing::info!(rooms = all_rooms.len(), words = words.len(), "starting forbidden word scan");

    let cancel = CancellationToken::new();
    let mut set = JoinSet::new();
    for room in all_rooms {
        set.spawn(scan_room(
            room,
            messages.clone(),
            words.clone(),
            cancel.child_token(),
        ));
    }

    let outcome = match tokio::time::timeout(deadline, drain(&mut set)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ScanError::DeadlineElapsed(deadline)),
    };

    match outcome {
        Ok(mut findings) => {
            findings.sort_by(|a, b| (a.room_id, a.message_id).cmp(&(b.room_id, b.message_id)));
            tracing::info!(findings = findings.len(), "forbidden word scan finished");
            Ok(findings)
        }
        Err(e) => {
            cancel.cancel();
            set.abort_all();
            tracing::warn!(error = %e, "forbidden word scan aborted");
            Err(e)
        }
    }
}
