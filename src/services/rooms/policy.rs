//! Per-operation room rules.
//!
//! Pure functions over [`RoomAccessFacts`]; handlers call the one that matches
//! their route and turn a violation into an `AppError`.

use thiserror::Error;

use crate::services::rooms::RoomAccessFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("already a member of this room")]
    AlreadyMember,
    #[error("not a member of this room")]
    NotMember,
    #[error("only the room owner may do this")]
    NotOwner,
    #[error("the owner cannot leave; delete the room instead")]
    OwnerCannotLeave,
    #[error("the owner cannot be removed from the room")]
    OwnerCannotBeRemoved,
    #[error("only the sender or the room owner may delete this message")]
    NotMessageSender,
}

impl PolicyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyViolation::AlreadyMember => "ALREADY_MEMBER",
            PolicyViolation::NotMember => "NOT_ROOM_MEMBER",
            PolicyViolation::NotOwner => "NOT_ROOM_OWNER",
            PolicyViolation::OwnerCannotLeave => "OWNER_CANNOT_LEAVE",
            PolicyViolation::OwnerCannotBeRemoved => "OWNER_CANNOT_BE_REMOVED",
            PolicyViolation::NotMessageSender => "NOT_MESSAGE_SENDER",
        }
    }
}

pub fn can_join(facts: &RoomAccessFacts) -> Result<(), PolicyViolation> {
    if facts.is_member {
        return Err(PolicyViolation::AlreadyMember);
    }
    Ok(())
}

pub fn can_leave(facts: &RoomAccessFacts) -> Result<(), PolicyViolation> {
    require_member(facts)?;
    if facts.is_owner {
        return Err(PolicyViolation::OwnerCannotLeave);
    }
    Ok(())
}

/// Public rooms are visible to everyone; private ones only to members.
pub fn can_view(facts: &RoomAccessFacts) -> Result<(), PolicyViolation> {
    if facts.room.is_private {
        require_member(facts)?;
    }
    Ok(())
}

pub fn require_member(facts: &RoomAccessFacts) -> Result<(), PolicyViolation> {
    if !facts.is_member {
        return Err(PolicyViolation::NotMember);
    }
    Ok(())
}

pub fn require_owner(facts: &RoomAccessFacts) -> Result<(), PolicyViolation> {
    if !facts.is_owner {
        return Err(PolicyViolation::NotOwner);
    }
    Ok(())
}

pub fn can_remove_member(facts: &RoomAccessFacts, member_id: &str) -> Result<(), PolicyViolation> {
    require_owner(facts)?;
    if member_id == facts.room.owner_id {
        return Err(PolicyViolation::OwnerCannotBeRemoved);
    }
    Ok(())
}

/// Sender or owner; either way the caller must still belong to the room.
pub fn can_delete_message(
    facts: &RoomAccessFacts,
    caller: &str,
    sender: &str,
) -> Result<(), PolicyViolation> {
    require_member(facts)?;
    if caller != sender && !facts.is_owner {
        return Err(PolicyViolation::NotMessageSender);
    }
    Ok(())
}
