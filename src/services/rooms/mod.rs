pub mod access;
pub mod policy;

pub use access::{RoomAccessFacts, RoomAccessResolver, RoomNotFound};
pub use policy::PolicyViolation;
