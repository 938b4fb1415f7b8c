pub mod directory;
pub mod member_cache;

pub use directory::{HttpProfileDirectory, LookupError, ProfileDirectory};
pub use member_cache::{MemberProfileCache, Profile};
