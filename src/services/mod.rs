pub mod auth;
pub mod cache;
pub mod moderation;
pub mod profiles;
pub mod rooms;
