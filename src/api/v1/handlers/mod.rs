pub mod csrf;
pub mod health;
pub mod messages;
pub mod rooms;
