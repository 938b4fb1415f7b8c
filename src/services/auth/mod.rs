pub mod csrf;
pub mod token;

pub use csrf::{AntiForgeryChecker, AntiForgeryError};
pub use token::{AuthError, Identity, TokenVerifier};
