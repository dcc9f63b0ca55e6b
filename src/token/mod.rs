//! Token lifecycle: storage, lazy refresh and validity checks for one Google token pair per user.

pub mod expiry;
pub mod grant;
pub mod manager;
pub mod mirror;

pub use expiry::{EXPIRY_BUFFER, is_expired};
pub use grant::{MAX_EXPIRES_IN_SECS, TokenGrant};
pub use manager::TokenManager;
pub use mirror::{CookieMirror, MirroredToken, NoMirror, TokenMirror};
