pub mod config;
pub mod db;
pub mod error;
pub mod oauth;
pub mod server;
pub mod token;

pub use error::KeeperError;
pub use token::{TokenGrant, TokenManager};
