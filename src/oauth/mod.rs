//! Google OAuth glue: client construction and token endpoint calls.

pub mod client;
pub mod endpoints;

pub use client::{OauthTokenResponse, build_http_client, build_oauth2_client};
pub use endpoints::OauthEndpoints;
