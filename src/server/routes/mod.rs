pub mod connection;
pub mod oauth;

use crate::server::router::KeeperState;
use connection::{access_token, connection_status, disconnect};
use oauth::{google_oauth_callback, google_oauth_entry};

use axum::{
    Router,
    routing::{get, post},
};

pub fn router() -> Router<KeeperState> {
    Router::new()
        .route("/oauth/google/auth", get(google_oauth_entry))
        .route("/oauth/google/callback", get(google_oauth_callback))
        .route("/google/connection", get(connection_status))
        .route("/google/token", get(access_token))
        .route("/google/disconnect", post(disconnect))
}
