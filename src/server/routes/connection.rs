use crate::error::KeeperError;
use crate::server::guards::auth::CallerIdentity;
use crate::server::router::KeeperState;
use crate::token::CookieMirror;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde_json::json;

/// GET /google/connection
pub async fn connection_status(
    State(state): State<KeeperState>,
    caller: CallerIdentity,
    jar: PrivateCookieJar,
) -> Response {
    let mut mirror = CookieMirror::new(jar, !state.insecure_cookie);
    let result = state
        .tokens
        .has_valid_connection_mirrored(caller.as_str(), &mut mirror)
        .await;

    match result {
        Ok(connected) => (
            mirror.into_jar(),
            Json(json!({ "connected": connected })),
        )
            .into_response(),
        Err(err) => (mirror.into_jar(), err.into_response()).into_response(),
    }
}

/// GET /google/token
///
/// Hands a valid access token to internal callers; `409 RECONNECT_REQUIRED` when there is none.
pub async fn access_token(
    State(state): State<KeeperState>,
    caller: CallerIdentity,
    jar: PrivateCookieJar,
) -> Response {
    let mut mirror = CookieMirror::new(jar, !state.insecure_cookie);
    let result = state
        .tokens
        .get_valid_access_token_mirrored(caller.as_str(), &mut mirror)
        .await
        .and_then(|token| token.ok_or(KeeperError::NotConnected));

    match result {
        Ok(token) => (
            mirror.into_jar(),
            Json(json!({ "access_token": token })),
        )
            .into_response(),
        Err(err) => (mirror.into_jar(), err.into_response()).into_response(),
    }
}

/// POST /google/disconnect
pub async fn disconnect(
    State(state): State<KeeperState>,
    caller: CallerIdentity,
    jar: PrivateCookieJar,
) -> Response {
    let mut mirror = CookieMirror::new(jar, !state.insecure_cookie);
    let result = state
        .tokens
        .delete_mirrored(caller.as_str(), &mut mirror)
        .await;

    match result {
        Ok(()) => (mirror.into_jar(), StatusCode::NO_CONTENT).into_response(),
        Err(err) => (mirror.into_jar(), err.into_response()).into_response(),
    }
}
