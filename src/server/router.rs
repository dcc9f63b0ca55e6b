use crate::error::KeeperError;
use crate::server::guards::auth::RequireKeyAuth;
use crate::server::routes;
use crate::token::TokenManager;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::cookie::Key;
use base64::Engine as _;
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

/// Derive the private-cookie key from `basic.cookie_secret`, or generate one for this process.
pub fn cookie_key(secret: Option<&str>) -> Result<Key, KeeperError> {
    let Some(secret) = secret.map(str::trim).filter(|s| !s.is_empty()) else {
        warn!("basic.cookie_secret unset; token mirrors will not survive a restart");
        return Ok(Key::generate());
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(secret)
        .map_err(|e| KeeperError::Config(format!("basic.cookie_secret is not base64: {e}")))?;
    Key::try_from(bytes.as_slice()).map_err(|_| {
        KeeperError::Config("basic.cookie_secret must decode to at least 64 bytes".to_string())
    })
}

#[derive(Clone)]
pub struct KeeperState {
    pub tokens: TokenManager,
    pub api_key: Arc<str>,
    pub insecure_cookie: bool,
    cookie_key: Key,
}

impl KeeperState {
    pub fn new(
        tokens: TokenManager,
        api_key: Arc<str>,
        insecure_cookie: bool,
        cookie_key: Key,
    ) -> Self {
        Self {
            tokens,
            api_key,
            insecure_cookie,
            cookie_key,
        }
    }
}

impl FromRef<KeeperState> for Key {
    fn from_ref(state: &KeeperState) -> Self {
        state.cookie_key.clone()
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    // Capture request metadata before moving `req` into the handler stack.
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(generate_request_id, str::to_string);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis();
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn keeper_router(state: KeeperState) -> Router {
    let guarded = routes::router().layer(middleware::from_extractor_with_state::<
        RequireKeyAuth,
        _,
    >(state.clone()));

    Router::new()
        .merge(guarded)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_cookie_secret_is_rejected() {
        let short = base64::engine::general_purpose::STANDARD.encode([7u8; 16]);
        assert!(matches!(
            cookie_key(Some(&short)),
            Err(KeeperError::Config(_))
        ));
        assert!(matches!(
            cookie_key(Some("not base64!")),
            Err(KeeperError::Config(_))
        ));
    }

    #[test]
    fn configured_cookie_secret_is_stable() {
        let secret = base64::engine::general_purpose::STANDARD.encode([42u8; 64]);
        let a = cookie_key(Some(&secret)).expect("key");
        let b = cookie_key(Some(&secret)).expect("key");
        assert_eq!(a.master(), b.master());
    }

    #[test]
    fn request_ids_are_url_safe() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
