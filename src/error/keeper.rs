use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::oauth::OauthError;

#[derive(Debug, ThisError)]
pub enum KeeperError {
    /// No stored token pair for the user.
    #[error("Google account is not connected")]
    NotConnected,

    /// The token endpoint rejected or failed the refresh grant.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] OauthError),

    #[error(transparent)]
    Oauth(#[from] OauthError),

    #[error("Token response carried no refresh_token and none is stored")]
    MissingRefreshToken,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl KeeperError {
    /// True when the persistence layer could not be read or written.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            KeeperError::DatabaseError(_) | KeeperError::RactorError(_)
        )
    }

    /// True when the caller should be sent back through the consent flow.
    pub fn is_reconnect_required(&self) -> bool {
        matches!(
            self,
            KeeperError::NotConnected | KeeperError::RefreshFailed(_)
        )
    }
}

impl IntoResponse for KeeperError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            KeeperError::NotConnected | KeeperError::RefreshFailed(_) => (
                StatusCode::CONFLICT,
                ApiErrorObject {
                    code: "RECONNECT_REQUIRED".to_string(),
                    message: "Google account is not connected; reconnect to continue.".to_string(),
                    details: None,
                },
            ),

            KeeperError::DatabaseError(_) | KeeperError::RactorError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "STORE_FAILURE".to_string(),
                    message: "Token storage is unavailable.".to_string(),
                    details: None,
                },
            ),

            KeeperError::Config(_)
            | KeeperError::ReqwestError(_)
            | KeeperError::UrlError(_)
            | KeeperError::Oauth(OauthError::Other { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                },
            ),

            KeeperError::MissingRefreshToken => (
                StatusCode::FORBIDDEN,
                ApiErrorObject {
                    code: "MISSING_REFRESH_TOKEN".to_string(),
                    message: "Missing refresh_token (check access_type=offline)".to_string(),
                    details: None,
                },
            ),

            KeeperError::Oauth(OauthError::Flow {
                code,
                message,
                details,
            }) => (
                StatusCode::FORBIDDEN,
                ApiErrorObject {
                    code,
                    message,
                    details,
                },
            ),

            KeeperError::Oauth(OauthError::Parse { .. }) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "BAD_UPSTREAM_PAYLOAD".to_string(),
                    message: "Failed to parse upstream response.".to_string(),
                    details: None,
                },
            ),

            KeeperError::Oauth(
                OauthError::Request(_)
                | OauthError::ServerResponse { .. }
                | OauthError::UpstreamStatus(_),
            ) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "Upstream service error.".to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: KeeperError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn token_validity_failures_ask_for_reconnect() {
        let refresh = KeeperError::RefreshFailed(OauthError::ServerResponse {
            error: "invalid_grant".to_string(),
        });
        assert!(refresh.is_reconnect_required());
        assert!(!refresh.is_store_failure());
        assert_eq!(status_of(refresh), StatusCode::CONFLICT);
        assert_eq!(status_of(KeeperError::NotConnected), StatusCode::CONFLICT);
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = KeeperError::RactorError("actor gone".to_string());
        assert!(err.is_store_failure());
        assert!(!err.is_reconnect_required());
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);

        let err = KeeperError::DatabaseError(sqlx::Error::RowNotFound);
        assert!(err.is_store_failure());
    }

    #[test]
    fn flow_errors_keep_their_code() {
        let err = KeeperError::Oauth(OauthError::flow("CSRF_MISMATCH", "CSRF token mismatch"));
        assert_eq!(status_of(err), StatusCode::FORBIDDEN);
    }
}
