use super::keeper::KeeperError;
use axum::http::StatusCode;
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde_json::Value;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum OauthError {
    #[error("OAuth flow error: {message}")]
    Flow {
        code: String,
        message: String,
        details: Option<Value>,
    },

    #[error("OAuth2 request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OAuth2 upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("OAuth2 server response error: {error}")]
    ServerResponse { error: String },

    #[error("OAuth2 token endpoint parse error: {message}. Body: {body}")]
    Parse { message: String, body: String },

    #[error("OAuth2 unexpected error: {message}")]
    Other { message: String },
}

impl OauthError {
    pub(crate) fn flow(code: &str, message: impl Into<String>) -> Self {
        OauthError::Flow {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

type TokenRequestError = RequestTokenError<
    HttpClientError<ReqwestClientError>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

impl From<TokenRequestError> for OauthError {
    fn from(e: TokenRequestError) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => OauthError::ServerResponse {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(wrapper) => match wrapper {
                HttpClientError::Reqwest(real_err) => OauthError::Request(*real_err),
                other => OauthError::Other {
                    message: format!("HttpClientError: {other:?}"),
                },
            },
            RequestTokenError::Parse(parse_err, body) => OauthError::Parse {
                message: parse_err.to_string(),
                body: truncate_body(&body),
            },
            RequestTokenError::Other(s) => OauthError::Other { message: s },
        }
    }
}

impl From<TokenRequestError> for KeeperError {
    fn from(e: TokenRequestError) -> Self {
        OauthError::from(e).into()
    }
}

fn truncate_body(body: &[u8]) -> String {
    let body_str = String::from_utf8_lossy(body);
    body_str
        .char_indices()
        .nth(100)
        .map(|(idx, _)| format!("{}...<truncated>", &body_str[..idx]))
        .unwrap_or_else(|| body_str.into_owned())
}
