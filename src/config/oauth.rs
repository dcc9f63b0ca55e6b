use serde::{Deserialize, Serialize};
use url::Url;

/// Google OAuth client configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OauthConfig {
    /// OAuth client id issued by Google Cloud (required, non-empty).
    /// TOML: `oauth.client_id`.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret. Sent in the token request body.
    /// TOML: `oauth.client_secret`.
    #[serde(default)]
    pub client_secret: String,

    /// Consent screen URL.
    /// TOML: `oauth.auth_url`. Default: `https://accounts.google.com/o/oauth2/v2/auth`.
    #[serde(default = "default_auth_url")]
    pub auth_url: Url,

    /// Token endpoint used for code exchange and refresh.
    /// TOML: `oauth.token_url`. Default: `https://oauth2.googleapis.com/token`.
    #[serde(default = "default_token_url")]
    pub token_url: Url,

    /// Callback URL registered with the OAuth client.
    /// TOML: `oauth.redirect_url`. Default: `http://localhost:8188/oauth/google/callback`.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: Url,

    /// Scopes requested on the consent screen.
    /// TOML: `oauth.scopes`.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Optional upstream HTTP proxy for token endpoint calls.
    /// TOML: `oauth.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for the reqwest client; disabled forces HTTP/1.
    /// TOML: `oauth.enable_multiplexing`. Default: `false`.
    #[serde(default)]
    pub enable_multiplexing: bool,

    /// Total timeout for a single token endpoint call, in seconds.
    /// TOML: `oauth.refresh_timeout_secs`. Default: `15`.
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

impl Default for OauthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            redirect_url: default_redirect_url(),
            scopes: default_scopes(),
            proxy: None,
            enable_multiplexing: false,
            refresh_timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

fn default_auth_url() -> Url {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
        .expect("default oauth auth_url must be a valid URL")
}

fn default_token_url() -> Url {
    Url::parse("https://oauth2.googleapis.com/token")
        .expect("default oauth token_url must be a valid URL")
}

fn default_redirect_url() -> Url {
    Url::parse("http://localhost:8188/oauth/google/callback")
        .expect("default oauth redirect_url must be a valid URL")
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/business.manage".to_string(),
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
    ]
}

fn default_refresh_timeout_secs() -> u64 {
    15
}
