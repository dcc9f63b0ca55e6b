use crate::oauth::OauthTokenResponse;
use chrono::Duration;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenType;
use serde::{Deserialize, Serialize};

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Ceiling applied to `expires_in`; anything longer is treated as one year.
pub const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 3600;

/// A token endpoint response reduced to what the store keeps.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// `None` when the provider did not rotate the refresh token.
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Space-delimited granted scopes.
    pub scope: Option<String>,
    /// Seconds until the access token expires, counted from issuance.
    pub expires_in: i64,
}

impl TokenGrant {
    pub fn from_token_response(resp: &OauthTokenResponse) -> Self {
        let token_type = match resp.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            BasicTokenType::Mac => "MAC".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };

        let scope = resp
            .scopes()
            .filter(|scopes| !scopes.is_empty())
            .map(|scopes| {
                scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            });

        let expires_in = resp
            .expires_in()
            .map_or(DEFAULT_EXPIRES_IN_SECS, |d| {
                i64::try_from(d.as_secs())
                    .unwrap_or(i64::MAX)
                    .min(MAX_EXPIRES_IN_SECS)
            });

        Self {
            access_token: resp.access_token().secret().clone(),
            refresh_token: resp
                .refresh_token()
                .map(|t| t.secret().clone())
                .filter(|t| !t.trim().is_empty()),
            token_type,
            scope,
            expires_in,
        }
    }

    /// `expires_in` as a duration, clamped to `0..=MAX_EXPIRES_IN_SECS`.
    pub fn lifetime(&self) -> Duration {
        Duration::seconds(self.expires_in.clamp(0, MAX_EXPIRES_IN_SECS))
    }
}

impl From<OauthTokenResponse> for TokenGrant {
    fn from(resp: OauthTokenResponse) -> Self {
        Self::from_token_response(&resp)
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> OauthTokenResponse {
        serde_json::from_value(value).expect("valid token response")
    }

    #[test]
    fn google_refresh_response_is_normalized() {
        let grant = TokenGrant::from(parse(json!({
            "access_token": "ya29.new",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/business.manage openid",
            "token_type": "Bearer"
        })));

        assert_eq!(grant.access_token, "ya29.new");
        assert_eq!(grant.refresh_token, None);
        assert_eq!(grant.token_type, "Bearer");
        assert_eq!(
            grant.scope.as_deref(),
            Some("https://www.googleapis.com/auth/business.manage openid")
        );
        assert_eq!(grant.expires_in, 3599);
    }

    #[test]
    fn missing_expires_in_falls_back_to_an_hour() {
        let grant = TokenGrant::from(parse(json!({
            "access_token": "a",
            "token_type": "bearer",
            "refresh_token": "r"
        })));

        assert_eq!(grant.expires_in, DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(grant.refresh_token.as_deref(), Some("r"));
        assert_eq!(grant.scope, None);
    }

    #[test]
    fn oversized_expires_in_is_capped() {
        let grant = TokenGrant::from(parse(json!({
            "access_token": "a",
            "token_type": "Bearer",
            "expires_in": 10_000_000_000_000_u64
        })));
        assert_eq!(grant.expires_in, MAX_EXPIRES_IN_SECS);

        let grant = TokenGrant::from(parse(json!({
            "access_token": "a",
            "token_type": "Bearer",
            "expires_in": u64::MAX
        })));
        assert_eq!(grant.expires_in, MAX_EXPIRES_IN_SECS);
    }

    #[test]
    fn lifetime_is_clamped_for_hand_built_grants() {
        let mut grant = TokenGrant {
            access_token: "a".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
            expires_in: i64::MAX,
        };
        assert_eq!(grant.lifetime(), Duration::seconds(MAX_EXPIRES_IN_SECS));

        grant.expires_in = -30;
        assert_eq!(grant.lifetime(), Duration::zero());

        grant.expires_in = 3600;
        assert_eq!(grant.lifetime(), Duration::hours(1));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let grant = TokenGrant {
            access_token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            token_type: "Bearer".to_string(),
            scope: None,
            expires_in: 60,
        };
        let out = format!("{grant:?}");
        assert!(!out.contains("secret-access"));
        assert!(!out.contains("secret-refresh"));
    }
}
