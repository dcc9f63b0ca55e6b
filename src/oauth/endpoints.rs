use super::client::{OauthTokenResponse, build_oauth2_client};
use crate::config::OauthConfig;
use crate::error::{KeeperError, OauthError};
use oauth2::{
    AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RefreshToken, Scope,
};
use tracing::info;

/// Stateless Google OAuth endpoints built from [`OauthConfig`].
///
/// The oauth2 client is rebuilt per call so tests can point the config at a local token server.
pub struct OauthEndpoints;

impl OauthEndpoints {
    /// Build a consent URL with configured scopes and the PKCE challenge preset.
    pub fn build_authorize_url(
        cfg: &OauthConfig,
        pkce_challenge: PkceCodeChallenge,
    ) -> Result<(url::Url, CsrfToken), KeeperError> {
        let client = build_oauth2_client(cfg)?;
        let mut req = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            // Google only issues a refresh_token for offline access with forced consent.
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &cfg.scopes {
            req = req.add_scope(Scope::new(scope.clone()));
        }

        Ok(req.url())
    }

    /// Exchange an authorization code (PKCE) for tokens.
    pub async fn exchange_authorization_code(
        cfg: &OauthConfig,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: &reqwest::Client,
    ) -> Result<OauthTokenResponse, OauthError> {
        let client = build_oauth2_client(cfg).map_err(|e| OauthError::Other {
            message: format!("failed to build oauth2 client: {e}"),
        })?;

        let token_result: OauthTokenResponse = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(http_client)
            .await?;
        info!("OAuth2 code exchange completed successfully");
        Ok(token_result)
    }

    /// Redeem a refresh token for a new access token. Single attempt, no retries.
    pub async fn refresh_access_token(
        cfg: &OauthConfig,
        refresh_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<OauthTokenResponse, OauthError> {
        let client = build_oauth2_client(cfg).map_err(|e| OauthError::Other {
            message: format!("failed to build oauth2 client: {e}"),
        })?;

        let token_result: OauthTokenResponse = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(http_client)
            .await?;
        Ok(token_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_requests_offline_consent_and_scopes() {
        let cfg = OauthConfig {
            client_id: "client-id".to_string(),
            ..OauthConfig::default()
        };
        let (challenge, _verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf) =
            OauthEndpoints::build_authorize_url(&cfg, challenge).expect("authorize url");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("client_id").as_deref(), Some("client-id"));
        assert_eq!(get("access_type").as_deref(), Some("offline"));
        assert_eq!(get("prompt").as_deref(), Some("consent"));
        assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(get("state").as_deref(), Some(csrf.secret().as_str()));
        assert_eq!(
            get("redirect_uri").as_deref(),
            Some("http://localhost:8188/oauth/google/callback")
        );
        let scope = get("scope").expect("scope param");
        assert!(scope.contains("https://www.googleapis.com/auth/business.manage"));
    }
}
