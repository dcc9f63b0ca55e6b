use crate::config::OauthConfig;
use crate::error::KeeperError;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, EmptyExtraTokenFields,
    RedirectUrl, StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::time::Duration;

const OAUTH_USER_AGENT: &str = "gbp-keeper-oauth/1.0";

/// Standard OAuth2 token endpoint response.
pub type OauthTokenResponse = StandardTokenResponse<EmptyExtraTokenFields, BasicTokenType>;

/// A standard OAuth2 client configured to return [`OauthTokenResponse`].
pub type StandardOauth2Client<
    HasAuthUrl = oauth2::EndpointSet,
    HasDeviceAuthUrl = oauth2::EndpointNotSet,
    HasIntrospectionUrl = oauth2::EndpointNotSet,
    HasRevocationUrl = oauth2::EndpointNotSet,
    HasTokenUrl = oauth2::EndpointSet,
> = OAuth2Client<
    BasicErrorResponse,
    OauthTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    HasDeviceAuthUrl,
    HasIntrospectionUrl,
    HasRevocationUrl,
    HasTokenUrl,
>;

/// Build the OAuth2 client for `authorization_code` + `refresh_token` grants.
///
/// Client credentials travel in the form body, which is what Google documents.
pub fn build_oauth2_client(cfg: &OauthConfig) -> Result<StandardOauth2Client, KeeperError> {
    let mut client = OAuth2Client::<
        BasicErrorResponse,
        OauthTokenResponse,
        BasicTokenIntrospectionResponse,
        StandardRevocableToken,
        BasicRevocationErrorResponse,
    >::new(ClientId::new(cfg.client_id.clone()))
    .set_auth_type(AuthType::RequestBody);

    if !cfg.client_secret.is_empty() {
        client = client.set_client_secret(ClientSecret::new(cfg.client_secret.clone()));
    }

    let client = client
        .set_auth_uri(AuthUrl::new(cfg.auth_url.to_string())?)
        .set_token_uri(TokenUrl::new(cfg.token_url.to_string())?)
        .set_redirect_uri(RedirectUrl::new(cfg.redirect_url.to_string())?);

    Ok(client)
}

/// Build the reqwest client used for token endpoint calls.
///
/// Redirects are disabled; the total timeout bounds a refresh attempt.
pub fn build_http_client(cfg: &OauthConfig) -> Result<reqwest::Client, KeeperError> {
    let mut headers = HeaderMap::new();
    let mut builder = reqwest::Client::builder()
        .user_agent(OAUTH_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(cfg.refresh_timeout_secs.max(1)));

    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if cfg.enable_multiplexing {
        builder = builder.http2_adaptive_window(true);
    } else {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    }

    Ok(builder.default_headers(headers).build()?)
}
