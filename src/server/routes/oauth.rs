use crate::error::{KeeperError, OauthError};
use crate::oauth::OauthEndpoints;
use crate::server::guards::auth::CallerIdentity;
use crate::server::router::KeeperState;
use crate::token::{CookieMirror, TokenGrant};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{AuthorizationCode, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use time::Duration;
use tracing::{error, info};

const CSRF_COOKIE: &str = "gbp_oauth_csrf_token";
const PKCE_COOKIE: &str = "gbp_oauth_pkce_verifier";
const FLOW_USER_COOKIE: &str = "gbp_oauth_user";

/// Flow cookies carried between `/oauth/google/auth` and the callback.
struct FlowSession {
    pkce_verifier: String,
    csrf_token: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /oauth/google/auth
///
/// Starts the Google OAuth2 PKCE flow and redirects the browser to the consent screen.
pub async fn google_oauth_entry(
    State(state): State<KeeperState>,
    caller: CallerIdentity,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, KeeperError> {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) =
        OauthEndpoints::build_authorize_url(state.tokens.config(), challenge)?;

    let secure = !state.insecure_cookie;
    let jar = jar
        .add(build_flow_cookie(
            CSRF_COOKIE,
            csrf_token.secret().to_string(),
            secure,
        ))
        .add(build_flow_cookie(
            PKCE_COOKIE,
            verifier.secret().to_string(),
            secure,
        ))
        .add(build_flow_cookie(
            FLOW_USER_COOKIE,
            caller.as_str().to_string(),
            secure,
        ));

    info!(user_id = caller.as_str(), "Dispatching Google OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_ref())))
}

/// GET /oauth/google/callback
///
/// Verifies the flow cookies, exchanges the code and stores the token pair (mirrored to cookies).
pub async fn google_oauth_callback(
    State(state): State<KeeperState>,
    caller: CallerIdentity,
    Query(params): Query<CallbackParams>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (jar, session) = take_flow_cookies(jar);
    let mut mirror = CookieMirror::new(jar, !state.insecure_cookie);

    let result = async {
        let grant = process_oauth_exchange(&state, &caller, params, session).await?;
        state
            .tokens
            .store_mirrored(caller.as_str(), &grant, &mut mirror)
            .await
    }
    .await;

    match result {
        Ok(()) => {
            info!(user_id = caller.as_str(), "Google OAuth callback accepted");
            (mirror.into_jar(), (StatusCode::ACCEPTED, "Success")).into_response()
        }
        Err(err) => {
            error!(user_id = caller.as_str(), error = %err, "Google OAuth failure");
            (mirror.into_jar(), err.into_response()).into_response()
        }
    }
}

async fn process_oauth_exchange(
    state: &KeeperState,
    caller: &CallerIdentity,
    params: CallbackParams,
    session: Option<FlowSession>,
) -> Result<TokenGrant, KeeperError> {
    if let Some(denied) = params.error.filter(|e| !e.trim().is_empty()) {
        return Err(OauthError::flow(
            "CONSENT_DENIED",
            format!("Consent was not granted: {denied}"),
        )
        .into());
    }

    let code = non_empty(params.code)
        .ok_or_else(|| OauthError::flow("MISSING_CODE", "Missing authorization code"))?;
    let state_param = non_empty(params.state)
        .ok_or_else(|| OauthError::flow("MISSING_STATE", "Missing state parameter"))?;

    let session = session
        .ok_or_else(|| OauthError::flow("OAUTH_SESSION_MISSING", "Missing OAuth session cookies"))?;

    if state_param != session.csrf_token {
        return Err(OauthError::flow("CSRF_MISMATCH", "CSRF token mismatch").into());
    }

    if session.user_id != caller.as_str() {
        return Err(OauthError::flow(
            "USER_MISMATCH",
            "OAuth flow was started by a different user",
        )
        .into());
    }

    let token_response = OauthEndpoints::exchange_authorization_code(
        state.tokens.config(),
        AuthorizationCode::new(code),
        PkceCodeVerifier::new(session.pkce_verifier),
        state.tokens.http_client(),
    )
    .await
    .map_err(|e| OauthError::Flow {
        code: "TOKEN_EXCHANGE_FAILED".to_string(),
        message: format!("Token exchange failed: {e}"),
        details: None,
    })?;

    Ok(TokenGrant::from(token_response))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn take_flow_cookies(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<FlowSession>) {
    let csrf = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let pkce = jar.get(PKCE_COOKIE).map(|c| c.value().to_string());
    let user = jar.get(FLOW_USER_COOKIE).map(|c| c.value().to_string());

    let jar = jar
        .remove(Cookie::build(CSRF_COOKIE).path("/"))
        .remove(Cookie::build(PKCE_COOKIE).path("/"))
        .remove(Cookie::build(FLOW_USER_COOKIE).path("/"));

    match (pkce, csrf, user) {
        (Some(pkce_verifier), Some(csrf_token), Some(user_id)) => (
            jar,
            Some(FlowSession {
                pkce_verifier,
                csrf_token,
                user_id,
            }),
        ),
        _ => (jar, None),
    }
}

fn build_flow_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}
