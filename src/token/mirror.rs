//! Non-authoritative side channel for token data.
//!
//! A mirror only ever shortens the path to a token the database would also hand out. Every read is
//! re-validated against its embedded expiry, and a mirror entry never triggers a refresh.

use super::expiry::is_expired;
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};

/// Cookie slot holding the access token; lives as long as the token itself.
pub const ACCESS_TOKEN_COOKIE: &str = "gbp_access_token";
/// Cookie slot holding the expiry as epoch milliseconds.
pub const EXPIRY_COOKIE: &str = "gbp_token_expiry";
/// Cookie slot holding the space-delimited scope.
pub const SCOPE_COOKIE: &str = "gbp_token_scope";
/// Cookie slot binding the mirror to the user it was written for.
pub const USER_COOKIE: &str = "gbp_token_user";

/// TTL for the bookkeeping slots (expiry, scope, user).
pub const BOOKKEEPING_TTL: Duration = Duration::days(30);

/// What a mirror holds for one user.
#[derive(Clone, PartialEq, Eq)]
pub struct MirroredToken {
    pub user_id: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: Option<String>,
}

impl MirroredToken {
    /// The access token, if this entry is for `user_id` and still outside the expiry buffer.
    pub fn usable_for(&self, user_id: &str, now: DateTime<Utc>) -> Option<&str> {
        (self.user_id == user_id && !is_expired(self.expires_at, now))
            .then_some(self.access_token.as_str())
    }
}

impl std::fmt::Debug for MirroredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirroredToken")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A short-lived cache in front of the token store.
pub trait TokenMirror: Send {
    /// Read whatever the mirror holds. Absent or garbled slots yield `None`.
    fn read(&self) -> Option<MirroredToken>;

    /// Overwrite the mirror. `access_ttl` applies to the access token slot,
    /// `bookkeeping_ttl` to the remaining slots.
    fn write(&mut self, token: &MirroredToken, access_ttl: Duration, bookkeeping_ttl: Duration);

    /// Drop every mirrored slot.
    fn clear(&mut self);
}

/// A mirror that holds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

impl TokenMirror for NoMirror {
    fn read(&self) -> Option<MirroredToken> {
        None
    }

    fn write(&mut self, _token: &MirroredToken, _access_ttl: Duration, _bookkeeping_ttl: Duration) {
    }

    fn clear(&mut self) {}
}

/// Mirror backed by encrypted (private) cookies.
///
/// Wraps the request's jar; hand it back with [`CookieMirror::into_jar`] so the response carries
/// the `Set-Cookie` headers.
pub struct CookieMirror {
    jar: PrivateCookieJar,
    secure: bool,
}

impl CookieMirror {
    pub fn new(jar: PrivateCookieJar, secure: bool) -> Self {
        Self { jar, secure }
    }

    pub fn into_jar(self) -> PrivateCookieJar {
        self.jar
    }

    fn value(&self, name: &str) -> Option<String> {
        self.jar
            .get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn set(&mut self, name: &'static str, value: String, ttl: Duration) {
        let cookie = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(ttl.num_seconds().max(0)))
            .build();
        self.jar = self.jar.clone().add(cookie);
    }

    fn unset(&mut self, name: &'static str) {
        self.jar = self.jar.clone().remove(Cookie::build(name).path("/"));
    }
}

impl TokenMirror for CookieMirror {
    fn read(&self) -> Option<MirroredToken> {
        let user_id = self.value(USER_COOKIE)?;
        let access_token = self.value(ACCESS_TOKEN_COOKIE)?;
        let expires_at = self
            .value(EXPIRY_COOKIE)?
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)?;
        let scope = self.value(SCOPE_COOKIE);

        Some(MirroredToken {
            user_id,
            access_token,
            expires_at,
            scope,
        })
    }

    fn write(&mut self, token: &MirroredToken, access_ttl: Duration, bookkeeping_ttl: Duration) {
        self.set(ACCESS_TOKEN_COOKIE, token.access_token.clone(), access_ttl);
        self.set(
            EXPIRY_COOKIE,
            token.expires_at.timestamp_millis().to_string(),
            bookkeeping_ttl,
        );
        self.set(USER_COOKIE, token.user_id.clone(), bookkeeping_ttl);
        match token.scope.as_ref() {
            Some(scope) => self.set(SCOPE_COOKIE, scope.clone(), bookkeeping_ttl),
            None => self.unset(SCOPE_COOKIE),
        }
    }

    fn clear(&mut self) {
        for name in [ACCESS_TOKEN_COOKIE, EXPIRY_COOKIE, SCOPE_COOKIE, USER_COOKIE] {
            self.unset(name);
        }
    }
}
