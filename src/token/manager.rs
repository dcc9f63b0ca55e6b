use super::expiry::is_expired;
use super::grant::TokenGrant;
use super::mirror::{BOOKKEEPING_TTL, MirroredToken, NoMirror, TokenMirror};
use crate::config::OauthConfig;
use crate::db::{DbActorHandle, DbOauthToken, TokenUpsert};
use crate::error::KeeperError;
use crate::oauth::{OauthEndpoints, build_http_client};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Owns the Google token pair of every user: persistence, lazy refresh and the mirror.
///
/// Cloning is cheap; clones share the database actor and HTTP client.
#[derive(Clone)]
pub struct TokenManager {
    db: DbActorHandle,
    cfg: Arc<OauthConfig>,
    http: reqwest::Client,
}

impl TokenManager {
    pub fn new(db: DbActorHandle, cfg: Arc<OauthConfig>) -> Result<Self, KeeperError> {
        let http = build_http_client(&cfg)?;
        Ok(Self { db, cfg, http })
    }

    pub fn config(&self) -> &Arc<OauthConfig> {
        &self.cfg
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Persist a grant for `user_id`. `expires_at` is derived from the clamped `expires_in` here.
    pub async fn store(&self, user_id: &str, grant: &TokenGrant) -> Result<(), KeeperError> {
        self.store_mirrored(user_id, grant, &mut NoMirror).await
    }

    /// [`Self::store`], then write the new values through to `mirror`.
    pub async fn store_mirrored(
        &self,
        user_id: &str,
        grant: &TokenGrant,
        mirror: &mut dyn TokenMirror,
    ) -> Result<(), KeeperError> {
        let row = self
            .db
            .upsert_token(upsert_for(user_id, grant))
            .await
            .inspect_err(|e| log_store_failure(user_id, "write", e))?;
        write_row_to_mirror(mirror, &row, grant.lifetime());
        Ok(())
    }

    /// A valid access token for `user_id`, or `None` when the user must reconnect.
    ///
    /// Only store failures surface as `Err`.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<Option<String>, KeeperError> {
        self.get_valid_access_token_mirrored(user_id, &mut NoMirror)
            .await
    }

    /// [`Self::get_valid_access_token`], consulting `mirror` first.
    pub async fn get_valid_access_token_mirrored(
        &self,
        user_id: &str,
        mirror: &mut dyn TokenMirror,
    ) -> Result<Option<String>, KeeperError> {
        match self.resolve_access_token_mirrored(user_id, mirror).await {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.is_reconnect_required() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`Self::get_valid_access_token`] but keeps the failure reason:
    /// [`KeeperError::NotConnected`], [`KeeperError::RefreshFailed`] or a store failure.
    pub async fn resolve_access_token(&self, user_id: &str) -> Result<String, KeeperError> {
        self.resolve_access_token_mirrored(user_id, &mut NoMirror)
            .await
    }

    pub async fn resolve_access_token_mirrored(
        &self,
        user_id: &str,
        mirror: &mut dyn TokenMirror,
    ) -> Result<String, KeeperError> {
        let now = Utc::now();
        let cached = mirror.read();
        if let Some(token) = cached.as_ref().and_then(|c| c.usable_for(user_id, now)) {
            debug!(user_id, "access token served from mirror");
            return Ok(token.to_string());
        }

        let record = self
            .db
            .get_token(user_id)
            .await
            .inspect_err(|e| log_store_failure(user_id, "read", e))?
            .ok_or(KeeperError::NotConnected)?;

        if !is_expired(record.expires_at, now) {
            write_row_to_mirror(mirror, &record, record.expires_at - now);
            return Ok(record.access_token);
        }

        debug!(user_id, expires_at = %record.expires_at, "access token within expiry buffer; refreshing");
        let grant = self.refresh(&record).await?;

        // Update-only: a disconnect that landed during the refresh must stay a disconnect.
        let row = self
            .db
            .update_refreshed_token(upsert_for(user_id, &grant))
            .await
            .inspect_err(|e| log_store_failure(user_id, "write", e))?
            .ok_or_else(|| {
                info!(user_id, "connection removed during refresh; discarding new token");
                KeeperError::NotConnected
            })?;
        write_row_to_mirror(mirror, &row, grant.lifetime());
        info!(user_id, "Access token refreshed successfully");
        Ok(row.access_token)
    }

    /// True if [`Self::get_valid_access_token`] would return a token.
    pub async fn has_valid_connection(&self, user_id: &str) -> Result<bool, KeeperError> {
        Ok(self.get_valid_access_token(user_id).await?.is_some())
    }

    pub async fn has_valid_connection_mirrored(
        &self,
        user_id: &str,
        mirror: &mut dyn TokenMirror,
    ) -> Result<bool, KeeperError> {
        Ok(self
            .get_valid_access_token_mirrored(user_id, mirror)
            .await?
            .is_some())
    }

    /// Forget the token pair for `user_id`. Deleting an unknown user is not an error.
    pub async fn delete(&self, user_id: &str) -> Result<(), KeeperError> {
        self.delete_mirrored(user_id, &mut NoMirror).await
    }

    /// [`Self::delete`], also clearing `mirror`.
    pub async fn delete_mirrored(
        &self,
        user_id: &str,
        mirror: &mut dyn TokenMirror,
    ) -> Result<(), KeeperError> {
        mirror.clear();
        let removed = self
            .db
            .delete_token(user_id)
            .await
            .inspect_err(|e| log_store_failure(user_id, "delete", e))?;
        info!(user_id, removed, "Google connection deleted");
        Ok(())
    }

    async fn refresh(&self, record: &DbOauthToken) -> Result<TokenGrant, KeeperError> {
        match OauthEndpoints::refresh_access_token(&self.cfg, &record.refresh_token, &self.http)
            .await
        {
            Ok(resp) => Ok(TokenGrant::from(resp)),
            Err(e) => {
                warn!(user_id = %record.user_id, error = %e, "Google token refresh failed");
                Err(KeeperError::RefreshFailed(e))
            }
        }
    }
}

fn upsert_for(user_id: &str, grant: &TokenGrant) -> TokenUpsert {
    TokenUpsert {
        user_id: user_id.to_string(),
        access_token: grant.access_token.clone(),
        refresh_token: grant.refresh_token.clone(),
        token_type: grant.token_type.clone(),
        scope: grant.scope.clone(),
        expires_at: Utc::now() + grant.lifetime(),
    }
}

/// Mirror the authoritative row; the access slot lives for `access_ttl`.
fn write_row_to_mirror(mirror: &mut dyn TokenMirror, row: &DbOauthToken, access_ttl: Duration) {
    mirror.write(
        &MirroredToken {
            user_id: row.user_id.clone(),
            access_token: row.access_token.clone(),
            expires_at: row.expires_at,
            scope: row.scope.clone(),
        },
        access_ttl,
        BOOKKEEPING_TTL.max(access_ttl),
    );
}

fn log_store_failure(user_id: &str, op: &str, e: &KeeperError) {
    if e.is_store_failure() {
        error!(user_id, op, error = %e, "token store failure");
    } else {
        debug!(user_id, op, error = %e, "token store rejected the request");
    }
}
