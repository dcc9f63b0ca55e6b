use crate::db::models::{DbOauthToken, TokenUpsert};
use crate::db::schema::SQLITE_INIT;
use crate::error::KeeperError;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub enum DbActorMessage {
    /// Insert or update the token pair for a user and return the stored row.
    UpsertToken(TokenUpsert, RpcReplyPort<Result<DbOauthToken, KeeperError>>),

    /// Write back a refreshed token. Never inserts; replies `None` when the row is gone.
    UpdateRefreshedToken(
        TokenUpsert,
        RpcReplyPort<Result<Option<DbOauthToken>, KeeperError>>,
    ),

    /// Load the token pair for a user, if any.
    GetToken(String, RpcReplyPort<Result<Option<DbOauthToken>, KeeperError>>),

    /// Remove the token pair for a user; replies whether a row was removed.
    DeleteToken(String, RpcReplyPort<Result<bool, KeeperError>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn upsert_token(&self, upsert: TokenUpsert) -> Result<DbOauthToken, KeeperError> {
        ractor::call!(self.actor, DbActorMessage::UpsertToken, upsert)
            .map_err(|e| KeeperError::RactorError(format!("DbActor UpsertToken RPC failed: {e}")))?
    }

    pub async fn update_refreshed_token(
        &self,
        update: TokenUpsert,
    ) -> Result<Option<DbOauthToken>, KeeperError> {
        ractor::call!(self.actor, DbActorMessage::UpdateRefreshedToken, update).map_err(|e| {
            KeeperError::RactorError(format!("DbActor UpdateRefreshedToken RPC failed: {e}"))
        })?
    }

    pub async fn get_token(&self, user_id: &str) -> Result<Option<DbOauthToken>, KeeperError> {
        ractor::call!(self.actor, DbActorMessage::GetToken, user_id.to_string())
            .map_err(|e| KeeperError::RactorError(format!("DbActor GetToken RPC failed: {e}")))?
    }

    pub async fn delete_token(&self, user_id: &str) -> Result<bool, KeeperError> {
        ractor::call!(self.actor, DbActorMessage::DeleteToken, user_id.to_string())
            .map_err(|e| KeeperError::RactorError(format!("DbActor DeleteToken RPC failed: {e}")))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::UpsertToken(upsert, reply) => {
                let res = self.upsert_token(&state.pool, upsert).await;
                let _ = reply.send(res);
            }
            DbActorMessage::UpdateRefreshedToken(update, reply) => {
                let res = self.update_refreshed_token(&state.pool, update).await;
                let _ = reply.send(res);
            }
            DbActorMessage::GetToken(user_id, reply) => {
                let res = self.get_token(&state.pool, &user_id).await;
                let _ = reply.send(res);
            }
            DbActorMessage::DeleteToken(user_id, reply) => {
                let res = self.delete_token(&state.pool, &user_id).await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn upsert_token(
        &self,
        pool: &SqlitePool,
        upsert: TokenUpsert,
    ) -> Result<DbOauthToken, KeeperError> {
        let mut tx = pool.begin().await?;

        let stored_refresh: Option<String> =
            sqlx::query_scalar("SELECT refresh_token FROM oauth_tokens WHERE user_id = ?")
                .bind(&upsert.user_id)
                .fetch_optional(&mut *tx)
                .await?;

        // A provider may omit refresh_token on refresh; keep the one we have.
        let refresh_token = upsert
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .or(stored_refresh)
            .ok_or(KeeperError::MissingRefreshToken)?;

        let now = Utc::now();
        let row = sqlx::query_as::<_, DbOauthToken>(
            r#"
        INSERT INTO oauth_tokens (
            user_id, access_token, refresh_token, token_type, scope, expires_at, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            token_type = excluded.token_type,
            scope = COALESCE(excluded.scope, scope),
            expires_at = excluded.expires_at,
            updated_at = excluded.updated_at
        RETURNING user_id, access_token, refresh_token, token_type, scope, expires_at, created_at, updated_at
        "#,
        )
        .bind(upsert.user_id)
        .bind(upsert.access_token)
        .bind(refresh_token)
        .bind(upsert.token_type)
        .bind(upsert.scope)
        .bind(upsert.expires_at)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = %row.user_id, expires_at = %row.expires_at, "token row upserted");
        Ok(row)
    }

    async fn update_refreshed_token(
        &self,
        pool: &SqlitePool,
        update: TokenUpsert,
    ) -> Result<Option<DbOauthToken>, KeeperError> {
        let refresh_token = update.refresh_token.filter(|t| !t.trim().is_empty());

        let row = sqlx::query_as::<_, DbOauthToken>(
            r#"
        UPDATE oauth_tokens SET
            access_token = ?,
            refresh_token = COALESCE(?, refresh_token),
            token_type = ?,
            scope = COALESCE(?, scope),
            expires_at = ?,
            updated_at = ?
        WHERE user_id = ?
        RETURNING user_id, access_token, refresh_token, token_type, scope, expires_at, created_at, updated_at
        "#,
        )
        .bind(update.access_token)
        .bind(refresh_token)
        .bind(update.token_type)
        .bind(update.scope)
        .bind(update.expires_at)
        .bind(Utc::now())
        .bind(&update.user_id)
        .fetch_optional(pool)
        .await?;

        if row.is_none() {
            debug!(user_id = %update.user_id, "refreshed token dropped; row no longer exists");
        }
        Ok(row)
    }

    async fn get_token(
        &self,
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Option<DbOauthToken>, KeeperError> {
        let row = sqlx::query_as::<_, DbOauthToken>(
            r#"
        SELECT user_id, access_token, refresh_token, token_type, scope, expires_at, created_at, updated_at
        FROM oauth_tokens
        WHERE user_id = ?
        "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    async fn delete_token(&self, pool: &SqlitePool, user_id: &str) -> Result<bool, KeeperError> {
        let res = sqlx::query("DELETE FROM oauth_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Spawn the database actor and return a cloneable handle.
///
/// The actor is unnamed so several stores can coexist in one process.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, KeeperError> {
    let (actor, _jh) = Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| KeeperError::RactorError(format!("DbActor spawn failed: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), KeeperError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
