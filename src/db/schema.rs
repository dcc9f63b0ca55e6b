//! SQL DDL for initializing the database schema.

/// SQLite schema includes:
/// - `oauth_tokens` table (one Google token pair per dashboard user)
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS oauth_tokens (
    user_id TEXT PRIMARY KEY NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    token_type TEXT NOT NULL DEFAULT 'Bearer',
    scope TEXT NULL, -- space-delimited
    expires_at TEXT NOT NULL, -- RFC3339
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_oauth_tokens_expires_at ON oauth_tokens(expires_at);
"#;
