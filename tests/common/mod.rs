#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use gbp_keeper::config::OauthConfig;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use url::Url;

#[derive(Debug, Clone)]
pub struct Captured {
    pub headers: HeaderMap,
    pub form: HashMap<String, String>,
}

/// Shared state of the mock Google token endpoint.
#[derive(Clone)]
pub struct MockTokenEndpoint {
    pub reqs: Arc<Mutex<Vec<Captured>>>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub fail_refresh: Arc<AtomicBool>,
    pub rotate_refresh: Arc<AtomicBool>,
    pub refresh_delay_ms: Arc<AtomicU64>,
    pub expires_in: Arc<AtomicI64>,
}

impl Default for MockTokenEndpoint {
    fn default() -> Self {
        Self {
            reqs: Arc::default(),
            refresh_calls: Arc::default(),
            fail_refresh: Arc::default(),
            rotate_refresh: Arc::default(),
            refresh_delay_ms: Arc::default(),
            expires_in: Arc::new(AtomicI64::new(3600)),
        }
    }
}

impl MockTokenEndpoint {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Include a rotated `refresh_token` in refresh responses.
    pub fn set_rotate_refresh(&self, rotate: bool) {
        self.rotate_refresh.store(rotate, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap(), Ordering::SeqCst);
    }

    pub fn set_expires_in(&self, secs: i64) {
        self.expires_in.store(secs, Ordering::SeqCst);
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.reqs.lock().unwrap().clone()
    }
}

async fn token_handler(
    State(state): State<MockTokenEndpoint>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> (StatusCode, Json<Value>) {
    let form: HashMap<String, String> = url::form_urlencoded::parse(&body).into_owned().collect();
    state.reqs.lock().unwrap().push(Captured {
        headers,
        form: form.clone(),
    });

    let expires_in = state.expires_in.load(Ordering::SeqCst);

    match form.get("grant_type").map(String::as_str).unwrap_or("") {
        "authorization_code" => (
            StatusCode::OK,
            Json(json!({
                "access_token": "access-from-code",
                "token_type": "Bearer",
                "expires_in": expires_in,
                "refresh_token": "refresh-from-code",
                "scope": "https://www.googleapis.com/auth/business.manage"
            })),
        ),
        "refresh_token" => {
            let n = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if state.fail_refresh.load(Ordering::SeqCst) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_grant",
                        "error_description": "Token has been expired or revoked."
                    })),
                );
            }
            let mut body = json!({
                "access_token": format!("access-from-refresh-{n}"),
                "token_type": "Bearer",
                "expires_in": expires_in
            });
            if state.rotate_refresh.load(Ordering::SeqCst) {
                body["refresh_token"] = json!(format!("refresh-rotated-{n}"));
            }
            (StatusCode::OK, Json(body))
        }
        other => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "unsupported_grant_type",
                "grant_type": other,
            })),
        ),
    }
}

pub async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{addr}")).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

/// Start the mock token endpoint and return its state plus the `/token` URL.
pub async fn spawn_token_endpoint() -> (MockTokenEndpoint, Url) {
    let mock = MockTokenEndpoint::default();
    let app = Router::new()
        .route("/token", post(token_handler))
        .with_state(mock.clone());
    let base = spawn_test_server(app).await;
    (mock, base.join("/token").expect("token url"))
}

pub fn oauth_config(token_url: Url) -> OauthConfig {
    OauthConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_url: Url::parse("http://oauth.test/authorize").unwrap(),
        token_url,
        redirect_url: Url::parse("http://localhost:8188/oauth/google/callback").unwrap(),
        ..OauthConfig::default()
    }
}

pub fn unique_sqlite_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "gbp-keeper-{prefix}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    temp_path
}

pub fn database_url(path: &std::path::Path) -> String {
    format!("sqlite:{}", path.display())
}

pub fn remove_sqlite_files(path: &std::path::Path) {
    let _ = std::fs::remove_file(format!("{}-wal", path.display()));
    let _ = std::fs::remove_file(format!("{}-shm", path.display()));
    let _ = std::fs::remove_file(path);
}

/// Run `sql` against the database file through a separate pool, behind the actor's back.
pub async fn exec_on_side_connection(path: &std::path::Path, sql: &str) {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url(path))
        .await
        .expect("side pool");
    sqlx::query(sql).execute(&pool).await.expect("side statement");
    pool.close().await;
}
