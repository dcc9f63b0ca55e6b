use gbp_keeper::config::Config;
use gbp_keeper::server::router::{KeeperState, cookie_key, keeper_router};
use gbp_keeper::token::TokenManager;
use mimalloc::MiMalloc;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        listen_addr = %cfg.basic.listen_addr,
        listen_port = cfg.basic.listen_port,
        loglevel = %cfg.basic.loglevel,
        token_url = %cfg.oauth.token_url,
        redirect_url = %cfg.oauth.redirect_url,
        proxy = %cfg.oauth.proxy.as_ref().map_or("<none>", |u| u.as_str()),
        insecure_cookie = cfg.basic.insecure_cookie,
        "gbp-keeper configuration loaded"
    );
    if cfg.basic.insecure_cookie {
        warn!("basic.insecure_cookie is set; cookies are sent without the Secure attribute");
    }

    let db = gbp_keeper::db::spawn(&cfg.basic.database_url).await?;
    let tokens = TokenManager::new(db, Arc::new(cfg.oauth.clone()))?;
    let key = cookie_key(cfg.basic.cookie_secret.as_deref())?;
    let state = KeeperState::new(
        tokens,
        Arc::from(cfg.basic.api_key.as_str()),
        cfg.basic.insecure_cookie,
        key,
    );
    let app = keeper_router(state);

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
