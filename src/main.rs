use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use signcraft_api::auth::{AuthConfig, AuthService};
use signcraft_api::config::{init_tracing, load_config};
use signcraft_api::rate_limiter::{
    spawn_sweeper, RateLimitConfig, RateLimitPolicy, RateLimiter,
};
use signcraft_api::{app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config().context("failed to load configuration")?;
    init_tracing(cfg.log_level(), cfg.log_json);
    info!(environment = %cfg.environment, "starting signcraft-api");

    let pool = Arc::new(
        db::establish_connection(&cfg)
            .await
            .context("failed to connect to the database")?,
    );
    if cfg.auto_migrate {
        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;
    }

    let auth = Arc::new(AuthService::new(
        AuthConfig {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_issuer: cfg.jwt_issuer.clone(),
            jwt_audience: cfg.jwt_audience.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration),
        },
        pool.clone(),
    ));

    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        default_policy: RateLimitPolicy {
            requests_per_window: cfg.rate_limit_requests_per_window,
            window: Duration::from_secs(cfg.rate_limit_window_seconds),
        },
        path_policies: vec![(
            "/auth/login".to_string(),
            RateLimitPolicy {
                requests_per_window: cfg.rate_limit_login_requests_per_window,
                window: Duration::from_secs(cfg.rate_limit_window_seconds),
            },
        )],
        sweep_interval: Duration::from_secs(cfg.rate_limit_sweep_interval_seconds),
    }));
    let sweeper = spawn_sweeper(limiter.clone());

    let state = AppState::new(pool, auth);
    let router = app(state, limiter);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.shutdown();
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
