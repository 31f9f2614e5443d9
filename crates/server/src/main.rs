//! Ballot server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use ballot_api::{AppState, RateLimiterState, router as api_router};
use ballot_common::Config;
use ballot_core::sender_from_config;
use ballot_db::{ElectionStore, SeaOrmStore};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Periodically drop expired codes and idle limiter entries.
fn spawn_maintenance(state: &AppState, limiter: RateLimiterState, every: Duration) {
    let otp = state.otp_service().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match otp.purge_stale().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired verification codes"),
                Err(e) => warn!(error = %e, "Failed to purge expired verification codes"),
            }
            limiter.cleanup().await;
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballot=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting ballot server...");

    let config = Config::load().context("Failed to load configuration")?;

    let db = ballot_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    ballot_db::migrate(&db).await?;
    info!("Migrations completed");

    let store: Arc<dyn ElectionStore> = Arc::new(SeaOrmStore::new(Arc::new(db)));
    let sms = sender_from_config(&config.sms)?;
    if config.sms.api_key.is_none() {
        warn!("No SMS API key configured; SMS delivery is simulated");
    }

    let state = AppState::new(store, sms, &config)?;
    let limiter = RateLimiterState::new();
    spawn_maintenance(
        &state,
        limiter.clone(),
        Duration::from_secs(config.otp.purge_interval_secs.max(60)),
    );

    let app = Router::new()
        .nest("/api", api_router(limiter))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host or server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
