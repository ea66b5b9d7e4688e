//! Courtside HTTP server.
//!
//! Connects to `PostgreSQL`, applies migrations, starts the background sweeps
//! and serves the API until SIGINT/SIGTERM.

use anyhow::Context;
use courtside_core::Courtside;
use courtside_core::environment::{Environment, RandomTokens, SystemClock};
use courtside_postgres::PgStore;
use courtside_web::{AppState, BroadcastPublisher, Config, ConsoleMailer, build_router, jobs};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courtside=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Courtside server");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        timezone = %config.booking.timezone,
        app_url = %config.server.app_url,
        sweeps = config.sweeps.enabled,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    let store = PgStore::from_pool(pool);
    store.migrate().await.context("Failed to run migrations")?;
    info!("Database ready");

    let events = BroadcastPublisher::default();
    let env = Environment {
        clock: Arc::new(SystemClock),
        tokens: Arc::new(RandomTokens),
        mailer: Arc::new(ConsoleMailer::new()),
        events: Arc::new(events.clone()),
        app_url: config.server.app_url.clone(),
    };
    let service = Courtside::new(
        Arc::new(store),
        env,
        config.policy(),
        config.booking.timezone,
    );

    let (shutdown, _) = broadcast::channel::<()>(1);
    let sweeps = jobs::spawn_sweeps(&service, &config.sweeps, &shutdown);

    let app = build_router(AppState::new(service, events));
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let mut server_shutdown = shutdown.subscribe();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = server_shutdown.recv().await;
    });
    let server = tokio::spawn(async move { server.await });

    shutdown_signal().await;
    let _ = shutdown.send(());

    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "Server task failed"),
        Err(_) => warn!(timeout_secs = grace.as_secs(), "Graceful shutdown timed out"),
    }
    for sweep in sweeps {
        let _ = sweep.await;
    }

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully..."),
    }
}
