use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::{io::ErrorKind, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod constants;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod setup;
mod state;
mod urls;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + setup flags ---
    let (cfg, flags) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting entebus-server on {}", cfg.addr());

    // --- PostgreSQL pool ---
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url())
        .await?;

    // --- Object storage ---
    let pictures = services::pictures::PictureStore::new(&cfg);

    // --- Handle setup mode ---
    if flags.any() {
        setup::run(flags, &cfg, &db, &pictures).await?;
        tracing::info!("Setup actions complete.");
        return Ok(()); // exit after setup
    }

    // --- Redis connection manager ---
    let redis_client = redis::Client::open(cfg.redis_url())?;
    let redis = redis::aio::ConnectionManager::new(redis_client).await?;
    let locks = services::locks::LockManager::new(redis);

    // --- Telemetry sink ---
    let events = services::telemetry::EventLogger::new(&cfg);

    let state = state::AppState {
        db: db.clone(),
        locks,
        pictures,
        events,
    };

    // --- Background token cleaner ---
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(constants::TOKEN_CLEANER_INTERVAL));
        loop {
            ticker.tick().await;
            match services::auth::purge_expired_tokens(&db).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Removed {} expired tokens", removed),
                Err(err) => tracing::warn!("Token cleanup failed: {}", err),
            }
        }
    });

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
