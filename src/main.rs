//! Keyhole binary entry point

use std::sync::Arc;

use keyhole::{AppState, config, session::MemoryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
/// 6. Start background tasks (session pruning)
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging settings may come from .env
    let dotenv = dotenvy::dotenv();

    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("KEYHOLE__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let log_level =
        std::env::var("KEYHOLE__LOGGING__LEVEL").unwrap_or_else(|_| "info".to_string());
    let default_filter = format!("keyhole={log_level},tower_http=debug");

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.clone().into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.clone().into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Keyhole...");
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    // 2. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        public_dir = %config.server.public_dir.display(),
        "Configuration loaded"
    );

    // 3. Initialize application state
    let store = MemoryStore::new();
    let state = AppState::with_store(config.clone(), Arc::new(store.clone()))?;

    // 4. Build Axum router
    let app = keyhole::build_router(state);

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // 6. Start background tasks
    if let Some(max_age) = config.session.max_age_seconds {
        spawn_session_prune_task(store, max_age);
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn background task dropping expired sessions from memory
fn spawn_session_prune_task(store: MemoryStore, max_age_seconds: i64) {
    let interval_secs = u64::try_from(max_age_seconds).unwrap_or(1).clamp(1, 3600);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            store.prune_expired().await;
        }
    });

    tracing::info!(interval_secs, "Session prune task spawned");
}
