//! Keyhole - sign in with Google or GitHub
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Index / protected pages                                  │
//! │  - Sign-in redirect and callback, logout                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Authentication Coordinator                   │
//! │  - Provider registry (Google, GitHub adapters)              │
//! │  - Profile <-> session                                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Session Layer                           │
//! │  - Signed session cookie                                    │
//! │  - Injected session store (in-memory by default)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and HTML pages
//! - `auth`: Identity provider adapters and the coordinator
//! - `session`: Session handle, store and middleware
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod session;

use std::sync::Arc;

use auth::{Authenticator, OAuthProvider, ProviderKind};
use session::{MemoryStore, SessionManager, SessionStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Registered identity providers
    pub auth: Arc<Authenticator>,

    /// Session settings and store
    pub sessions: SessionManager,
}

impl AppState {
    /// Initialize application state with an in-memory session store
    ///
    /// # Errors
    /// Returns error if a provider cannot be set up from its configuration
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Initialize application state with the given session store
    ///
    /// # Steps
    /// 1. Build the outbound HTTP client
    /// 2. Register an adapter for every configured provider
    /// 3. Set up session handling
    pub fn with_store(
        config: config::AppConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Keyhole/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        // 2. Register identity providers
        let mut auth = Authenticator::new();
        let configured = [
            (ProviderKind::Google, config.providers.google.as_ref()),
            (ProviderKind::GitHub, config.providers.github.as_ref()),
        ];
        for (kind, provider_config) in configured {
            let Some(provider_config) = provider_config else {
                continue;
            };
            let provider = OAuthProvider::new(kind, provider_config, http_client.clone())?;
            auth.register(kind.name(), Arc::new(provider));
            tracing::info!(provider = kind.name(), "Identity provider registered");
        }

        Ok(Self::from_parts(config, store, auth))
    }

    /// Assemble state from ready-made parts
    pub fn from_parts(
        config: config::AppConfig,
        store: Arc<dyn SessionStore>,
        auth: Authenticator,
    ) -> Self {
        let sessions = SessionManager::new(store, &config.session);

        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            sessions,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::middleware;
    use tower::ServiceBuilder;
    use tower_http::{services::ServeDir, trace::TraceLayer};

    let static_files = ServeDir::new(&state.config.server.public_dir);

    axum::Router::new()
        .merge(api::app_router())
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.sessions.clone(),
                    session::manage_sessions,
                )),
        )
        .with_state(state)
}
