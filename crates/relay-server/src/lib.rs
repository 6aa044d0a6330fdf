//! Relay Server - HTTP surface for the blueprint engine.
//!
//! Provides:
//! - Automation registration and invocation over a RESTful API (axum)
//! - Run status with the latest progress snapshot
//! - SQLite persistence shared with the CLI
//!
//! All execution semantics live in `relay-core`; this crate only adapts them
//! to HTTP.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use relay_core::integration::PlatformCatalog;
use relay_core::state::{AppState, AppStateInner};
use relay_core::{Database, EngineConfig};

/// Configuration for the Relay HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Optional JSON file of platform configs that take precedence over discovery.
    pub platform_catalog: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3220,
            db_path: "relay.db".to_string(),
            platform_catalog: None,
        }
    }
}

/// Create a shared `AppState` from a database path and an optional platform
/// catalog file. Engine settings come from `RELAY_*` environment variables.
pub async fn create_app_state(db_path: &str, platform_catalog: Option<&str>) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let catalog = match platform_catalog {
        Some(path) => PlatformCatalog::from_file(path)?,
        None => PlatformCatalog::new(),
    };
    if !catalog.is_empty() {
        tracing::info!("Loaded {} platform override(s)", catalog.len());
    }

    Ok(Arc::new(AppStateInner::with_config(db, EngineConfig::from_env(), catalog)))
}

/// Build the application router. Exposed so tests can drive it without a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // try_init: the CLI may already have installed a subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_core=info,relay_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!("Starting Relay server on {}:{}", config.host, config.port);

    let state = create_app_state(&config.db_path, config.platform_catalog.as_deref()).await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(config: ServerConfig, state: AppState) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Relay server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "relay-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
