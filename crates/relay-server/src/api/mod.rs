pub mod automations;
pub mod runs;

use axum::Router;

use relay_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/automations", automations::router())
        .nest("/api/runs", runs::router())
}
