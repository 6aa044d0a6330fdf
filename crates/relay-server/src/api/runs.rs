use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use relay_core::error::ServerError;
use relay_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_run))
}

/// GET /api/runs/{id} - Run status, result and latest progress snapshot
async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.run_store.get(&id).await? {
        Some(run) => Ok(Json(serde_json::json!({ "run": run }))),
        None => Err(ServerError::NotFound(format!("Run {} not found", id))),
    }
}
