use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use relay_core::blueprint::Blueprint;
use relay_core::error::ServerError;
use relay_core::models::automation::Automation;
use relay_core::state::AppState;
use relay_core::workflow::{invoke, InvocationRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_automations).post(create_automation))
        .route("/{id}", get(get_automation).delete(delete_automation))
        .route("/{id}/execute", post(execute_automation))
        .route("/{id}/runs", get(list_runs))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAutomationInput {
    #[serde(default)]
    id: Option<String>,
    user_id: String,
    name: String,
    blueprint: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteInput {
    user_id: String,
    #[serde(default)]
    trigger_data: serde_json::Value,
}

async fn list_automations(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let automations = state.automation_store.list_by_user(&q.user_id).await?;
    Ok(Json(serde_json::json!({ "automations": automations })))
}

/// POST /api/automations - Register a blueprint. The blueprint is validated
/// before it is stored.
async fn create_automation(
    State(state): State<AppState>,
    Json(body): Json<CreateAutomationInput>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let blueprint = Blueprint::from_value(body.blueprint).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let automation = Automation::new(
        body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        body.user_id,
        body.name,
        blueprint,
    );
    state.automation_store.save(&automation).await?;
    tracing::info!("Registered automation {} ({})", automation.id, automation.name);
    Ok(Json(serde_json::json!({ "automation": automation })))
}

async fn get_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.automation_store.get(&id).await? {
        Some(a) => Ok(Json(serde_json::json!({ "automation": a }))),
        None => Err(ServerError::NotFound(format!("Automation {} not found", id))),
    }
}

async fn delete_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.automation_store.delete(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /api/automations/{id}/execute - Run the automation and return the
/// invocation outcome. Step failures are reported in the body, not as HTTP errors.
async fn execute_automation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ExecuteInput>,
) -> Json<serde_json::Value> {
    let outcome = invoke(
        &state,
        InvocationRequest {
            automation_id: id,
            trigger_data: body.trigger_data,
            user_id: body.user_id,
        },
    )
    .await;
    Json(serde_json::to_value(&outcome).unwrap_or_else(|e| {
        serde_json::json!({ "success": false, "error": format!("Failed to serialize outcome: {}", e) })
    }))
}

async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let runs = state.run_store.list_by_automation(&id).await?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}
