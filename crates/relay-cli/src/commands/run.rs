//! `relay run` / `relay run-status` - Invoke automations and inspect runs.

use relay_core::state::AppState;
use relay_core::workflow::{invoke, InvocationRequest};

use super::print_json;

pub async fn run(
    state: &AppState,
    automation_id: &str,
    user_id: &str,
    trigger: Option<&str>,
) -> Result<(), String> {
    let trigger_data = match trigger {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Invalid trigger JSON: {}", e))?,
        None => serde_json::Value::Null,
    };

    tracing::info!("Invoking automation {} for user {}", automation_id, user_id);
    let outcome = invoke(
        state,
        InvocationRequest {
            automation_id: automation_id.to_string(),
            trigger_data,
            user_id: user_id.to_string(),
        },
    )
    .await;

    print_json(&serde_json::to_value(&outcome).map_err(|e| e.to_string())?);

    if outcome.success {
        Ok(())
    } else {
        Err(outcome.error.unwrap_or_else(|| "Run failed".to_string()))
    }
}

pub async fn status(state: &AppState, run_id: &str) -> Result<(), String> {
    let run = state
        .run_store
        .get(run_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Run {} not found", run_id))?;

    print_json(&serde_json::to_value(&run).map_err(|e| e.to_string())?);
    Ok(())
}
