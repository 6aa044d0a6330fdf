//! Invocation entrypoint: `{automationId, triggerData, userId}` in,
//! `{success, result | error}` out. Never returns an `Err` and never panics
//! on bad input; every failure is folded into the outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::integration::UniversalApiCaller;
use crate::models::automation::Automation;
use crate::models::run::AutomationRun;
use crate::state::AppStateInner;
use crate::workflow::agent_caller::AgentCaller;
use crate::workflow::context::ExecutionContext;
use crate::workflow::credentials::load_credentials;
use crate::workflow::executor::StepInterpreter;
use crate::workflow::ProgressSink;

/// Name under which the trigger payload is visible to blueprint steps.
pub const TRIGGER_VARIABLE: &str = "trigger";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub automation_id: String,
    #[serde(default)]
    pub trigger_data: Value,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Absent when the run could not be created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl InvocationOutcome {
    fn failed(run_id: Option<String>, error: String) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            run_id,
        }
    }
}

pub async fn invoke(state: &AppStateInner, request: InvocationRequest) -> InvocationOutcome {
    invoke_with_cancel(state, request, CancellationToken::new()).await
}

pub async fn invoke_with_cancel(
    state: &AppStateInner,
    request: InvocationRequest,
    cancel: CancellationToken,
) -> InvocationOutcome {
    let automation = match state.automation_store.get(&request.automation_id).await {
        Ok(Some(a)) if a.user_id == request.user_id => a,
        Ok(_) => {
            return InvocationOutcome::failed(
                None,
                format!("Automation not found: {}", request.automation_id),
            )
        }
        Err(e) => return InvocationOutcome::failed(None, e.to_string()),
    };

    let run = AutomationRun::new(
        uuid::Uuid::new_v4().to_string(),
        automation.id.clone(),
        request.user_id.clone(),
        request.trigger_data.clone(),
    );
    if let Err(e) = state.run_store.create(&run).await {
        tracing::error!("[Runner] Failed to create run for automation {}: {}", automation.id, e);
        return InvocationOutcome::failed(None, e.to_string());
    }

    tracing::info!(
        "[Runner] Run {} started for automation '{}' ({} top-level steps)",
        run.id,
        automation.name,
        automation.blueprint.steps.len()
    );

    let mut ctx = ExecutionContext::new(
        run.id.clone(),
        automation.id.clone(),
        request.user_id.clone(),
        automation.blueprint.variables.clone(),
        automation.blueprint.steps.len(),
    );
    ctx.started_at = run.started_at;
    ctx.variables
        .insert(TRIGGER_VARIABLE.to_string(), request.trigger_data);

    match execute(state, &automation, &mut ctx, cancel).await {
        Ok(()) => {
            let result = Value::Object(ctx.variables);
            if let Err(e) = state.run_store.complete(&run.id, &result).await {
                tracing::warn!("[Runner] Failed to mark run {} completed: {}", run.id, e);
            }
            tracing::info!("[Runner] Run {} completed", run.id);
            InvocationOutcome {
                success: true,
                result: Some(result),
                error: None,
                run_id: Some(run.id),
            }
        }
        Err(e) => {
            let message = e.to_string();
            if let Err(store_err) = state.run_store.fail(&run.id, &message).await {
                tracing::warn!("[Runner] Failed to mark run {} failed: {}", run.id, store_err);
            }
            tracing::error!("[Runner] Run {} failed ({}): {}", run.id, e.kind(), message);
            InvocationOutcome::failed(Some(run.id), message)
        }
    }
}

async fn execute(
    state: &AppStateInner,
    automation: &Automation,
    ctx: &mut ExecutionContext,
    cancel: CancellationToken,
) -> Result<(), ExecutionError> {
    let credentials = load_credentials(&state.credential_store, &automation.id, &ctx.user_id).await?;
    let caller = UniversalApiCaller::new(
        &state.config,
        state.discovery.clone(),
        state.platform_catalog.clone(),
        state.discovery_cache.clone(),
    );
    let agents = AgentCaller::new(&state.config, &state.agent_store);
    let progress: &dyn ProgressSink = &state.run_store;
    let mut interpreter = StepInterpreter::new(caller, credentials, agents, Some(progress), cancel);
    interpreter.execute(&automation.blueprint.steps, ctx).await
}
