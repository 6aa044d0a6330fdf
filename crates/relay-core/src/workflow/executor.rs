//! Step interpreter.
//!
//! Walks a step list with a single cursor, recursing into condition branches
//! and loop bodies. Each step's failure goes through its `on_error` policy:
//!
//! - `stop` (default): the failure propagates and aborts the run
//! - `continue`: the failure is logged and the next step runs
//! - `retry`: the step runs once more; a second failure propagates
//!
//! Cancellation is never absorbed by `continue` or `retry`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::blueprint::schema::{ActionSpec, AgentCallSpec, ConditionSpec, DelaySpec, LoopSpec};
use crate::blueprint::{expression, template, OnError, Step, StepKind};
use crate::error::ExecutionError;
use crate::integration::{PlatformId, UniversalApiCaller};
use crate::models::run::StepStatus;
use crate::workflow::agent_caller::AgentCaller;
use crate::workflow::context::ExecutionContext;
use crate::workflow::credentials::CredentialIndex;
use crate::workflow::ProgressSink;

type StepFuture<'f> = Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'f>>;

pub struct StepInterpreter<'a> {
    caller: UniversalApiCaller,
    credentials: CredentialIndex,
    agents: AgentCaller<'a>,
    progress: Option<&'a dyn ProgressSink>,
    cancel: CancellationToken,
}

impl<'a> StepInterpreter<'a> {
    pub fn new(
        caller: UniversalApiCaller,
        credentials: CredentialIndex,
        agents: AgentCaller<'a>,
        progress: Option<&'a dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            caller,
            credentials,
            agents,
            progress,
            cancel,
        }
    }

    /// Execute a blueprint's top-level steps in order.
    pub async fn execute(&mut self, steps: &[Step], ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        for (index, step) in steps.iter().enumerate() {
            ctx.step_index = index;
            self.run_step(step, ctx).await?;
        }
        Ok(())
    }

    fn run_steps<'f>(&'f mut self, steps: &'f [Step], ctx: &'f mut ExecutionContext) -> StepFuture<'f> {
        Box::pin(async move {
            for step in steps {
                self.run_step(step, ctx).await?;
            }
            Ok(())
        })
    }

    async fn run_step(&mut self, step: &Step, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        tracing::info!(
            "[Run {}] Step '{}' ({}) started",
            ctx.run_id,
            step.id,
            step.kind.type_name()
        );
        self.record(ctx, &step.id, StepStatus::Running, format!("Executing step: {}", step.name), None)
            .await;

        let mut result = self.execute_step(step, ctx).await;

        if step.on_error == OnError::Retry {
            if let Err(e) = &result {
                if !matches!(e, ExecutionError::Cancelled) {
                    tracing::warn!("[Run {}] Step '{}' failed, retrying: {}", ctx.run_id, step.id, e);
                    self.record(
                        ctx,
                        &step.id,
                        StepStatus::Running,
                        format!("Retrying step: {}", step.name),
                        Some(e.to_string()),
                    )
                    .await;
                    result = self.execute_step(step, ctx).await;
                }
            }
        }

        match result {
            Ok(()) => {
                self.record(ctx, &step.id, StepStatus::Completed, format!("Completed step: {}", step.name), None)
                    .await;
                Ok(())
            }
            Err(e) => {
                self.record(
                    ctx,
                    &step.id,
                    StepStatus::Failed,
                    format!("Step failed [{}]: {}", e.kind(), step.name),
                    Some(e.to_string()),
                )
                .await;
                if step.on_error == OnError::Continue && !matches!(e, ExecutionError::Cancelled) {
                    tracing::warn!("[Run {}] Step '{}' failed, continuing: {}", ctx.run_id, step.id, e);
                    Ok(())
                } else {
                    tracing::error!("[Run {}] Step '{}' failed: {}", ctx.run_id, step.id, e);
                    Err(e)
                }
            }
        }
    }

    async fn execute_step(&mut self, step: &Step, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        match &step.kind {
            StepKind::Action(spec) => self.execute_action(spec, ctx).await,
            StepKind::Condition(spec) => self.execute_condition(step, spec, ctx).await,
            StepKind::Loop(spec) => self.execute_loop(spec, ctx).await,
            StepKind::Delay(spec) => self.execute_delay(spec).await,
            StepKind::AiAgentCall(spec) => self.execute_agent_call(spec, ctx).await,
        }
    }

    async fn execute_action(&mut self, spec: &ActionSpec, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let params = template::resolve_map(&spec.parameters, &ctx.variables);
        let platform = PlatformId::parse(&spec.integration)?;
        let credentials = self
            .credentials
            .get(&platform)
            .ok_or_else(|| ExecutionError::MissingCredentials(spec.integration.clone()))?;

        let response = with_cancel(
            &self.cancel,
            self.caller.call(&platform, &spec.method, &params, credentials),
        )
        .await?;

        if let Some(var) = &spec.output_variable {
            ctx.variables.insert(var.clone(), response);
        }
        Ok(())
    }

    async fn execute_condition(
        &mut self,
        step: &Step,
        spec: &ConditionSpec,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ExecutionError> {
        let outcome = expression::evaluate(&spec.expression, &ctx.variables)?;
        tracing::info!(
            "[Run {}] Condition '{}' ({}) evaluated to {}",
            ctx.run_id,
            step.id,
            spec.expression,
            outcome
        );

        if outcome {
            self.run_steps(&spec.if_true, ctx).await
        } else if let Some(if_false) = &spec.if_false {
            self.run_steps(if_false, ctx).await
        } else {
            Ok(())
        }
    }

    async fn execute_loop(&mut self, spec: &LoopSpec, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let source = loop_source_path(&spec.array_source);
        let items = match template::lookup_path(&ctx.variables, source) {
            Some(Value::Array(items)) => items.clone(),
            other => {
                return Err(ExecutionError::LoopSourceType {
                    source_ref: spec.array_source.clone(),
                    found: json_type_name(other).to_string(),
                })
            }
        };

        let depth = ctx.loop_depth;
        let saved_item = ctx.variables.get("loop_item").cloned();
        let saved_index = ctx.variables.get("loop_index").cloned();
        let item_key = format!("loop_item_{}", depth);
        let index_key = format!("loop_index_{}", depth);

        ctx.loop_depth += 1;
        let mut result = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            ctx.variables.insert("loop_item".to_string(), item.clone());
            ctx.variables.insert("loop_index".to_string(), Value::from(index));
            ctx.variables.insert(item_key.clone(), item);
            ctx.variables.insert(index_key.clone(), Value::from(index));

            result = self.run_steps(&spec.steps, ctx).await;
            if result.is_err() {
                break;
            }
        }
        ctx.loop_depth -= 1;

        // An enclosing loop gets its own iteration variables back.
        if let (Some(item), Some(index)) = (saved_item, saved_index) {
            ctx.variables.insert("loop_item".to_string(), item);
            ctx.variables.insert("loop_index".to_string(), index);
        }
        result
    }

    async fn execute_delay(&self, spec: &DelaySpec) -> Result<(), ExecutionError> {
        let duration = Duration::try_from_secs_f64(spec.duration_seconds).map_err(|e| {
            ExecutionError::InvalidBlueprint(format!(
                "invalid delay duration {}: {}",
                spec.duration_seconds, e
            ))
        })?;
        with_cancel(&self.cancel, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    async fn execute_agent_call(
        &mut self,
        spec: &AgentCallSpec,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ExecutionError> {
        let prompt = template::render(&spec.input_prompt, &ctx.variables);
        let response = with_cancel(&self.cancel, self.agents.invoke(&spec.agent_id, &prompt)).await?;
        if let Some(var) = &spec.output_variable {
            ctx.variables.insert(var.clone(), Value::String(response.content));
        }
        Ok(())
    }

    /// Append a log entry and persist the progress snapshot. Persistence
    /// failures are logged; they never fail the step.
    async fn record(
        &self,
        ctx: &mut ExecutionContext,
        step_id: &str,
        status: StepStatus,
        message: String,
        error: Option<String>,
    ) {
        ctx.log(step_id, status, message, error);
        if let Some(sink) = self.progress {
            if let Err(e) = sink.write_progress(&ctx.run_id, &ctx.progress_snapshot()).await {
                tracing::warn!("[Run {}] Failed to persist progress: {}", ctx.run_id, e);
            }
        }
    }
}

async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ExecutionError>
where
    F: Future<Output = Result<T, ExecutionError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
        result = fut => result,
    }
}

/// `items`, `{{items}}` and `{{ data.items }}` all name the same path.
fn loop_source_path(source: &str) -> &str {
    let trimmed = source.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn json_type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "nothing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
