use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::run::{RunProgress, StepLogEntry, StepStatus};

/// Mutable state of one run, threaded by `&mut` through the interpreter.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub automation_id: String,
    pub user_id: String,
    pub variables: Map<String, Value>,
    /// Index of the top-level step being executed
    pub step_index: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
    pub logs: Vec<StepLogEntry>,
    /// Number of loops currently being iterated
    pub(crate) loop_depth: usize,
}

impl ExecutionContext {
    pub fn new(
        run_id: String,
        automation_id: String,
        user_id: String,
        variables: Map<String, Value>,
        total_steps: usize,
    ) -> Self {
        Self {
            run_id,
            automation_id,
            user_id,
            variables,
            step_index: 0,
            total_steps,
            started_at: Utc::now(),
            logs: Vec::new(),
            loop_depth: 0,
        }
    }

    pub fn log(&mut self, step_id: &str, status: StepStatus, message: String, error: Option<String>) {
        self.logs.push(StepLogEntry {
            step_id: step_id.to_string(),
            status,
            timestamp: Utc::now(),
            message,
            error,
        });
    }

    pub fn progress_snapshot(&self) -> RunProgress {
        RunProgress {
            started_at: self.started_at,
            current_step: self.step_index,
            total_steps: self.total_steps,
            logs: self.logs.clone(),
            variables: self.variables.clone(),
        }
    }
}
