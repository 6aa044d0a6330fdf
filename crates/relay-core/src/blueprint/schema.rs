//! Schema types for blueprint definitions.
//!
//! On the wire a step is a flat object carrying a `type` tag plus exactly one
//! payload key named after that tag. In memory it is a [`Step`] whose
//! [`StepKind`] holds the payload, so the interpreter matches exhaustively.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExecutionError;

/// Step `type` tags understood by the interpreter.
pub const STEP_TYPES: [&str; 5] = ["action", "condition", "loop", "delay", "ai_agent_call"];

/// Top-level blueprint definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Ordered list of top-level steps
    pub steps: Vec<Step>,

    /// Initial variables, visible to every step
    #[serde(default)]
    pub variables: Map<String, Value>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// How the automation is triggered. Interpreted upstream; carried for completeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type", default = "default_trigger_type")]
    pub trigger_type: String,

    #[serde(default)]
    pub config: Value,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_type: default_trigger_type(),
            config: Value::Null,
        }
    }
}

fn default_trigger_type() -> String {
    "manual".to_string()
}

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum OnError {
    /// Abort the whole run (default, and the meaning of any unrecognized value)
    #[default]
    Stop,
    /// Log the failure and proceed with the next step
    Continue,
    /// Execute the step body exactly once more
    Retry,
}

impl From<String> for OnError {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => OnError::Continue,
            "retry" => OnError::Retry,
            _ => OnError::Stop,
        }
    }
}

/// A single step of a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct Step {
    pub id: String,
    pub name: String,
    pub on_error: OnError,
    pub kind: StepKind,
}

#[derive(Debug, Clone)]
pub enum StepKind {
    Action(ActionSpec),
    Condition(ConditionSpec),
    Loop(LoopSpec),
    Delay(DelaySpec),
    AiAgentCall(AgentCallSpec),
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Action(_) => "action",
            StepKind::Condition(_) => "condition",
            StepKind::Loop(_) => "loop",
            StepKind::Delay(_) => "delay",
            StepKind::AiAgentCall(_) => "ai_agent_call",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Platform name, e.g. "slack"
    pub integration: String,
    /// Endpoint name within the platform's endpoint map
    pub method: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, alias = "outputVariable", skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub expression: String,
    #[serde(default, alias = "ifTrue")]
    pub if_true: Vec<Step>,
    #[serde(default, alias = "ifFalse", skip_serializing_if = "Option::is_none")]
    pub if_false: Option<Vec<Step>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    /// Variable reference: `items`, `{{items}}` or a dotted path
    #[serde(alias = "arraySource")]
    pub array_source: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelaySpec {
    #[serde(alias = "durationSeconds")]
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCallSpec {
    #[serde(alias = "agentId")]
    pub agent_id: String,
    #[serde(alias = "inputPrompt")]
    pub input_prompt: String,
    #[serde(default, alias = "outputVariable", skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
}

/// Wire form of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default, alias = "onError")]
    on_error: OnError,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<ActionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<ConditionSpec>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    loop_spec: Option<LoopSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay: Option<DelaySpec>,
    #[serde(default, alias = "aiAgentCall", skip_serializing_if = "Option::is_none")]
    ai_agent_call: Option<AgentCallSpec>,
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let missing = |key: &str| format!("step '{}' has type '{}' but no '{}' payload", raw.id, key, key);
        let kind = match raw.step_type.as_str() {
            "action" => StepKind::Action(raw.action.clone().ok_or_else(|| missing("action"))?),
            "condition" => StepKind::Condition(raw.condition.clone().ok_or_else(|| missing("condition"))?),
            "loop" => StepKind::Loop(raw.loop_spec.clone().ok_or_else(|| missing("loop"))?),
            "delay" => StepKind::Delay(raw.delay.clone().ok_or_else(|| missing("delay"))?),
            "ai_agent_call" => {
                StepKind::AiAgentCall(raw.ai_agent_call.clone().ok_or_else(|| missing("ai_agent_call"))?)
            }
            other => return Err(format!("Unknown step type: {}", other)),
        };

        Ok(Step {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            on_error: raw.on_error,
            kind,
        })
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        let mut raw = RawStep {
            id: step.id,
            name: Some(step.name),
            step_type: step.kind.type_name().to_string(),
            on_error: step.on_error,
            action: None,
            condition: None,
            loop_spec: None,
            delay: None,
            ai_agent_call: None,
        };
        match step.kind {
            StepKind::Action(a) => raw.action = Some(a),
            StepKind::Condition(c) => raw.condition = Some(c),
            StepKind::Loop(l) => raw.loop_spec = Some(l),
            StepKind::Delay(d) => raw.delay = Some(d),
            StepKind::AiAgentCall(c) => raw.ai_agent_call = Some(c),
        }
        raw
    }
}

impl Blueprint {
    /// Parse and validate a blueprint from a JSON value.
    ///
    /// Unrecognized step types anywhere in the tree are reported as
    /// [`ExecutionError::UnknownStepType`]; other shape errors as
    /// [`ExecutionError::InvalidBlueprint`].
    pub fn from_value(value: Value) -> Result<Self, ExecutionError> {
        if let Some(unknown) = find_unknown_step_type(&value) {
            return Err(ExecutionError::UnknownStepType(unknown));
        }
        let blueprint: Blueprint = serde_json::from_value(value)
            .map_err(|e| ExecutionError::InvalidBlueprint(e.to_string()))?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Parse a blueprint from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ExecutionError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ExecutionError::InvalidBlueprint(format!("Failed to parse blueprint JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Load a blueprint from a file path.
    pub fn from_file(path: &str) -> Result<Self, ExecutionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExecutionError::InvalidBlueprint(format!("Failed to read blueprint file '{}': {}", path, e))
        })?;
        Self::from_json(&content)
    }

    /// Check structural invariants: step ids unique within each list, and
    /// delay durations finite and non-negative.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        validate_steps(&self.steps, "steps")
    }

    /// Total number of steps, counting nested bodies.
    pub fn step_count(&self) -> usize {
        count_steps(&self.steps)
    }
}

/// Longest pause a `delay` step may request (30 days).
pub const MAX_DELAY_SECONDS: f64 = 30.0 * 24.0 * 60.0 * 60.0;

fn validate_steps(steps: &[Step], list: &str) -> Result<(), ExecutionError> {
    let mut seen = HashSet::new();
    for step in steps {
        if step.id.trim().is_empty() {
            return Err(ExecutionError::InvalidBlueprint(format!("empty step id in {}", list)));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(ExecutionError::InvalidBlueprint(format!(
                "duplicate step id '{}' in {}",
                step.id, list
            )));
        }
        match &step.kind {
            StepKind::Condition(c) => {
                validate_steps(&c.if_true, &format!("{}.if_true", step.id))?;
                if let Some(if_false) = &c.if_false {
                    validate_steps(if_false, &format!("{}.if_false", step.id))?;
                }
            }
            StepKind::Loop(l) => validate_steps(&l.steps, &format!("{}.steps", step.id))?,
            StepKind::Delay(d) => {
                if !d.duration_seconds.is_finite()
                    || d.duration_seconds < 0.0
                    || d.duration_seconds > MAX_DELAY_SECONDS
                {
                    return Err(ExecutionError::InvalidBlueprint(format!(
                        "step '{}' has invalid delay duration {} (allowed 0..={})",
                        step.id, d.duration_seconds, MAX_DELAY_SECONDS
                    )));
                }
            }
            StepKind::Action(_) | StepKind::AiAgentCall(_) => {}
        }
    }
    Ok(())
}

fn count_steps(steps: &[Step]) -> usize {
    steps
        .iter()
        .map(|step| {
            1 + match &step.kind {
                StepKind::Condition(c) => {
                    count_steps(&c.if_true) + c.if_false.as_deref().map(count_steps).unwrap_or(0)
                }
                StepKind::Loop(l) => count_steps(&l.steps),
                _ => 0,
            }
        })
        .sum()
}

/// Walk the raw JSON tree and return the first step `type` the interpreter
/// does not know.
fn find_unknown_step_type(value: &Value) -> Option<String> {
    fn walk_list(steps: Option<&Value>) -> Option<String> {
        steps?.as_array()?.iter().find_map(walk_step)
    }

    fn walk_step(step: &Value) -> Option<String> {
        let step_type = step.get("type").and_then(Value::as_str)?;
        if !STEP_TYPES.contains(&step_type) {
            return Some(step_type.to_string());
        }
        let condition = step.get("condition");
        walk_list(condition.and_then(|c| c.get("if_true").or_else(|| c.get("ifTrue"))))
            .or_else(|| walk_list(condition.and_then(|c| c.get("if_false").or_else(|| c.get("ifFalse")))))
            .or_else(|| walk_list(step.get("loop").and_then(|l| l.get("steps"))))
    }

    walk_list(value.get("steps"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_blueprint() {
        let bp = Blueprint::from_value(json!({
            "steps": [
                { "id": "wait", "type": "delay", "delay": { "duration_seconds": 1 } }
            ]
        }))
        .unwrap();
        assert_eq!(bp.version, "1.0");
        assert_eq!(bp.trigger.trigger_type, "manual");
        assert_eq!(bp.steps.len(), 1);
        assert_eq!(bp.steps[0].name, "wait");
        assert_eq!(bp.steps[0].on_error, OnError::Stop);
        assert!(matches!(bp.steps[0].kind, StepKind::Delay(_)));
    }

    #[test]
    fn test_parse_nested_blueprint() {
        let bp = Blueprint::from_value(json!({
            "version": "2.0",
            "description": "nested",
            "variables": { "items": [1, 2] },
            "steps": [
                {
                    "id": "each", "name": "Each item", "type": "loop", "on_error": "continue",
                    "loop": {
                        "array_source": "{{items}}",
                        "steps": [
                            {
                                "id": "check", "type": "condition",
                                "condition": {
                                    "expression": "loop_item > 1",
                                    "if_true": [
                                        {
                                            "id": "ask", "type": "ai_agent_call", "onError": "retry",
                                            "ai_agent_call": { "agent_id": "a1", "input_prompt": "hi {{loop_item}}" }
                                        }
                                    ]
                                }
                            }
                        ]
                    }
                }
            ]
        }))
        .unwrap();

        assert_eq!(bp.step_count(), 3);
        assert_eq!(bp.steps[0].on_error, OnError::Continue);
        let StepKind::Loop(l) = &bp.steps[0].kind else {
            panic!("expected loop");
        };
        let StepKind::Condition(c) = &l.steps[0].kind else {
            panic!("expected condition");
        };
        assert!(c.if_false.is_none());
        assert_eq!(c.if_true[0].on_error, OnError::Retry);
    }

    #[test]
    fn test_unrecognized_on_error_means_stop() {
        let bp = Blueprint::from_value(json!({
            "steps": [
                { "id": "w", "type": "delay", "on_error": "explode", "delay": { "duration_seconds": 0 } }
            ]
        }))
        .unwrap();
        assert_eq!(bp.steps[0].on_error, OnError::Stop);
    }

    #[test]
    fn test_unknown_step_type_is_reported() {
        let err = Blueprint::from_value(json!({
            "steps": [
                {
                    "id": "c", "type": "condition",
                    "condition": {
                        "expression": "true",
                        "if_true": [ { "id": "x", "type": "teleport" } ]
                    }
                }
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownStepType(t) if t == "teleport"));
    }

    #[test]
    fn test_missing_payload_is_invalid() {
        let err = Blueprint::from_value(json!({
            "steps": [ { "id": "a", "type": "action" } ]
        }))
        .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidBlueprint(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected_per_list() {
        let err = Blueprint::from_value(json!({
            "steps": [
                { "id": "a", "type": "delay", "delay": { "duration_seconds": 0 } },
                { "id": "a", "type": "delay", "delay": { "duration_seconds": 0 } }
            ]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("duplicate step id 'a'"));

        // The same id in different lists is fine.
        Blueprint::from_value(json!({
            "steps": [
                {
                    "id": "a", "type": "loop",
                    "loop": {
                        "array_source": "xs",
                        "steps": [ { "id": "a", "type": "delay", "delay": { "duration_seconds": 0 } } ]
                    }
                }
            ]
        }))
        .unwrap();
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = Blueprint::from_value(json!({
            "steps": [ { "id": "d", "type": "delay", "delay": { "duration_seconds": -1 } } ]
        }))
        .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidBlueprint(_)));
    }

    #[test]
    fn test_oversized_delay_rejected() {
        let err = Blueprint::from_value(json!({
            "steps": [ { "id": "d", "type": "delay", "delay": { "duration_seconds": 1e20 } } ]
        }))
        .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidBlueprint(ref m) if m.contains("'d'")));

        assert!(Blueprint::from_value(json!({
            "steps": [ { "id": "d", "type": "delay", "delay": { "duration_seconds": MAX_DELAY_SECONDS } } ]
        }))
        .is_ok());
    }

    #[test]
    fn test_serialize_keeps_wire_shape() {
        let bp = Blueprint::from_value(json!({
            "steps": [
                {
                    "id": "send", "name": "Send", "type": "action",
                    "action": { "integration": "slack", "method": "post_message", "output_variable": "sent" }
                }
            ]
        }))
        .unwrap();
        let value = serde_json::to_value(&bp).unwrap();
        assert_eq!(value["steps"][0]["type"], "action");
        assert_eq!(value["steps"][0]["on_error"], "stop");
        assert_eq!(value["steps"][0]["action"]["output_variable"], "sent");
        assert!(value["steps"][0].get("loop").is_none());
    }
}
