//! `relay automation` - Import, validate and list blueprint automations.

use std::path::Path;

use relay_core::blueprint::{Blueprint, Step, StepKind};
use relay_core::models::automation::Automation;
use relay_core::state::AppState;

use super::print_json;

/// Validate a blueprint file without storing it.
pub fn validate(file: &str) -> Result<(), String> {
    let blueprint = Blueprint::from_file(file).map_err(|e| e.to_string())?;

    println!("✅ Blueprint '{}' is valid", file);
    println!("   Version: {}", blueprint.version);
    println!("   Trigger: {}", blueprint.trigger.trigger_type);
    println!(
        "   Steps: {} top-level, {} total",
        blueprint.steps.len(),
        blueprint.step_count()
    );
    print_steps(&blueprint.steps, 1);
    Ok(())
}

fn print_steps(steps: &[Step], depth: usize) {
    let indent = "   ".repeat(depth);
    for (i, step) in steps.iter().enumerate() {
        let detail = match &step.kind {
            StepKind::Action(a) => format!("{}.{}", a.integration, a.method),
            StepKind::Condition(c) => c.expression.clone(),
            StepKind::Loop(l) => format!("over {}", l.array_source),
            StepKind::Delay(d) => format!("{}s", d.duration_seconds),
            StepKind::AiAgentCall(c) => format!("agent {}", c.agent_id),
        };
        println!("{}{}. {} [{}] {}", indent, i + 1, step.id, step.kind.type_name(), detail);
        match &step.kind {
            StepKind::Condition(c) => {
                print_steps(&c.if_true, depth + 1);
                if let Some(if_false) = &c.if_false {
                    print_steps(if_false, depth + 1);
                }
            }
            StepKind::Loop(l) => print_steps(&l.steps, depth + 1),
            _ => {}
        }
    }
}

/// Import a blueprint file as an automation owned by `user_id`.
pub async fn import(
    state: &AppState,
    file: &str,
    user_id: &str,
    name: Option<&str>,
    id: Option<&str>,
) -> Result<(), String> {
    let blueprint = Blueprint::from_file(file).map_err(|e| e.to_string())?;
    let name = name.map(str::to_string).unwrap_or_else(|| {
        Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "automation".to_string())
    });
    let automation = Automation::new(
        id.map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        user_id.to_string(),
        name,
        blueprint,
    );

    state
        .automation_store
        .save(&automation)
        .await
        .map_err(|e| e.to_string())?;

    print_json(&serde_json::json!({
        "automationId": automation.id,
        "name": automation.name,
        "steps": automation.blueprint.steps.len(),
    }));
    Ok(())
}

pub async fn list(state: &AppState, user_id: &str) -> Result<(), String> {
    let automations = state
        .automation_store
        .list_by_user(user_id)
        .await
        .map_err(|e| e.to_string())?;
    let summary: Vec<serde_json::Value> = automations
        .iter()
        .map(|a| {
            serde_json::json!({
                "id": a.id,
                "name": a.name,
                "status": a.status.as_str(),
                "steps": a.blueprint.steps.len(),
            })
        })
        .collect();
    print_json(&serde_json::json!({ "automations": summary }));
    Ok(())
}
