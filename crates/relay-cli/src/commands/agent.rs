//! `relay agent` - Register and list LLM agents.

use relay_core::models::agent::AgentDefinition;
use relay_core::state::AppState;

use super::print_json;

pub struct NewAgent<'a> {
    pub id: Option<&'a str>,
    pub user_id: &'a str,
    pub name: &'a str,
    pub rules: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub provider: &'a str,
}

pub async fn add(state: &AppState, input: NewAgent<'_>) -> Result<(), String> {
    let mut agent = AgentDefinition::new(
        input
            .id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        input.user_id.to_string(),
        input.name.to_string(),
        input.rules.to_string(),
        input.api_key.to_string(),
    );
    agent.model = input.model.to_string();
    agent.llm_provider = input.provider.trim().to_ascii_lowercase();

    if agent.llm_provider != "openai" {
        eprintln!(
            "Warning: provider '{}' is not supported; ai_agent_call steps using this agent will fail",
            agent.llm_provider
        );
    }

    state.agent_store.save(&agent).await.map_err(|e| e.to_string())?;
    print_json(&serde_json::to_value(&agent).map_err(|e| e.to_string())?);
    Ok(())
}

pub async fn list(state: &AppState, user_id: &str) -> Result<(), String> {
    let agents = state
        .agent_store
        .list_by_user(user_id)
        .await
        .map_err(|e| e.to_string())?;
    print_json(&serde_json::json!({ "agents": agents }));
    Ok(())
}
