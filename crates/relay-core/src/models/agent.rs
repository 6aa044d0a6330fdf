use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LLM_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// An LLM agent referenced by `ai_agent_call` steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Sent as the system message
    pub agent_rules: String,
    pub llm_provider: String,
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentDefinition {
    pub fn new(id: String, user_id: String, name: String, agent_rules: String, api_key: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            name,
            agent_rules,
            llm_provider: DEFAULT_LLM_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
            created_at: now,
            updated_at: now,
        }
    }
}
