use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::agent::AgentDefinition;

pub struct AgentStore {
    db: Database,
}

impl AgentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, agent: &AgentDefinition) -> Result<(), ServerError> {
        let a = agent.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO agents (id, user_id, name, agent_rules, llm_provider, model, api_key,
                     created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                       name = excluded.name,
                       agent_rules = excluded.agent_rules,
                       llm_provider = excluded.llm_provider,
                       model = excluded.model,
                       api_key = excluded.api_key,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        a.id,
                        a.user_id,
                        a.name,
                        a.agent_rules,
                        a.llm_provider,
                        a.model,
                        a.api_key,
                        a.created_at.timestamp_millis(),
                        Utc::now().timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<AgentDefinition>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, name, agent_rules, llm_provider, model, api_key, created_at, updated_at
                     FROM agents WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_agent(row)))
                    .optional()
            })
            .await
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<AgentDefinition>, ServerError> {
        let user_id = user_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, name, agent_rules, llm_provider, model, api_key, created_at, updated_at
                     FROM agents WHERE user_id = ?1 ORDER BY name ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id], |row| Ok(row_to_agent(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> AgentDefinition {
    AgentDefinition {
        id: row.get(0).unwrap_or_default(),
        user_id: row.get(1).unwrap_or_default(),
        name: row.get(2).unwrap_or_default(),
        agent_rules: row.get(3).unwrap_or_default(),
        llm_provider: row.get(4).unwrap_or_default(),
        model: row.get(5).unwrap_or_default(),
        api_key: row.get(6).unwrap_or_default(),
        created_at: super::from_millis(row.get(7).unwrap_or(0)),
        updated_at: super::from_millis(row.get(8).unwrap_or(0)),
    }
}
