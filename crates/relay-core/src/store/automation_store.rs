use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::blueprint::Blueprint;
use crate::db::Database;
use crate::error::ServerError;
use crate::models::automation::{Automation, AutomationStatus};

pub struct AutomationStore {
    db: Database,
}

impl AutomationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, automation: &Automation) -> Result<(), ServerError> {
        let a = automation.clone();
        let blueprint = serde_json::to_string(&a.blueprint)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize blueprint: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO automations (id, user_id, name, blueprint, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                       name = excluded.name,
                       blueprint = excluded.blueprint,
                       status = excluded.status,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        a.id,
                        a.user_id,
                        a.name,
                        blueprint,
                        a.status.as_str(),
                        a.created_at.timestamp_millis(),
                        Utc::now().timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Automation>, ServerError> {
        let id = id.to_string();
        let row = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, name, blueprint, status, created_at, updated_at
                     FROM automations WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], row_to_raw).optional()
            })
            .await?;
        row.map(RawAutomation::into_automation).transpose()
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Automation>, ServerError> {
        let user_id = user_id.to_string();
        let rows = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, name, blueprint, status, created_at, updated_at
                     FROM automations WHERE user_id = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id], row_to_raw)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(RawAutomation::into_automation).collect()
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute("DELETE FROM automations WHERE id = ?1", rusqlite::params![id])?;
                Ok(())
            })
            .await
    }
}

/// Row read before the stored blueprint JSON is parsed.
struct RawAutomation {
    id: String,
    user_id: String,
    name: String,
    blueprint: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl RawAutomation {
    fn into_automation(self) -> Result<Automation, ServerError> {
        let blueprint = Blueprint::from_json(&self.blueprint).map_err(|e| {
            ServerError::Internal(format!("Stored blueprint for automation {} is invalid: {}", self.id, e))
        })?;
        Ok(Automation {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            blueprint,
            status: AutomationStatus::from_str(&self.status),
            created_at: super::from_millis(self.created_at),
            updated_at: super::from_millis(self.updated_at),
        })
    }
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAutomation> {
    Ok(RawAutomation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        blueprint: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, user: &str) -> Automation {
        let blueprint = Blueprint::from_json(
            r#"{"steps":[{"id":"wait","type":"delay","delay":{"duration_seconds":0}}]}"#,
        )
        .unwrap();
        Automation::new(id.to_string(), user.to_string(), "Sample".to_string(), blueprint)
    }

    #[tokio::test]
    async fn test_save_get_and_list() {
        let store = AutomationStore::new(Database::open_in_memory().unwrap());
        store.save(&sample("a1", "u1")).await.unwrap();
        store.save(&sample("a2", "u2")).await.unwrap();

        let loaded = store.get("a1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.blueprint.steps[0].id, "wait");
        assert_eq!(store.list_by_user("u1").await.unwrap().len(), 1);
        assert!(store.get("missing").await.unwrap().is_none());

        store.delete("a1").await.unwrap();
        assert!(store.get("a1").await.unwrap().is_none());
    }
}
