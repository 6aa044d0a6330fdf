use chrono::Utc;
use rusqlite::OptionalExtension;
use serde_json::Value;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::run::{AutomationRun, RunProgress, RunStatus};

pub struct RunStore {
    db: Database,
}

impl RunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, run: &AutomationRun) -> Result<(), ServerError> {
        let r = run.clone();
        let trigger = r.trigger_data.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO automation_runs (id, automation_id, user_id, status, trigger_data, started_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        r.id,
                        r.automation_id,
                        r.user_id,
                        r.status.as_str(),
                        trigger,
                        r.started_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Replace the run's progress snapshot.
    pub async fn write_progress(&self, run_id: &str, progress: &RunProgress) -> Result<(), ServerError> {
        let id = run_id.to_string();
        let json = serde_json::to_string(progress)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize progress: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE automation_runs SET progress = ?1 WHERE id = ?2",
                    rusqlite::params![json, id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn complete(&self, run_id: &str, result: &Value) -> Result<(), ServerError> {
        self.finish(run_id, RunStatus::Completed, Some(result.to_string()), None)
            .await
    }

    pub async fn fail(&self, run_id: &str, error: &str) -> Result<(), ServerError> {
        self.finish(run_id, RunStatus::Failed, None, Some(error.to_string()))
            .await
    }

    async fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Result<(), ServerError> {
        let id = run_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE automation_runs SET status = ?1, result = ?2, error = ?3, completed_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![
                        status.as_str(),
                        result,
                        error,
                        Utc::now().timestamp_millis(),
                        id
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, run_id: &str) -> Result<Option<AutomationRun>, ServerError> {
        let id = run_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, automation_id, user_id, status, trigger_data, progress, result, error,
                     started_at, completed_at
                     FROM automation_runs WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_run(row)))
                    .optional()
            })
            .await
    }

    pub async fn list_by_automation(&self, automation_id: &str) -> Result<Vec<AutomationRun>, ServerError> {
        let id = automation_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, automation_id, user_id, status, trigger_data, progress, result, error,
                     started_at, completed_at
                     FROM automation_runs WHERE automation_id = ?1 ORDER BY started_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_run(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

/// Column order: id(0), automation_id(1), user_id(2), status(3), trigger_data(4),
///               progress(5), result(6), error(7), started_at(8), completed_at(9)
fn row_to_run(row: &rusqlite::Row<'_>) -> AutomationRun {
    let json_col = |idx: usize| -> Option<String> { row.get::<_, Option<String>>(idx).unwrap_or(None) };

    AutomationRun {
        id: row.get(0).unwrap_or_default(),
        automation_id: row.get(1).unwrap_or_default(),
        user_id: row.get(2).unwrap_or_default(),
        status: RunStatus::from_str(&row.get::<_, String>(3).unwrap_or_default()),
        trigger_data: json_col(4)
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(Value::Null),
        progress: json_col(5).and_then(|s| serde_json::from_str(&s).ok()),
        result: json_col(6).and_then(|s| serde_json::from_str(&s).ok()),
        error: json_col(7),
        started_at: super::from_millis(row.get(8).unwrap_or(0)),
        completed_at: row
            .get::<_, Option<i64>>(9)
            .unwrap_or(None)
            .map(super::from_millis),
    }
}
