use chrono::Utc;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::credential::CredentialRecord;

pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, record: &CredentialRecord) -> Result<(), ServerError> {
        let c = record.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO credentials (id, automation_id, user_id, platform, encoded_data, is_active,
                     created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                       platform = excluded.platform,
                       encoded_data = excluded.encoded_data,
                       is_active = excluded.is_active,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        c.id,
                        c.automation_id,
                        c.user_id,
                        c.platform,
                        c.encoded_data,
                        c.is_active as i32,
                        c.created_at.timestamp_millis(),
                        Utc::now().timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Active credentials for one automation and user, oldest first.
    pub async fn list_active(
        &self,
        automation_id: &str,
        user_id: &str,
    ) -> Result<Vec<CredentialRecord>, ServerError> {
        let automation_id = automation_id.to_string();
        let user_id = user_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, automation_id, user_id, platform, encoded_data, is_active, created_at, updated_at
                     FROM credentials WHERE automation_id = ?1 AND user_id = ?2 AND is_active = 1
                     ORDER BY created_at ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![automation_id, user_id], |row| {
                        Ok(row_to_credential(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn deactivate(&self, id: &str) -> Result<(), ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE credentials SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![Utc::now().timestamp_millis(), id],
                )?;
                Ok(())
            })
            .await
    }
}

fn row_to_credential(row: &rusqlite::Row<'_>) -> CredentialRecord {
    CredentialRecord {
        id: row.get(0).unwrap_or_default(),
        automation_id: row.get(1).unwrap_or_default(),
        user_id: row.get(2).unwrap_or_default(),
        platform: row.get(3).unwrap_or_default(),
        encoded_data: row.get(4).unwrap_or_default(),
        is_active: row.get::<_, i32>(5).unwrap_or(0) != 0,
        created_at: super::from_millis(row.get(6).unwrap_or(0)),
        updated_at: super::from_millis(row.get(7).unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_active_scoped_and_filtered() {
        let store = CredentialStore::new(Database::open_in_memory().unwrap());
        let rec = |id: &str, automation: &str, user: &str| {
            CredentialRecord::new(id.into(), automation.into(), user.into(), "slack".into(), "e30=".into())
        };
        store.save(&rec("c1", "a1", "u1")).await.unwrap();
        store.save(&rec("c2", "a1", "u2")).await.unwrap();
        store.save(&rec("c3", "a1", "u1")).await.unwrap();
        store.deactivate("c3").await.unwrap();

        let active = store.list_active("a1", "u1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "c1");
        assert!(active[0].is_active);
    }
}
