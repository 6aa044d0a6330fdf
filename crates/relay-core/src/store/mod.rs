pub mod agent_store;
pub mod automation_store;
pub mod credential_store;
pub mod run_store;

pub use agent_store::AgentStore;
pub use automation_store::AutomationStore;
pub use credential_store::CredentialStore;
pub use run_store::RunStore;

use chrono::{DateTime, Utc};

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
