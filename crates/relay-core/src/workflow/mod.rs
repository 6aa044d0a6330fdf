//! Blueprint execution.
//!
//! ```text
//! InvocationRequest ──► runner::invoke
//!                         │ load automation, create run, load credentials
//!                         ▼
//!                  StepInterpreter ──► UniversalApiCaller / AgentCaller
//!                         │
//!                         ▼ after every step transition
//!                    ProgressSink (run progress snapshot)
//! ```
//!
//! The interpreter reaches its stores only through the narrow traits below,
//! so tests can drive it with in-memory doubles.

pub mod agent_caller;
pub mod context;
pub mod credentials;
pub mod executor;
pub mod runner;

pub use agent_caller::AgentCaller;
pub use context::ExecutionContext;
pub use credentials::{decode_credential, encode_credential, load_credentials, CredentialIndex};
pub use executor::StepInterpreter;
pub use runner::{invoke, invoke_with_cancel, InvocationOutcome, InvocationRequest};

use async_trait::async_trait;

use crate::error::ServerError;
use crate::models::agent::AgentDefinition;
use crate::models::credential::CredentialRecord;
use crate::models::run::RunProgress;
use crate::store::{AgentStore, CredentialStore, RunStore};

/// Receives a full progress snapshot after every step transition.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn write_progress(&self, run_id: &str, progress: &RunProgress) -> Result<(), ServerError>;
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn active_credentials(
        &self,
        automation_id: &str,
        user_id: &str,
    ) -> Result<Vec<CredentialRecord>, ServerError>;
}

#[async_trait]
pub trait AgentSource: Send + Sync {
    async fn load_agent(&self, agent_id: &str) -> Result<Option<AgentDefinition>, ServerError>;
}

#[async_trait]
impl ProgressSink for RunStore {
    async fn write_progress(&self, run_id: &str, progress: &RunProgress) -> Result<(), ServerError> {
        RunStore::write_progress(self, run_id, progress).await
    }
}

#[async_trait]
impl CredentialSource for CredentialStore {
    async fn active_credentials(
        &self,
        automation_id: &str,
        user_id: &str,
    ) -> Result<Vec<CredentialRecord>, ServerError> {
        self.list_active(automation_id, user_id).await
    }
}

#[async_trait]
impl AgentSource for AgentStore {
    async fn load_agent(&self, agent_id: &str) -> Result<Option<AgentDefinition>, ServerError> {
        self.get(agent_id).await
    }
}
