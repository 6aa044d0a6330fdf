//! Credential decoding and per-run credential index.
//!
//! Stored payloads are base64 (standard alphabet) of a JSON object. Values
//! are flattened to strings: scalars as their text, nested values as
//! compact JSON. `null` fields are dropped.

use std::collections::HashMap;

use base64::Engine;
use serde_json::{Map, Value};

use crate::error::ExecutionError;
use crate::integration::{Credentials, PlatformId};
use crate::workflow::CredentialSource;

/// Decoded credentials keyed by platform.
pub type CredentialIndex = HashMap<PlatformId, Credentials>;

pub fn encode_credential(data: &Map<String, Value>) -> String {
    base64::engine::general_purpose::STANDARD.encode(Value::Object(data.clone()).to_string())
}

pub fn decode_credential(encoded: &str) -> Result<Credentials, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64: {}", e))?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON: {}", e))?;
    let Value::Object(map) = value else {
        return Err("credential payload is not a JSON object".to_string());
    };

    Ok(map
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect())
}

/// Load and decode every active credential for an automation and user.
///
/// A record that fails to decode is logged and skipped; the run proceeds and
/// fails later only if a step actually needs that platform.
pub async fn load_credentials(
    source: &dyn CredentialSource,
    automation_id: &str,
    user_id: &str,
) -> Result<CredentialIndex, ExecutionError> {
    let records = source.active_credentials(automation_id, user_id).await?;
    let mut index = CredentialIndex::new();

    for record in records {
        let platform = match PlatformId::parse(&record.platform) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("[Credentials] Skipping credential {}: {}", record.id, e);
                continue;
            }
        };
        match decode_credential(&record.encoded_data) {
            Ok(creds) => {
                index.insert(platform, creds);
            }
            Err(e) => {
                tracing::warn!(
                    "[Credentials] Failed to decode credential {} for '{}': {}",
                    record.id,
                    platform,
                    e
                );
            }
        }
    }

    tracing::debug!(
        "[Credentials] Loaded {} platform(s) for automation {}",
        index.len(),
        automation_id
    );
    Ok(index)
}
