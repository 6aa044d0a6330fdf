//! `relay credential` - Store platform credentials.

use relay_core::integration::PlatformId;
use relay_core::models::credential::CredentialRecord;
use relay_core::state::AppState;
use relay_core::workflow::encode_credential;

use super::{parse_json_object, print_json};

pub async fn add(
    state: &AppState,
    automation_id: &str,
    user_id: &str,
    platform: &str,
    data: &str,
) -> Result<(), String> {
    let platform = PlatformId::parse(platform).map_err(|e| e.to_string())?;
    let fields = parse_json_object(data, "credential data")?;

    let record = CredentialRecord::new(
        uuid::Uuid::new_v4().to_string(),
        automation_id.to_string(),
        user_id.to_string(),
        platform.to_string(),
        encode_credential(&fields),
    );
    state
        .credential_store
        .save(&record)
        .await
        .map_err(|e| e.to_string())?;

    // Field names only; values are secrets
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    print_json(&serde_json::json!({
        "credentialId": record.id,
        "platform": record.platform,
        "fields": keys,
    }));
    Ok(())
}
