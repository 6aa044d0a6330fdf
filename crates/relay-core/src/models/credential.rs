use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored credential payload for one platform.
///
/// `encoded_data` is base64 of a JSON object; see
/// [`crate::workflow::credentials::encode_credential`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub automation_id: String,
    pub user_id: String,
    pub platform: String,
    pub encoded_data: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(
        id: String,
        automation_id: String,
        user_id: String,
        platform: String,
        encoded_data: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            automation_id,
            user_id,
            platform,
            encoded_data,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
