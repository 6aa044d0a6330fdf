use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blueprint::Blueprint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AutomationStatus {
    Active,
    Paused,
}

impl AutomationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "paused" => Self::Paused,
            _ => Self::Active,
        }
    }
}

/// A stored blueprint owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub blueprint: Blueprint,
    pub status: AutomationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    pub fn new(id: String, user_id: String, name: String, blueprint: Blueprint) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            name,
            blueprint,
            status: AutomationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
