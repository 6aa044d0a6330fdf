//! Platform identity and resolved platform configuration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Name of the endpoint every fallback config exposes, and the endpoint
/// used when a requested one is absent.
pub const UNIVERSAL_CALL: &str = "universal_call";

/// Validated, lower-cased platform identifier.
///
/// Credential lookups and discovery caching are keyed by this type so that
/// `"Slack"`, `" slack "` and `"slack"` always meet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    pub fn parse(name: &str) -> Result<Self, ExecutionError> {
        let normalized = name.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ExecutionError::InvalidPlatform("empty platform name".to_string()));
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ExecutionError::InvalidPlatform(format!(
                "'{}' contains {:?}",
                name, bad
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlatformId {
    type Error = ExecutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlatformId> for String {
    fn from(id: PlatformId) -> Self {
        id.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    Bearer,
    ApiKey,
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthLocation {
    #[default]
    Header,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub location: AuthLocation,
    /// Header or query parameter name
    pub parameter_name: String,
    /// Value template, e.g. `Bearer {token}`
    pub format: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::bearer()
    }
}

impl AuthConfig {
    /// `Authorization: Bearer {token}` - used whenever nothing better is known.
    pub fn bearer() -> Self {
        Self {
            auth_type: AuthType::Bearer,
            location: AuthLocation::Header,
            parameter_name: "Authorization".to_string(),
            format: "Bearer {token}".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Upper-case HTTP method
    pub method: String,
    /// Path relative to the base URL; may contain `{param}` placeholders
    pub path: String,
    #[serde(default)]
    pub required_params: Vec<String>,
    #[serde(default)]
    pub optional_params: Vec<String>,
}

/// Where a [`PlatformConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Discovered,
    #[default]
    Fallback,
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub base_url: String,
    pub auth_config: AuthConfig,
    pub endpoints: BTreeMap<String, EndpointSpec>,
    #[serde(default)]
    pub source: ConfigSource,
}

impl PlatformConfig {
    /// The always-usable config returned when discovery finds nothing.
    pub fn fallback(platform: &PlatformId) -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            UNIVERSAL_CALL.to_string(),
            EndpointSpec {
                method: "POST".to_string(),
                path: "/api/v1/execute".to_string(),
                required_params: Vec::new(),
                optional_params: Vec::new(),
            },
        );
        Self {
            name: platform.to_string(),
            base_url: format!("https://api.{}.com", platform),
            auth_config: AuthConfig::bearer(),
            endpoints,
            source: ConfigSource::Fallback,
        }
    }

    /// Look up an endpoint, falling back to `universal_call`.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointSpec> {
        self.endpoints
            .get(name)
            .or_else(|| self.endpoints.get(UNIVERSAL_CALL))
    }
}

/// Operator-supplied platform configs that take precedence over discovery.
#[derive(Debug, Clone, Default)]
pub struct PlatformCatalog {
    entries: HashMap<PlatformId, PlatformConfig>,
}

impl PlatformCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, platform: PlatformId, mut config: PlatformConfig) {
        config.source = ConfigSource::Catalog;
        self.entries.insert(platform, config);
    }

    pub fn get(&self, platform: &PlatformId) -> Option<&PlatformConfig> {
        self.entries.get(platform)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a catalog from a JSON file mapping platform name → config.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read platform catalog '{}': {}", path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let raw: HashMap<String, PlatformConfig> = serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse platform catalog: {}", e))?;
        let mut catalog = Self::new();
        for (name, config) in raw {
            let id = PlatformId::parse(&name).map_err(|e| e.to_string())?;
            catalog.insert(id, config);
        }
        Ok(catalog)
    }
}
