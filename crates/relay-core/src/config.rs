//! Engine configuration.
//!
//! Every network call the engine makes carries one of these timeouts.
//! Values come from `Default` or, for deployed binaries, from `RELAY_*`
//! environment variables via [`EngineConfig::from_env`].

use std::time::Duration;

/// Conventional OpenAPI/Swagger locations probed during platform discovery,
/// in order. `{platform}` is replaced by the lower-cased platform name.
pub const DEFAULT_PROBE_TEMPLATES: [&str; 4] = [
    "https://api.{platform}.com/openapi.json",
    "https://api.{platform}.com/swagger.json",
    "https://{platform}.com/api/docs/openapi.json",
    "https://developers.{platform}.com/openapi.json",
];

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for each discovery probe.
    pub probe_timeout: Duration,
    /// Timeout for each platform API call.
    pub request_timeout: Duration,
    /// Timeout for each LLM completion call.
    pub llm_timeout: Duration,
    /// `User-Agent` sent on every outbound platform call.
    pub user_agent: String,
    /// Discovery probe URL templates, tried in order.
    pub probe_templates: Vec<String>,
    /// Base URL of the OpenAI-compatible chat completions API.
    pub openai_base_url: String,
    /// Error bodies are truncated to this many characters.
    pub error_body_limit: usize,
    /// Drop parameters consumed by `{param}` path placeholders from
    /// POST/PUT/PATCH bodies.
    pub exclude_path_params_from_body: bool,
    /// When set, discovered platform configs are shared across runs for this long.
    pub discovery_cache_ttl: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(60),
            user_agent: format!("relay-engine/{}", env!("CARGO_PKG_VERSION")),
            probe_templates: DEFAULT_PROBE_TEMPLATES.iter().map(|t| t.to_string()).collect(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            error_body_limit: 1000,
            exclude_path_params_from_body: true,
            discovery_cache_ttl: None,
        }
    }
}

impl EngineConfig {
    /// Build a config from `RELAY_*` environment variables, falling back to defaults.
    ///
    /// - `RELAY_PROBE_TIMEOUT_SECS`, `RELAY_REQUEST_TIMEOUT_SECS`, `RELAY_LLM_TIMEOUT_SECS`
    /// - `RELAY_OPENAI_BASE_URL`
    /// - `RELAY_PROBE_TEMPLATES` (comma-separated)
    /// - `RELAY_INCLUDE_PATH_PARAMS_IN_BODY` (`true` restores duplicate path params)
    /// - `RELAY_DISCOVERY_CACHE_TTL_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("RELAY_PROBE_TIMEOUT_SECS") {
            config.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("RELAY_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("RELAY_LLM_TIMEOUT_SECS") {
            config.llm_timeout = Duration::from_secs(secs);
        }
        if let Ok(url) = std::env::var("RELAY_OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                config.openai_base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(templates) = std::env::var("RELAY_PROBE_TEMPLATES") {
            let parsed: Vec<String> = templates
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.probe_templates = parsed;
            }
        }
        if let Ok(flag) = std::env::var("RELAY_INCLUDE_PATH_PARAMS_IN_BODY") {
            config.exclude_path_params_from_body = !matches!(flag.as_str(), "1" | "true" | "yes");
        }
        config.discovery_cache_ttl = env_u64("RELAY_DISCOVERY_CACHE_TTL_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring {}={:?}: not a non-negative integer", key, raw);
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_bounded() {
        let config = EngineConfig::default();
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_templates.len(), 4);
        assert!(config.exclude_path_params_from_body);
        assert!(config.discovery_cache_ttl.is_none());
        assert!(config.user_agent.starts_with("relay-engine/"));
    }
}
