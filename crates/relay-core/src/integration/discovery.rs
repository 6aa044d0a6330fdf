//! Platform discovery - resolve a platform name to a [`PlatformConfig`].
//!
//! Conventional OpenAPI/Swagger locations are probed in order; the first
//! `200` with a parseable JSON body wins. When every probe fails the
//! fallback config is returned. Discovery never fails.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::EngineConfig;
use crate::integration::platform::{
    AuthConfig, AuthLocation, AuthType, ConfigSource, EndpointSpec, PlatformConfig, PlatformId,
};

const HTTP_METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];

pub struct PlatformDiscovery {
    client: reqwest::Client,
    probe_templates: Vec<String>,
    probe_timeout: Duration,
}

impl PlatformDiscovery {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.probe_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            probe_templates: config.probe_templates.clone(),
            probe_timeout: config.probe_timeout,
        }
    }

    /// Probe URLs for a platform, in the order they are tried.
    pub fn probe_urls(&self, platform: &PlatformId) -> Vec<String> {
        self.probe_templates
            .iter()
            .map(|t| t.replace("{platform}", platform.as_str()))
            .collect()
    }

    /// Discover a platform's config. Falls back instead of failing.
    pub async fn discover(&self, platform: &PlatformId) -> PlatformConfig {
        for url in self.probe_urls(platform) {
            if let Some(spec) = self.probe(&url).await {
                tracing::info!("[Discovery] Found API spec for '{}' at {}", platform, url);
                return config_from_spec(platform, &spec, &url);
            }
        }
        tracing::info!(
            "[Discovery] No API spec found for '{}'; using fallback config",
            platform
        );
        PlatformConfig::fallback(platform)
    }

    async fn probe(&self, url: &str) -> Option<Value> {
        let response = match self.client.get(url).timeout(self.probe_timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("[Discovery] Probe {} failed: {}", url, e);
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!("[Discovery] Probe {} returned {}", url, response.status());
            return None;
        }
        match response.json::<Value>().await {
            Ok(spec) if spec.is_object() => Some(spec),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("[Discovery] Probe {} returned unparseable JSON: {}", url, e);
                None
            }
        }
    }
}

/// Derive a platform config from an OpenAPI 3 or Swagger 2 document fetched
/// from `spec_url`. Relative server URLs are resolved against `spec_url`.
pub fn config_from_spec(platform: &PlatformId, spec: &Value, spec_url: &str) -> PlatformConfig {
    let base_url = base_url_from_spec(spec, spec_url)
        .unwrap_or_else(|| format!("https://api.{}.com", platform));
    let auth_config = auth_from_spec(spec).unwrap_or_else(AuthConfig::bearer);
    let endpoints = endpoints_from_spec(spec);

    if endpoints.is_empty() {
        // A spec without paths still tells us where the API lives.
        let mut config = PlatformConfig::fallback(platform);
        config.base_url = base_url;
        config.auth_config = auth_config;
        config.source = ConfigSource::Discovered;
        return config;
    }

    PlatformConfig {
        name: platform.to_string(),
        base_url,
        auth_config,
        endpoints,
        source: ConfigSource::Discovered,
    }
}

fn base_url_from_spec(spec: &Value, spec_url: &str) -> Option<String> {
    if let Some(url) = spec
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    {
        return resolve_server_url(url.trim(), spec_url);
    }

    let host = spec.get("host").and_then(Value::as_str)?;
    let scheme = spec
        .get("schemes")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_str)
        .unwrap_or("https");
    let base_path = spec.get("basePath").and_then(Value::as_str).unwrap_or("");
    Some(format!("{}://{}{}", scheme, host, base_path).trim_end_matches('/').to_string())
}

/// Absolute server URLs are used as-is; relative ones (`/v1`, `api`) are
/// joined onto the URL the document was served from. Anything that still
/// isn't an http(s) URL is discarded.
fn resolve_server_url(url: &str, spec_url: &str) -> Option<String> {
    let resolved = match reqwest::Url::parse(url) {
        Ok(absolute) => absolute,
        Err(_) => reqwest::Url::parse(spec_url).ok()?.join(url).ok()?,
    };
    if !matches!(resolved.scheme(), "http" | "https") || resolved.host_str().is_none() {
        return None;
    }
    Some(resolved.as_str().trim_end_matches('/').to_string())
}

fn auth_from_spec(spec: &Value) -> Option<AuthConfig> {
    let schemes = spec
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| spec.get("securityDefinitions"))
        .and_then(Value::as_object)?;
    let (_, scheme) = schemes.iter().next()?;
    let kind = scheme.get("type").and_then(Value::as_str).unwrap_or_default();
    let http_scheme = scheme
        .get("scheme")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_lowercase();

    match kind {
        "apiKey" => {
            let location = match scheme.get("in").and_then(Value::as_str) {
                Some("query") => AuthLocation::Query,
                _ => AuthLocation::Header,
            };
            let name = scheme
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("X-API-Key")
                .to_string();
            Some(AuthConfig {
                auth_type: AuthType::ApiKey,
                location,
                parameter_name: name,
                format: "{api_key}".to_string(),
            })
        }
        "basic" => Some(basic_auth()),
        "http" if http_scheme == "basic" => Some(basic_auth()),
        _ => Some(AuthConfig::bearer()),
    }
}

fn basic_auth() -> AuthConfig {
    AuthConfig {
        auth_type: AuthType::Basic,
        location: AuthLocation::Header,
        parameter_name: "Authorization".to_string(),
        format: "Basic {credentials}".to_string(),
    }
}

fn endpoints_from_spec(spec: &Value) -> BTreeMap<String, EndpointSpec> {
    let mut endpoints = BTreeMap::new();
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return endpoints;
    };

    for (path, item) in paths {
        let Some(operations) = item.as_object() else {
            continue;
        };
        let shared_params = item.get("parameters");
        for (method, operation) in operations {
            let method_lc = method.to_ascii_lowercase();
            if !HTTP_METHODS.contains(&method_lc.as_str()) {
                continue;
            }
            let (required_params, optional_params) =
                collect_params(shared_params, operation.get("parameters"));
            endpoints.insert(
                endpoint_name(&method_lc, path),
                EndpointSpec {
                    method: method_lc.to_ascii_uppercase(),
                    path: path.clone(),
                    required_params,
                    optional_params,
                },
            );
        }
    }
    endpoints
}

fn collect_params(shared: Option<&Value>, own: Option<&Value>) -> (Vec<String>, Vec<String>) {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    let all = shared
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .chain(own.and_then(Value::as_array).into_iter().flatten());
    for param in all {
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let is_required = param.get("required").and_then(Value::as_bool).unwrap_or(false)
            || param.get("in").and_then(Value::as_str) == Some("path");
        let bucket = if is_required { &mut required } else { &mut optional };
        if !bucket.iter().any(|p| p == name) {
            bucket.push(name.to_string());
        }
    }
    (required, optional)
}

/// `<method>_<path with runs of non-alphanumerics collapsed to '_'>`.
pub fn endpoint_name(method: &str, path: &str) -> String {
    let mut name = method.to_ascii_lowercase();
    name.push('_');
    let mut pending_sep = false;
    let mut wrote_any = false;
    for c in path.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && wrote_any {
                name.push('_');
            }
            name.push(c);
            pending_sep = false;
            wrote_any = true;
        } else {
            pending_sep = true;
        }
    }
    if !wrote_any {
        name.push_str("root");
    }
    name
}

/// Cross-run discovery cache, bounded by a TTL.
pub struct SharedDiscoveryCache {
    ttl: Duration,
    entries: Mutex<HashMap<PlatformId, (Instant, PlatformConfig)>>,
}

impl SharedDiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, platform: &PlatformId) -> Option<PlatformConfig> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(platform) {
            Some((stored_at, config)) if stored_at.elapsed() < self.ttl => Some(config.clone()),
            Some(_) => {
                entries.remove(platform);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, platform: PlatformId, config: PlatformConfig) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(platform, (Instant::now(), config));
        }
    }
}
