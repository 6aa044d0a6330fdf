//! Universal API caller: one authenticated HTTP call against a platform
//! endpoint resolved through the catalog, the discovery caches or discovery.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::integration::auth::{build_auth, Credentials};
use crate::integration::discovery::{PlatformDiscovery, SharedDiscoveryCache};
use crate::integration::platform::{PlatformCatalog, PlatformConfig, PlatformId};

/// Per-run caller. Holds the run's own discovery cache, so a platform is
/// probed at most once per run.
pub struct UniversalApiCaller {
    client: reqwest::Client,
    discovery: Arc<PlatformDiscovery>,
    catalog: Arc<PlatformCatalog>,
    shared_cache: Option<Arc<SharedDiscoveryCache>>,
    run_cache: HashMap<PlatformId, PlatformConfig>,
    user_agent: String,
    error_body_limit: usize,
    exclude_path_params_from_body: bool,
}

impl UniversalApiCaller {
    pub fn new(
        config: &EngineConfig,
        discovery: Arc<PlatformDiscovery>,
        catalog: Arc<PlatformCatalog>,
        shared_cache: Option<Arc<SharedDiscoveryCache>>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            discovery,
            catalog,
            shared_cache,
            run_cache: HashMap::new(),
            user_agent: config.user_agent.clone(),
            error_body_limit: config.error_body_limit,
            exclude_path_params_from_body: config.exclude_path_params_from_body,
        }
    }

    /// Resolve a platform config: catalog, then this run's cache, then the
    /// shared cache, then discovery.
    pub async fn platform_config(&mut self, platform: &PlatformId) -> PlatformConfig {
        if let Some(config) = self.catalog.get(platform) {
            return config.clone();
        }
        if let Some(config) = self.run_cache.get(platform) {
            return config.clone();
        }
        if let Some(config) = self.shared_cache.as_ref().and_then(|c| c.get(platform)) {
            self.run_cache.insert(platform.clone(), config.clone());
            return config;
        }

        let config = self.discovery.discover(platform).await;
        if let Some(shared) = &self.shared_cache {
            shared.insert(platform.clone(), config.clone());
        }
        self.run_cache.insert(platform.clone(), config.clone());
        config
    }

    pub async fn call(
        &mut self,
        platform: &PlatformId,
        endpoint_name: &str,
        params: &Map<String, Value>,
        credentials: &Credentials,
    ) -> Result<Value, ExecutionError> {
        let config = self.platform_config(platform).await;
        let endpoint = config.endpoint(endpoint_name).ok_or_else(|| {
            ExecutionError::Transport(format!(
                "platform '{}' has no endpoint '{}'",
                platform, endpoint_name
            ))
        })?;

        let (path, consumed) = substitute_path(&endpoint.path, params);
        let mut url = join_url(&config.base_url, &path)?;
        let auth = build_auth(&config.auth_config, credentials, &self.user_agent);
        let method = reqwest::Method::from_bytes(endpoint.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ExecutionError::Transport(format!("invalid HTTP method '{}'", endpoint.method)))?;
        let params_in_query = matches!(
            method,
            reqwest::Method::GET | reqwest::Method::DELETE | reqwest::Method::HEAD
        );

        {
            let mut query = url.query_pairs_mut();
            if params_in_query {
                for (key, value) in params.iter().filter(|(k, _)| !consumed.contains(k.as_str())) {
                    query.append_pair(key, &value_as_text(value));
                }
            }
            for (key, value) in &auth.query_params {
                query.append_pair(key, value);
            }
        }
        // query_pairs_mut always leaves a '?' behind
        if url.query() == Some("") {
            url.set_query(None);
        }

        tracing::info!(
            "[Caller] {} {} ({}:{})",
            method,
            redact_query(&url),
            platform,
            endpoint_name
        );

        let mut request = self.client.request(method, url);
        for (name, value) in &auth.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !params_in_query {
            let body: Map<String, Value> = params
                .iter()
                .filter(|(k, _)| !(self.exclude_path_params_from_body && consumed.contains(k.as_str())))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            request = request.json(&Value::Object(body));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutionError::Transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ExecutionError::ApiCall {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                body: truncate_chars(&text, self.error_body_limit),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// Replace `{name}` placeholders with URL-encoded parameter values. Returns
/// the new path and the set of parameters it consumed. Placeholders with no
/// matching parameter are left as-is.
fn substitute_path<'p>(path: &str, params: &'p Map<String, Value>) -> (String, HashSet<&'p str>) {
    let mut out = String::with_capacity(path.len());
    let mut consumed = HashSet::new();
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match params.get_key_value(name) {
                    Some((key, value)) => {
                        out.push_str(&urlencoding::encode(&value_as_text(value)));
                        consumed.insert(key.as_str());
                    }
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    (out, consumed)
}

fn join_url(base_url: &str, path: &str) -> Result<reqwest::Url, ExecutionError> {
    let base = base_url.trim_end_matches('/');
    let joined = if path.is_empty() || path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };
    reqwest::Url::parse(&joined)
        .map_err(|e| ExecutionError::Transport(format!("invalid URL '{}': {}", joined, e)))
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn redact_query(url: &reqwest::Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::platform::{AuthConfig, AuthLocation, AuthType, EndpointSpec};
    use mockito::Matcher;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn creds(pairs: &[(&str, &str)]) -> Credentials {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn endpoint(method: &str, path: &str) -> EndpointSpec {
        EndpointSpec {
            method: method.to_string(),
            path: path.to_string(),
            required_params: Vec::new(),
            optional_params: Vec::new(),
        }
    }

    fn caller_with(platform: &str, config: PlatformConfig, engine: EngineConfig) -> (UniversalApiCaller, PlatformId) {
        let id = PlatformId::parse(platform).unwrap();
        let mut catalog = PlatformCatalog::new();
        catalog.insert(id.clone(), config);
        let caller = UniversalApiCaller::new(
            &engine,
            Arc::new(PlatformDiscovery::new(&engine)),
            Arc::new(catalog),
            None,
        );
        (caller, id)
    }

    fn test_config(base_url: String, endpoints: &[(&str, EndpointSpec)], auth: AuthConfig) -> PlatformConfig {
        PlatformConfig {
            name: "test".to_string(),
            base_url,
            auth_config: auth,
            endpoints: endpoints
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            source: Default::default(),
        }
    }

    #[test]
    fn test_substitute_path_encodes_and_tracks() {
        let p = params(json!({ "id": "a b/c", "n": 7, "other": true }));
        let (path, consumed) = substitute_path("/items/{id}/sub/{n}/{missing}", &p);
        assert_eq!(path, "/items/a%20b%2Fc/sub/7/{missing}");
        assert!(consumed.contains("id") && consumed.contains("n"));
        assert!(!consumed.contains("other"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[tokio::test]
    async fn test_post_sends_json_body_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-1")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({ "channel": "#general", "text": "hi" })))
            .with_status(200)
            .with_body(r#"{"ok":true,"ts":"123"}"#)
            .create_async()
            .await;

        let config = test_config(
            server.url(),
            &[("post_message", endpoint("POST", "/chat.postMessage"))],
            AuthConfig::bearer(),
        );
        let (mut caller, id) = caller_with("slack", config, EngineConfig::default());
        let result = caller
            .call(
                &id,
                "post_message",
                &params(json!({ "channel": "#general", "text": "hi" })),
                &creds(&[("access_token", "xoxb-1")]),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({ "ok": true, "ts": "123" }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_uses_query_and_path_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/42")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("fields".into(), "name".into()),
                Matcher::UrlEncoded("apikey".into(), "k1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"name":"Ada"}"#)
            .create_async()
            .await;

        let auth = AuthConfig {
            auth_type: AuthType::ApiKey,
            location: AuthLocation::Query,
            parameter_name: "apikey".to_string(),
            format: "{api_key}".to_string(),
        };
        let config = test_config(server.url(), &[("get_user", endpoint("GET", "/users/{id}"))], auth);
        let (mut caller, id) = caller_with("people", config, EngineConfig::default());
        let result = caller
            .call(&id, "get_user", &params(json!({ "id": 42, "fields": "name" })), &creds(&[("api_key", "k1")]))
            .await
            .unwrap();

        assert_eq!(result["name"], "Ada");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_path_params_excluded_from_body_by_default() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/docs/d1")
            .match_body(Matcher::Json(json!({ "title": "T" })))
            .with_status(204)
            .create_async()
            .await;

        let config = test_config(server.url(), &[("put_doc", endpoint("PUT", "/docs/{doc_id}"))], AuthConfig::bearer());
        let (mut caller, id) = caller_with("docs", config, EngineConfig::default());
        let result = caller
            .call(&id, "put_doc", &params(json!({ "doc_id": "d1", "title": "T" })), &Credentials::new())
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_path_params_kept_in_body_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/docs/d1")
            .match_body(Matcher::Json(json!({ "doc_id": "d1", "title": "T" })))
            .with_status(200)
            .with_body("updated")
            .create_async()
            .await;

        let engine = EngineConfig {
            exclude_path_params_from_body: false,
            ..EngineConfig::default()
        };
        let config = test_config(server.url(), &[("patch_doc", endpoint("PATCH", "/docs/{doc_id}"))], AuthConfig::bearer());
        let (mut caller, id) = caller_with("docs", config, engine);
        let result = caller
            .call(&id, "patch_doc", &params(json!({ "doc_id": "d1", "title": "T" })), &Credentials::new())
            .await
            .unwrap();

        assert_eq!(result, json!("updated"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_2xx_is_api_failure_with_truncated_body() {
        let mut server = mockito::Server::new_async().await;
        let long_body = "x".repeat(50);
        let _mock = server
            .mock("POST", "/api/v1/execute")
            .with_status(401)
            .with_body(&long_body)
            .create_async()
            .await;

        let engine = EngineConfig {
            error_body_limit: 10,
            ..EngineConfig::default()
        };
        let config = test_config(
            server.url(),
            &[("universal_call", endpoint("POST", "/api/v1/execute"))],
            AuthConfig::bearer(),
        );
        let (mut caller, id) = caller_with("acme", config, engine);
        let err = caller
            .call(&id, "does_not_exist", &Map::new(), &Credentials::new())
            .await
            .unwrap_err();

        match err {
            ExecutionError::ApiCall { status, status_text, body } => {
                assert_eq!(status, 401);
                assert_eq!(status_text, "Unauthorized");
                assert_eq!(body, "x".repeat(10));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_discovery_runs_once_per_run() {
        let mut server = mockito::Server::new_async().await;
        let probe = server
            .mock("GET", "/acme/openapi.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let engine = EngineConfig {
            probe_templates: vec![format!("{}/{{platform}}/openapi.json", server.url())],
            ..EngineConfig::default()
        };
        let mut caller = UniversalApiCaller::new(
            &engine,
            Arc::new(PlatformDiscovery::new(&engine)),
            Arc::new(PlatformCatalog::new()),
            None,
        );
        let id = PlatformId::parse("acme").unwrap();
        let first = caller.platform_config(&id).await;
        let second = caller.platform_config(&id).await;

        assert_eq!(first, second);
        assert_eq!(first.base_url, "https://api.acme.com");
        probe.assert_async().await;
    }
}
