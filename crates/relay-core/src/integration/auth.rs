//! Build request headers and query parameters from an [`AuthConfig`] and a
//! platform's credentials.
//!
//! Missing credentials never fail here; the auth header is simply left out
//! and the platform's own 401 surfaces through the caller.

use std::collections::HashMap;

use base64::Engine;

use crate::integration::platform::{AuthConfig, AuthLocation, AuthType};

/// Decoded credential fields for one platform (`access_token`, `api_key`, ...).
pub type Credentials = HashMap<String, String>;

/// Headers and query parameters to attach to an outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthMaterial {
    pub headers: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
}

impl AuthMaterial {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn first_of<'c>(credentials: &'c Credentials, keys: &[&str]) -> Option<&'c str> {
    keys.iter()
        .filter_map(|k| credentials.get(*k))
        .map(String::as_str)
        .find(|v| !v.is_empty())
}

fn apply_format(format: &str, token: &str) -> String {
    format
        .replace("{token}", token)
        .replace("{access_token}", token)
        .replace("{api_key}", token)
        .replace("{credentials}", token)
}

pub fn build_auth(auth: &AuthConfig, credentials: &Credentials, user_agent: &str) -> AuthMaterial {
    let mut material = AuthMaterial {
        headers: vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), user_agent.to_string()),
        ],
        query_params: Vec::new(),
    };

    match auth.auth_type {
        AuthType::Bearer => {
            if let Some(token) = first_of(credentials, &["access_token", "token", "api_key"]) {
                let format = if auth.format.is_empty() { "Bearer {token}" } else { &auth.format };
                let name = if auth.parameter_name.is_empty() {
                    "Authorization"
                } else {
                    &auth.parameter_name
                };
                material.headers.push((name.to_string(), apply_format(format, token)));
            }
        }
        AuthType::ApiKey => {
            if let Some(key) = first_of(credentials, &["api_key", "key"]) {
                let format = if auth.format.is_empty() { "{api_key}" } else { &auth.format };
                let value = apply_format(format, key);
                let name = if auth.parameter_name.is_empty() {
                    "X-API-Key".to_string()
                } else {
                    auth.parameter_name.clone()
                };
                match auth.location {
                    AuthLocation::Header => material.headers.push((name, value)),
                    AuthLocation::Query => material.query_params.push((name, value)),
                }
            }
        }
        AuthType::Basic => {
            let user = first_of(credentials, &["username", "email"]);
            let secret = first_of(credentials, &["password", "api_key"]);
            if let (Some(user), Some(secret)) = (user, secret) {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", user, secret));
                material
                    .headers
                    .push(("Authorization".to_string(), format!("Basic {}", encoded)));
            }
        }
    }

    material
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(pairs: &[(&str, &str)]) -> Credentials {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_bearer_prefers_access_token() {
        let material = build_auth(
            &AuthConfig::bearer(),
            &creds(&[("api_key", "k"), ("access_token", "xoxb-1")]),
            "relay-test",
        );
        assert_eq!(material.header("authorization"), Some("Bearer xoxb-1"));
        assert_eq!(material.header("Content-Type"), Some("application/json"));
        assert_eq!(material.header("User-Agent"), Some("relay-test"));
    }

    #[test]
    fn test_bearer_custom_format() {
        let auth = AuthConfig {
            format: "token {access_token}".to_string(),
            ..AuthConfig::bearer()
        };
        let material = build_auth(&auth, &creds(&[("token", "abc")]), "ua");
        assert_eq!(material.header("Authorization"), Some("token abc"));
    }

    #[test]
    fn test_missing_credentials_omit_header() {
        let material = build_auth(&AuthConfig::bearer(), &Credentials::new(), "ua");
        assert!(material.header("Authorization").is_none());
        assert_eq!(material.headers.len(), 2);
    }

    #[test]
    fn test_api_key_header_and_query() {
        let header_auth = AuthConfig {
            auth_type: AuthType::ApiKey,
            location: AuthLocation::Header,
            parameter_name: "X-Api-Token".to_string(),
            format: "{api_key}".to_string(),
        };
        let material = build_auth(&header_auth, &creds(&[("key", "secret")]), "ua");
        assert_eq!(material.header("X-Api-Token"), Some("secret"));
        assert!(material.query_params.is_empty());

        let query_auth = AuthConfig {
            location: AuthLocation::Query,
            parameter_name: "apikey".to_string(),
            ..header_auth
        };
        let material = build_auth(&query_auth, &creds(&[("api_key", "secret")]), "ua");
        assert!(material.header("apikey").is_none());
        assert_eq!(material.query_params, vec![("apikey".to_string(), "secret".to_string())]);
    }

    #[test]
    fn test_basic_auth() {
        let auth = AuthConfig {
            auth_type: AuthType::Basic,
            ..AuthConfig::bearer()
        };
        let material = build_auth(&auth, &creds(&[("email", "a@b.c"), ("api_key", "pw")]), "ua");
        // base64("a@b.c:pw")
        assert_eq!(material.header("Authorization"), Some("Basic YUBiLmM6cHc="));

        let partial = build_auth(&auth, &creds(&[("username", "solo")]), "ua");
        assert!(partial.header("Authorization").is_none());
    }
}
