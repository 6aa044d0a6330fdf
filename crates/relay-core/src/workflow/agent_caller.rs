//! Agent caller: runs an `ai_agent_call` step against the agent's LLM
//! provider over HTTP.
//!
//! Only OpenAI-compatible chat completions are supported:
//!
//! POST {openai_base_url}/chat/completions
//! Headers:
//!   Authorization: Bearer {api_key}
//!   content-type: application/json

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::models::agent::AgentDefinition;
use crate::workflow::AgentSource;

const TEMPERATURE: f64 = 0.7;

/// Completion returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

pub struct AgentCaller<'a> {
    client: reqwest::Client,
    agents: &'a dyn AgentSource,
    openai_base_url: String,
    error_body_limit: usize,
}

impl<'a> AgentCaller<'a> {
    pub fn new(config: &EngineConfig, agents: &'a dyn AgentSource) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.llm_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            agents,
            openai_base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            error_body_limit: config.error_body_limit,
        }
    }

    /// Load the agent and send it one prompt.
    pub async fn invoke(&self, agent_id: &str, prompt: &str) -> Result<AgentResponse, ExecutionError> {
        let agent = self
            .agents
            .load_agent(agent_id)
            .await?
            .ok_or_else(|| ExecutionError::AgentNotFound(agent_id.to_string()))?;

        match agent.llm_provider.trim().to_ascii_lowercase().as_str() {
            "openai" => self.call_openai(&agent, prompt).await,
            _ => Err(ExecutionError::UnsupportedAiProvider(agent.llm_provider.clone())),
        }
    }

    async fn call_openai(&self, agent: &AgentDefinition, prompt: &str) -> Result<AgentResponse, ExecutionError> {
        let url = format!("{}/chat/completions", self.openai_base_url);
        let body = serde_json::json!({
            "model": agent.model,
            "messages": [
                { "role": "system", "content": agent.agent_rules },
                { "role": "user", "content": prompt }
            ],
            "temperature": TEMPERATURE
        });

        tracing::info!(
            "[AgentCaller] Calling OpenAI API: {} (agent: {}, model: {})",
            url,
            agent.id,
            agent.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", agent.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(format!("LLM request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ExecutionError::Transport(format!("Failed to read LLM response body: {}", e)))?;

        if !status.is_success() {
            return Err(ExecutionError::ApiCall {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                body: response_text.chars().take(self.error_body_limit).collect(),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| ExecutionError::Transport(format!("Failed to parse LLM response JSON: {}", e)))?;

        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| ExecutionError::Transport("LLM response has no completion text".to_string()))?
            .to_string();

        let usage = json.get("usage").map(|u| UsageInfo {
            input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()),
            output_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()),
        });
        if let Some(u) = &usage {
            tracing::debug!(
                "[AgentCaller] Usage for agent {}: in={:?} out={:?}",
                agent.id,
                u.input_tokens,
                u.output_tokens
            );
        }

        Ok(AgentResponse {
            content,
            model: json
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(&agent.model)
                .to_string(),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;

    struct OneAgent(AgentDefinition);

    #[async_trait]
    impl AgentSource for OneAgent {
        async fn load_agent(&self, agent_id: &str) -> Result<Option<AgentDefinition>, ServerError> {
            Ok((agent_id == self.0.id).then(|| self.0.clone()))
        }
    }

    fn agent(provider: &str) -> AgentDefinition {
        let mut a = AgentDefinition::new(
            "summarizer".into(),
            "u1".into(),
            "Summarizer".into(),
            "Be brief.".into(),
            "sk-test".into(),
        );
        a.llm_provider = provider.to_string();
        a
    }

    fn config_for(url: &str) -> EngineConfig {
        EngineConfig {
            openai_base_url: url.to_string(),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_openai_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.7,
                "messages": [
                    { "role": "system", "content": "Be brief." },
                    { "role": "user", "content": "Summarize: hi" }
                ]
            })))
            .with_status(200)
            .with_body(r#"{"model":"gpt-4o-mini","choices":[{"message":{"role":"assistant","content":"Hi."}}],"usage":{"prompt_tokens":9,"completion_tokens":2}}"#)
            .create_async()
            .await;

        let source = OneAgent(agent("openai"));
        let caller = AgentCaller::new(&config_for(&server.url()), &source);
        let response = caller.invoke("summarizer", "Summarize: hi").await.unwrap();

        assert_eq!(response.content, "Hi.");
        assert_eq!(response.usage.unwrap().output_tokens, Some(2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_agent_and_provider() {
        let source = OneAgent(agent("anthropic"));
        let caller = AgentCaller::new(&config_for("http://127.0.0.1:9"), &source);

        let err = caller.invoke("nobody", "x").await.unwrap_err();
        assert!(matches!(err, ExecutionError::AgentNotFound(id) if id == "nobody"));

        let err = caller.invoke("summarizer", "x").await.unwrap_err();
        assert!(matches!(err, ExecutionError::UnsupportedAiProvider(p) if p == "anthropic"));
    }

    #[tokio::test]
    async fn test_provider_error_is_api_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":"rate limited"}"#)
            .create_async()
            .await;

        let source = OneAgent(agent("openai"));
        let caller = AgentCaller::new(&config_for(&server.url()), &source);
        let err = caller.invoke("summarizer", "x").await.unwrap_err();
        assert!(matches!(err, ExecutionError::ApiCall { status: 429, .. }));
    }
}
