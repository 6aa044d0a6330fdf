//! Error types for the Relay engine.
//!
//! `ServerError` is used by the stores and the outer surfaces (HTTP, CLI).
//! When the `axum` feature is enabled, it also implements `IntoResponse`
//! so it can be used directly as an axum handler error type.
//!
//! `ExecutionError` is the step-level failure taxonomy. Every variant passes
//! through the failing step's `on_error` policy before it can abort a run.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("No credentials found for platform: {0}")]
    MissingCredentials(String),

    #[error("API call failed: {status} {status_text}: {body}")]
    ApiCall {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("API request failed: {0}")]
    Transport(String),

    #[error("Invalid characters in condition expression: {0}")]
    ExpressionValidation(String),

    #[error("Failed to evaluate condition: {0}")]
    ExpressionEvaluation(String),

    #[error("Loop source '{source_ref}' is not an array (found {found})")]
    LoopSourceType { source_ref: String, found: String },

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Invalid blueprint: {0}")]
    InvalidBlueprint(String),

    #[error("Unsupported AI provider: {0}")]
    UnsupportedAiProvider(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Invalid platform name: {0}")]
    InvalidPlatform(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] ServerError),
}

impl ExecutionError {
    /// Short machine-readable kind, recorded alongside step log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::MissingCredentials(_) => "missing_credentials",
            ExecutionError::ApiCall { .. } | ExecutionError::Transport(_) => "api_call_failure",
            ExecutionError::ExpressionValidation(_) => "expression_validation_failure",
            ExecutionError::ExpressionEvaluation(_) => "expression_evaluation_failure",
            ExecutionError::LoopSourceType { .. } => "loop_source_type_error",
            ExecutionError::UnknownStepType(_) => "unknown_step_type",
            ExecutionError::InvalidBlueprint(_) => "invalid_blueprint",
            ExecutionError::UnsupportedAiProvider(_) => "unsupported_ai_provider",
            ExecutionError::AgentNotFound(_) => "agent_not_found",
            ExecutionError::InvalidPlatform(_) => "invalid_platform",
            ExecutionError::Cancelled => "cancelled",
            ExecutionError::Store(_) => "store_failure",
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
