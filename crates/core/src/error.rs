//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own enum; [`AgentError`] is the terminal
//! error of a single request and wraps the others.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input for {tool_name}: {reason}")]
    InvalidInput { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

/// A reasoning-engine reply that could not be turned into a step.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// The reply is not a JSON object.
    #[error("Malformed reply from reasoning engine: {reason}")]
    Malformed { raw: String, reason: String },

    /// `step` is missing or not one of plan/action/observe/output.
    #[error("Unrecognized step: {raw}")]
    UnknownStep { raw: serde_json::Value },

    /// An action names a tool that is not registered.
    #[error("Unknown tool: {function}")]
    UnknownTool {
        function: String,
        raw: serde_json::Value,
    },

    #[error("Invalid '{field}' in {step} step: {reason}")]
    InvalidField {
        step: &'static str,
        field: &'static str,
        reason: String,
        raw: serde_json::Value,
    },
}

/// Why a request's agent loop terminated without an answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool '{tool}' failed: {source}")]
    ToolFault {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("Round limit of {limit} exceeded without an output step")]
    RoundLimitExceeded { limit: u32 },

    #[error("Reasoning engine did not reply within {secs}s")]
    EngineTimeout { secs: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A serialized conversation log that cannot be restored.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Invalid transcript JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transcript must start with a system directive and a user query: {0}")]
    MissingHeader(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = AgentError::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_fault_names_the_tool() {
        let err = AgentError::ToolFault {
            tool: "run_command".into(),
            source: ToolError::PermissionDenied {
                tool_name: "run_command".into(),
                reason: "command not in allowlist".into(),
            },
        };
        assert!(err.to_string().contains("run_command"));
        assert!(err.to_string().contains("allowlist"));
    }

    #[test]
    fn step_error_is_transparent() {
        let err: AgentError = StepError::UnknownTool {
            function: "delete_universe".into(),
            raw: serde_json::Value::Null,
        }
        .into();
        assert_eq!(err.to_string(), "Unknown tool: delete_universe");
    }
}
