//! Agent Core error types.

use thiserror::Error;

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Imported conversation data is not a sequence of message records.
    #[error("invalid conversation data: {reason}")]
    InvalidConversation { reason: String },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    /// The model service returned an error.
    #[error("model request failed: {reason}")]
    ModelError { reason: String },

    /// The model kept requesting tools past the configured round limit.
    #[error("tool round limit of {limit} exceeded")]
    ToolRoundLimit { limit: usize },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}

/// Per-call dispatch failures.
///
/// Never returned from `dispatch`; rendered into the `error` field of the
/// call's `ToolExecutionResult`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Tool {name} not found")]
    CapabilityNotFound { name: String },

    #[error("Malformed arguments for tool {tool}: {reason}")]
    MalformedArguments { tool: String, reason: String },

    #[error("Missing required parameter: {parameter}")]
    MissingParameter { tool: String, parameter: String },

    /// Rendered with the full `anyhow` context chain.
    #[error("{reason}")]
    ExecutionFailed { tool: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DispatchError::CapabilityNotFound { name: "bar".into() };
        assert_eq!(err.to_string(), "Tool bar not found");
    }

    #[test]
    fn test_missing_parameter_names_parameter() {
        let err = DispatchError::MissingParameter {
            tool: "shell".into(),
            parameter: "command".into(),
        };
        assert_eq!(err.to_string(), "Missing required parameter: command");
    }

    #[test]
    fn test_serde_error_conversion() {
        let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let agent: AgentError = e.into();
        assert!(matches!(agent, AgentError::SerializationError { .. }));
    }
}
