//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed {
        name: String,
        reason: String,
    },

    /// The `initialize` / `initialized` handshake failed.
    #[error("server '{name}' handshake failed: {reason}")]
    HandshakeFailed {
        name: String,
        reason: String,
    },

    /// I/O error on the server's stdio pipes, or a serialization failure.
    #[error("transport error for server '{server}': {reason}")]
    TransportError {
        server: String,
        reason: String,
    },

    /// Inbound line that could not be parsed or matched to a request.
    ///
    /// Never returned to a caller; logged and dropped by the correlator.
    #[error("protocol error from server '{server}': {reason}")]
    ProtocolError {
        server: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The server process exited while the request was outstanding.
    #[error("process terminated (exit code {})", format_exit_code(.exit_code))]
    Terminated {
        exit_code: Option<i32>,
    },

    /// The transport has been disconnected; no further requests are accepted.
    #[error("server '{name}' is not connected")]
    NotConnected {
        name: String,
    },

    /// A request timed out. Only produced when a request timeout is configured.
    #[error("request '{method}' timed out after {timeout_ms}ms")]
    Timeout {
        method: String,
        timeout_ms: u64,
    },

    /// Configuration error (missing servers, bad config file).
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

/// Render an exit code for messages. Signal-terminated processes have none.
pub fn format_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "unknown".to_string(),
    }
}

impl McpError {
    /// Whether this error means the connection itself is gone.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            McpError::Terminated { .. } | McpError::NotConnected { .. }
        )
    }
}
