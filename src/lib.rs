//! Agent runtime building blocks: stdio JSON-RPC tool servers, a
//! capability registry with failure-isolating dispatch, and bounded
//! conversation history.

pub mod agent_core;
pub mod config;
pub mod mcp_client;

pub use agent_core::{
    AgentError, AgentSession, Capability, CapabilityRegistry, ConversationBuffer,
    ConversationMessage, ModelService, ToolCallRequest, ToolDefinition, ToolExecutionResult,
};
pub use config::{load_config, RuntimeConfig};
pub use mcp_client::{McpClient, McpError};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Install the global tracing subscriber on stderr.
///
/// Filtering follows `RUST_LOG`, defaulting to `toolbridge=info,warn`.
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("toolbridge=info,warn"));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    let installed = match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), ?format, "=== toolbridge starting ===");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_only_once() {
        init_tracing(LogFormat::Json);
        assert!(!init_tracing(LogFormat::Pretty));
    }
}
