//! Agent Core: capability dispatch and conversation state.
//!
//! Submodules:
//! - `capability`: The `Capability` trait implemented by every tool
//! - `registry`: Name → capability directory with failure-isolating dispatch
//! - `conversation`: Bounded message history with system-preserving eviction
//! - `session`: Model ↔ tool loop over a registry and a conversation
//! - `tools`: Built-in `filesystem` and `shell` capabilities
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod capability;
pub mod conversation;
pub mod errors;
pub mod registry;
pub mod session;
pub mod tools;
pub mod types;

// Re-exports for convenience
pub use capability::Capability;
pub use conversation::{ConversationBuffer, DEFAULT_MAX_MESSAGES};
pub use errors::{AgentError, DispatchError};
pub use registry::CapabilityRegistry;
pub use session::{
    AgentSession, ModelRequest, ModelResponse, ModelService, SessionOptions, TurnOutcome,
};
pub use tools::register_default_tools;
pub use types::{ConversationMessage, Role, ToolCallRequest, ToolDefinition, ToolExecutionResult};
