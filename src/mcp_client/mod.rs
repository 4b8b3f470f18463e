//! MCP Client: JSON-RPC over stdio transport for MCP server management.
//!
//! This module handles:
//! - Spawning MCP server child processes and framing their stdout
//! - Correlating JSON-RPC 2.0 requests and responses by id
//! - The `initialize` / `initialized` handshake
//! - Exposing remote tools as local capabilities
//! - Starting and shutting down every configured server

pub mod adapter;
pub mod client;
pub mod errors;
pub mod framing;
pub mod lifecycle;
pub mod pending;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use adapter::{discover_tools, RemoteTool};
pub use client::{ConnectOptions, InitializedSignal, McpClient};
pub use errors::McpError;
pub use lifecycle::{shutdown_all, start_servers, ServerMap, Startup};
pub use types::{McpResource, McpToolDefinition, ServerConfig};
