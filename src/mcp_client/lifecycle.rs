//! Server lifecycle management.
//!
//! Connects every configured server concurrently, registers their tools, and
//! shuts them all down. Partial startup is acceptable: servers that fail to
//! spawn or handshake are reported and skipped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::agent_core::registry::CapabilityRegistry;

use super::adapter::discover_tools;
use super::client::{ConnectOptions, McpClient};
use super::errors::McpError;
use super::types::ServerConfig;

/// Connected servers keyed by name.
pub type ServerMap = BTreeMap<String, Arc<McpClient>>;

/// Outcome of starting the configured servers.
#[derive(Default)]
pub struct Startup {
    pub servers: ServerMap,
    /// Servers that could not be started or whose tools could not be listed.
    pub errors: Vec<(String, McpError)>,
    /// Remote tools registered across all servers.
    pub tools_registered: usize,
}

/// Connect all configured servers concurrently.
///
/// Returns the connected servers and the failures, each sorted by name.
pub async fn connect_all(
    configs: &HashMap<String, ServerConfig>,
    options: &ConnectOptions,
) -> (ServerMap, Vec<(String, McpError)>) {
    let mut servers = BTreeMap::new();
    let mut errors = Vec::new();

    let mut handles: Vec<(String, _)> = Vec::new();
    for (name, config) in configs {
        let name = name.clone();
        let config = config.clone();
        let options = options.clone();
        handles.push((
            name.clone(),
            tokio::spawn(async move { McpClient::connect(&name, &config, options).await }),
        ));
    }

    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(client)) => {
                servers.insert(name, Arc::new(client));
            }
            Ok(Err(e)) => {
                tracing::warn!(server = %name, error = %e, "server failed to start");
                errors.push((name, e));
            }
            Err(e) => {
                errors.push((
                    name.clone(),
                    McpError::SpawnFailed {
                        name,
                        reason: format!("join error: {e}"),
                    },
                ));
            }
        }
    }

    errors.sort_by(|a, b| a.0.cmp(&b.0));
    (servers, errors)
}

/// Discover every server's tools and register them.
///
/// Returns how many tools were registered and the servers whose discovery
/// failed.
pub async fn register_remote_tools(
    servers: &ServerMap,
    registry: &mut CapabilityRegistry,
) -> (usize, Vec<(String, McpError)>) {
    let mut count = 0;
    let mut errors = Vec::new();

    for (name, client) in servers {
        match discover_tools(client).await {
            Ok(tools) => {
                for tool in tools {
                    registry.register(Arc::new(tool));
                    count += 1;
                }
            }
            Err(e) => {
                tracing::warn!(server = %name, error = %e, "tool discovery failed");
                errors.push((name.clone(), e));
            }
        }
    }

    (count, errors)
}

/// Connect all servers and register their tools.
pub async fn start_servers(
    configs: &HashMap<String, ServerConfig>,
    options: &ConnectOptions,
    registry: &mut CapabilityRegistry,
) -> Startup {
    let (servers, mut errors) = connect_all(configs, options).await;
    let (tools_registered, discovery_errors) = register_remote_tools(&servers, registry).await;
    errors.extend(discovery_errors);

    tracing::info!(
        configured = configs.len(),
        connected = servers.len(),
        failed = errors.len(),
        tools = tools_registered,
        "servers started"
    );

    Startup {
        servers,
        errors,
        tools_registered,
    }
}

/// Disconnect every server.
pub async fn shutdown_all(servers: &mut ServerMap) {
    for (name, client) in servers.iter() {
        tracing::debug!(server = %name, "shutting down");
        client.disconnect().await;
    }
    servers.clear();
}
