//! MCP Client: request/response correlation and the connection handshake.
//!
//! One `McpClient` owns one server connection. Requests can be issued
//! concurrently through a shared reference; responses are matched strictly by
//! id, so they may complete in any order. When the process exits, every
//! outstanding request fails with `McpError::Terminated`.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use super::errors::McpError;
use super::pending::{PendingRequests, Routed};
use super::transport::{StdioTransport, TransportEvent};
use super::types::{
    InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest, ListResourcesResult,
    ListToolsResult, McpResource, McpToolDefinition, ServerConfig, ServerInfo,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// How the second handshake step is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializedSignal {
    /// Fire-and-forget notification without an id.
    #[default]
    Notification,
    /// A request that must be answered before the connection is ready.
    Request,
}

/// Connection options.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// How `initialized` is sent.
    pub initialized_signal: InitializedSignal,
    /// Per-request timeout. `None` waits until the response or process exit.
    pub request_timeout: Option<Duration>,
}

// ─── McpClient ───────────────────────────────────────────────────────────────

/// A connected, handshaken MCP server.
pub struct McpClient {
    name: String,
    transport: StdioTransport,
    pending: Arc<PendingRequests>,
    init: InitializeResult,
    request_timeout: Option<Duration>,
}

impl McpClient {
    /// Spawn the server and perform the `initialize` / `initialized` handshake.
    ///
    /// The returned client is ready for tool discovery. A failure at either
    /// handshake step kills the process and returns `HandshakeFailed`.
    pub async fn connect(
        name: &str,
        config: &ServerConfig,
        options: ConnectOptions,
    ) -> Result<Self, McpError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = StdioTransport::spawn(name, config, events_tx)?;
        let pending = Arc::new(PendingRequests::new());

        tokio::spawn(pump_events(
            name.to_string(),
            events_rx,
            Arc::clone(&pending),
        ));

        let mut client = Self {
            name: name.to_string(),
            transport,
            pending,
            init: InitializeResult::default(),
            request_timeout: options.request_timeout,
        };

        match client.handshake(options.initialized_signal).await {
            Ok(init) => {
                tracing::info!(
                    server = name,
                    server_name = ?init.server_info.as_ref().and_then(|s| s.name.as_deref()),
                    protocol = ?init.protocol_version,
                    "server connected"
                );
                client.init = init;
                Ok(client)
            }
            Err(e) => {
                client.transport.disconnect().await;
                Err(McpError::HandshakeFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn handshake(&self, signal: InitializedSignal) -> Result<InitializeResult, McpError> {
        let params = serde_json::to_value(InitializeParams::default()).map_err(|e| {
            McpError::TransportError {
                server: self.name.clone(),
                reason: format!("failed to serialize initialize params: {e}"),
            }
        })?;
        let result = self.request("initialize", Some(params)).await?;
        let init: InitializeResult = if result.is_null() {
            InitializeResult::default()
        } else {
            serde_json::from_value(result).map_err(|e| McpError::ProtocolError {
                server: self.name.clone(),
                reason: format!("failed to parse initialize response: {e}"),
            })?
        };

        match signal {
            InitializedSignal::Notification => self.notify("initialized", None).await?,
            InitializedSignal::Request => {
                self.request("initialized", None).await?;
            }
        }
        Ok(init)
    }

    // ─── Requests ────────────────────────────────────────────────────────

    /// Send a request and wait for its response.
    ///
    /// The completion handle is registered before the line is written, so a
    /// response arriving immediately cannot be missed.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let id = uuid::Uuid::new_v4().to_string();
        let req = JsonRpcRequest::new(&id, method, params);
        let json = serde_json::to_string(&req).map_err(|e| McpError::TransportError {
            server: self.name.clone(),
            reason: format!("failed to serialize request: {e}"),
        })?;

        let completion = self.pending.register(&id, method)?;
        tracing::debug!(server = %self.name, id = %id, method, "sending request");

        if let Err(e) = self.transport.send(&json).await {
            self.pending.remove(&id);
            return Err(e);
        }

        let outcome = match self.request_timeout {
            None => completion.await,
            Some(limit) => match tokio::time::timeout(limit, completion).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.remove(&id);
                    return Err(McpError::Timeout {
                        method: method.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    });
                }
            },
        };

        // A dropped sender means the table went away without a sweep.
        outcome.unwrap_or_else(|_| {
            Err(McpError::Terminated {
                exit_code: self.pending.closed().flatten(),
            })
        })
    }

    /// Send a notification. No response is expected.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        if let Some(exit_code) = self.pending.closed() {
            return Err(McpError::Terminated { exit_code });
        }
        let note = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&note).map_err(|e| McpError::TransportError {
            server: self.name.clone(),
            reason: format!("failed to serialize notification: {e}"),
        })?;
        self.transport.send(&json).await
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, McpError> {
        let result = self.request(method, params).await?;
        serde_json::from_value(result).map_err(|e| McpError::ProtocolError {
            server: self.name.clone(),
            reason: format!("unexpected '{method}' result: {e}"),
        })
    }

    // ─── MCP Methods ─────────────────────────────────────────────────────

    /// `tools/list`.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        let result: ListToolsResult = self.request_as("tools/list", None).await?;
        Ok(result.tools)
    }

    /// `tools/call` with `{name, arguments}`. Returns the raw result payload.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        self.request("tools/call", Some(params)).await
    }

    /// `resources/list`.
    pub async fn list_resources(&self) -> Result<Vec<McpResource>, McpError> {
        let result: ListResourcesResult = self.request_as("resources/list", None).await?;
        Ok(result.resources)
    }

    /// `resources/read` with `{uri}`.
    pub async fn read_resource(&self, uri: &str) -> Result<serde_json::Value, McpError> {
        self.request("resources/read", Some(serde_json::json!({ "uri": uri })))
            .await
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Kill the server. Outstanding requests fail once the exit is observed.
    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    /// Configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Result of the `initialize` exchange.
    pub fn initialize_result(&self) -> &InitializeResult {
        &self.init
    }

    /// Server identity reported during the handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.init.server_info.as_ref()
    }

    /// Whether the process is still running and not disconnected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_open() && self.pending.closed().is_none()
    }

    /// Exit code once the process has exited (`Some(None)` for a signal).
    pub fn exit_code(&self) -> Option<Option<i32>> {
        self.pending.closed()
    }

    /// OS process id of the server.
    pub fn pid(&self) -> Option<u32> {
        self.transport.pid()
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ─── Event Pump ──────────────────────────────────────────────────────────────

/// Route transport events: responses to waiters, stderr to logs, exit to the
/// termination sweep.
async fn pump_events(
    server: String,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    pending: Arc<PendingRequests>,
) {
    let mut exit_code = None;

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(line) => match pending.route_line(&line) {
                Routed::Completed(_) => {}
                Routed::UnknownId(id) => {
                    let err = McpError::ProtocolError {
                        server: server.clone(),
                        reason: format!("response for unknown id '{id}'"),
                    };
                    tracing::warn!(error = %err, "dropping response");
                }
                Routed::NoId => {
                    tracing::debug!(server = %server, line = %line, "ignoring message without id");
                }
                Routed::Malformed(reason) => {
                    let err = McpError::ProtocolError {
                        server: server.clone(),
                        reason,
                    };
                    tracing::warn!(error = %err, line = %line, "dropping malformed message");
                }
            },
            TransportEvent::Diagnostic(line) => {
                tracing::warn!(server = %server, stderr = %line, "server diagnostic");
            }
            TransportEvent::Closed(code) => {
                exit_code = code;
                break;
            }
        }
    }

    let failed = pending.terminate(exit_code);
    if failed > 0 {
        tracing::warn!(server = %server, failed, exit_code = ?exit_code, "failed outstanding requests on exit");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::test_support::MockServer;

    #[tokio::test]
    async fn test_connect_and_list_tools() {
        let server = MockServer::new();
        let client = McpClient::connect("mock", &server.config(), ConnectOptions::default())
            .await
            .unwrap();

        assert!(client.is_connected());
        assert!(client.pid().is_some());
        let info = client.server_info().unwrap();
        assert_eq!(info.name.as_deref(), Some("mock"));

        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "plain", "fail"]);
        assert_eq!(tools[0].params_schema["required"][0], "text");

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_handshake_as_request() {
        let server = MockServer::new();
        let options = ConnectOptions {
            initialized_signal: InitializedSignal::Request,
            ..Default::default()
        };
        let client = McpClient::connect("mock", &server.config(), options)
            .await
            .unwrap();
        assert_eq!(client.list_tools().await.unwrap().len(), 3);
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_handshake_failure() {
        let server = MockServer::with_script("read line; echo '{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-1,\"message\":\"x\"}}'; exit 3");
        let err = McpClient::connect("broken", &server.config(), ConnectOptions::default())
            .await
            .err()
            .unwrap();
        match err {
            McpError::HandshakeFailed { name, reason } => {
                assert_eq!(name, "broken");
                assert!(reason.contains("process terminated (exit code 3)"), "{reason}");
            }
            other => panic!("expected HandshakeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_not_handshake_failure() {
        let config = ServerConfig::new("/no/such/mcp-server", &[]);
        let err = McpClient::connect("ghost", &config, ConnectOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_call_tool_success_and_error() {
        let server = MockServer::new();
        let client = McpClient::connect("mock", &server.config(), ConnectOptions::default())
            .await
            .unwrap();

        let ok = client
            .call_tool("echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(ok["content"][0]["text"], "echoed");

        let err = client
            .call_tool("fail", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ServerError { code: -32000, .. }));

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_resources() {
        let server = MockServer::new();
        let client = McpClient::connect("mock", &server.config(), ConnectOptions::default())
            .await
            .unwrap();

        let resources = client.list_resources().await.unwrap();
        assert_eq!(resources[0].uri, "file:///readme");
        let read = client.read_resource("file:///readme").await.unwrap();
        assert_eq!(read["contents"][0]["text"], "hello");

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_pipelined_requests_complete_out_of_order() {
        let server = MockServer::new();
        let client = Arc::new(
            McpClient::connect("mock", &server.config(), ConnectOptions::default())
                .await
                .unwrap(),
        );

        // The mock holds the first `slow` call until a second arrives, then
        // answers them in reverse order, echoing each call's tag.
        let a = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("slow", Some(serde_json::json!({"tag": "A"}))).await })
        };
        let b = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("slow", Some(serde_json::json!({"tag": "B"}))).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a["tag"], "A");
        assert_eq!(b["tag"], "B");
        let mut orders = vec![a["order"].as_u64().unwrap(), b["order"].as_u64().unwrap()];
        orders.sort_unstable();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(client.pending_count(), 0);

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_fails_outstanding_requests() {
        let server = MockServer::new();
        let client = Arc::new(
            McpClient::connect("mock", &server.config(), ConnectOptions::default())
                .await
                .unwrap(),
        );

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.request("hang", None).await })
            })
            .collect();

        while client.pending_count() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        client.disconnect().await;

        for waiter in waiters {
            let err = waiter.await.unwrap().unwrap_err();
            assert!(matches!(err, McpError::Terminated { .. }), "{err:?}");
        }
        assert_eq!(client.pending_count(), 0);
        assert!(!client.is_connected());
        assert!(client.exit_code().is_some());

        let late = client.list_tools().await.unwrap_err();
        assert!(late.is_connection_lost());
    }

    #[tokio::test]
    async fn test_request_timeout_when_enabled() {
        let server = MockServer::new();
        let options = ConnectOptions {
            request_timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let client = McpClient::connect("mock", &server.config(), options)
            .await
            .unwrap();

        let err = client.request("hang", None).await.unwrap_err();
        assert!(matches!(err, McpError::Timeout { .. }));
        assert_eq!(client.pending_count(), 0);

        client.disconnect().await;
    }
}
