//! Outstanding-request table for the correlator.
//!
//! Every in-flight request owns one entry keyed by its id, holding a one-shot
//! completion channel. An entry leaves the table exactly once: through a
//! matching response, through the termination sweep, or through its own
//! timeout when one is configured. The sweep and the `closed` marker are
//! updated under the same lock, so a request registered after termination is
//! refused instead of waiting forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::oneshot;

use super::errors::McpError;
use super::types::JsonRpcResponse;

/// Completion handle for one request.
pub type Completion = oneshot::Receiver<Result<serde_json::Value, McpError>>;

/// One in-flight request.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    created_at: Instant,
    tx: oneshot::Sender<Result<serde_json::Value, McpError>>,
}

#[derive(Debug, Default)]
struct PendingState {
    entries: HashMap<String, PendingRequest>,
    /// Set once by the termination sweep. Holds the exit code.
    closed: Option<Option<i32>>,
}

/// Outcome of routing one inbound line.
#[derive(Debug, PartialEq, Eq)]
pub enum Routed {
    /// Delivered to the waiting caller.
    Completed(String),
    /// Parsed, but no request with this id is outstanding.
    UnknownId(String),
    /// Parsed, but carries no id (a server notification or an unattributed error).
    NoId,
    /// Not a JSON-RPC response.
    Malformed(String),
}

/// Concurrency-safe map from request id to completion handle.
#[derive(Debug, Default)]
pub struct PendingRequests {
    state: Mutex<PendingState>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new request id.
    ///
    /// Fails with `Terminated` if the process has already exited.
    pub fn register(&self, id: &str, method: &str) -> Result<Completion, McpError> {
        let mut state = self.lock();
        if let Some(exit_code) = state.closed {
            return Err(McpError::Terminated { exit_code });
        }

        let (tx, rx) = oneshot::channel();
        state.entries.insert(
            id.to_string(),
            PendingRequest {
                method: method.to_string(),
                created_at: Instant::now(),
                tx,
            },
        );
        Ok(rx)
    }

    /// Drop an entry without completing it (write failure or timeout).
    pub fn remove(&self, id: &str) -> bool {
        self.lock().entries.remove(id).is_some()
    }

    /// Complete the entry for `id`. Returns `false` if it was not outstanding.
    pub fn complete(&self, id: &str, outcome: Result<serde_json::Value, McpError>) -> bool {
        let entry = self.lock().entries.remove(id);
        match entry {
            Some(pending) => {
                tracing::debug!(
                    id,
                    method = %pending.method,
                    elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
                    "request completed"
                );
                // The caller may have stopped waiting; nothing to do then.
                let _ = pending.tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Parse one inbound line and complete the matching request.
    pub fn route_line(&self, line: &str) -> Routed {
        let response: JsonRpcResponse = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => return Routed::Malformed(e.to_string()),
        };

        let Some(id) = response.id.clone() else {
            return Routed::NoId;
        };

        if self.complete(&id, response.into_outcome()) {
            Routed::Completed(id)
        } else {
            Routed::UnknownId(id)
        }
    }

    /// Fail every outstanding request with `Terminated` and refuse new ones.
    ///
    /// Returns how many requests were failed. A second call fails nothing.
    pub fn terminate(&self, exit_code: Option<i32>) -> usize {
        let drained: Vec<(String, PendingRequest)> = {
            let mut state = self.lock();
            if state.closed.is_some() {
                return 0;
            }
            state.closed = Some(exit_code);
            state.entries.drain().collect()
        };

        let count = drained.len();
        for (id, pending) in drained {
            tracing::debug!(id = %id, method = %pending.method, "failing request on termination");
            let _ = pending.tx.send(Err(McpError::Terminated { exit_code }));
        }
        count
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exit code recorded by the termination sweep, if it ran.
    pub fn closed(&self) -> Option<Option<i32>> {
        self.lock().closed
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
