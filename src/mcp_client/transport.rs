//! JSON-RPC over stdio transport.
//!
//! Handles low-level communication with MCP server child processes:
//! - Spawning the process with piped stdin/stdout/stderr
//! - Writing one JSON line per outgoing message to stdin
//! - Framing stdout into lines and forwarding them as events
//! - Surfacing stderr as diagnostics only
//! - Reporting process exit after the last stdout line has been delivered

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::errors::McpError;
use super::framing::LineFramer;
use super::types::ServerConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Read buffer size for child stdout.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long the exit watcher waits for a pipe to drain after the process
/// exits. A grandchild holding the pipe open must not delay `Closed` forever.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ─── Events ──────────────────────────────────────────────────────────────────

/// Everything the transport reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete stdout line.
    Message(String),
    /// One stderr line. Never parsed as protocol.
    Diagnostic(String),
    /// The process exited. Always the last event.
    Closed(Option<i32>),
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Bi-directional line transport over a child process's stdio.
pub struct StdioTransport {
    server_name: String,
    writer: Mutex<Option<ChildStdin>>,
    kill_tx: StdMutex<Option<oneshot::Sender<()>>>,
    pid: Option<u32>,
}

impl StdioTransport {
    /// Spawn the server process and start its reader and exit-watcher tasks.
    ///
    /// Events are delivered on `events` in order; `Closed` comes last.
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        server_name: &str,
        config: &ServerConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, McpError> {
        if config.command.trim().is_empty() {
            return Err(McpError::ConfigError {
                reason: format!("server '{server_name}' has an empty command"),
            });
        }

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(dir) = config.cwd.as_deref() {
            cmd.current_dir(dir);
        }

        // Windows: prevent console window from appearing for child processes
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: format!("{}: {e}", config.command),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: "failed to capture stdout".into(),
        })?;
        let stderr = child.stderr.take();

        let pid = child.id();
        tracing::info!(server = server_name, pid, command = %config.command, "spawned server process");

        let stdout_task = tokio::spawn(read_stdout(
            server_name.to_string(),
            stdout,
            events.clone(),
        ));
        let stderr_task = stderr.map(|stderr| {
            tokio::spawn(read_stderr(server_name.to_string(), stderr, events.clone()))
        });

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch_exit(
            server_name.to_string(),
            child,
            kill_rx,
            stdout_task,
            stderr_task,
            events,
        ));

        Ok(Self {
            server_name: server_name.to_string(),
            writer: Mutex::new(Some(stdin)),
            kill_tx: StdMutex::new(Some(kill_tx)),
            pid,
        })
    }

    /// Name of the server this transport talks to.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// OS process id, if the process was still running at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Write one message followed by a newline and flush.
    pub async fn send(&self, message: &str) -> Result<(), McpError> {
        if !self.is_open() {
            return Err(McpError::NotConnected {
                name: self.server_name.clone(),
            });
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| McpError::NotConnected {
            name: self.server_name.clone(),
        })?;

        let mut line = String::with_capacity(message.len() + 1);
        line.push_str(message);
        line.push('\n');

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::TransportError {
                server: self.server_name.clone(),
                reason: format!("failed to write to stdin: {e}"),
            })?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::TransportError {
                server: self.server_name.clone(),
                reason: format!("failed to flush stdin: {e}"),
            })?;
        Ok(())
    }

    /// Kill the process and release stdin. Calling it again is a no-op.
    pub async fn disconnect(&self) {
        let kill_tx = self
            .kill_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(kill_tx) = kill_tx else {
            return;
        };

        tracing::info!(server = %self.server_name, "disconnecting server process");
        // The watcher may already be gone if the process exited on its own.
        let _ = kill_tx.send(());

        // A writer blocked on a full pipe holds the lock until the kill makes
        // its write fail. Later sends are refused by the open check.
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
    }

    /// Whether `disconnect` has not been called yet.
    ///
    /// This does not observe the process exiting by itself; the correlator
    /// tracks that through `TransportEvent::Closed`.
    pub fn is_open(&self) -> bool {
        self.kill_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

// ─── Background Tasks ────────────────────────────────────────────────────────

/// Read raw stdout chunks, frame them, and forward complete lines.
async fn read_stdout(
    server_name: String,
    mut stdout: ChildStdout,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    if events.send(TransportEvent::Message(line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(server = %server_name, error = %e, "stdout read failed");
                break;
            }
        }
    }

    if let Some(rest) = framer.take_remainder() {
        tracing::warn!(
            server = %server_name,
            bytes = rest.len(),
            "dropping unterminated line at end of stdout"
        );
    }
}

/// Forward stderr lines as diagnostics.
///
/// Framed like stdout, so invalid UTF-8 is decoded lossily instead of ending
/// the reader. The pipe is drained until EOF: dropping it early would kill
/// the child with SIGPIPE on its next write.
async fn read_stderr(
    server_name: String,
    mut stderr: ChildStderr,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut forwarding = true;

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    if forwarding && events.send(TransportEvent::Diagnostic(line)).is_err() {
                        forwarding = false;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(server = %server_name, error = %e, "stderr read failed");
                break;
            }
        }
    }

    if let Some(rest) = framer.take_remainder() {
        if forwarding {
            let _ = events.send(TransportEvent::Diagnostic(rest));
        }
    }
}

/// Own the child: wait for exit (or kill on request), then emit `Closed`.
async fn watch_exit(
    server_name: String,
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    stdout_task: JoinHandle<()>,
    stderr_task: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                tracing::warn!(server = %server_name, error = %e, "failed to kill server process");
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!(server = %server_name, error = %e, "failed to collect exit status");
            None
        }
    };

    // Deliver every stdout and stderr line before announcing the exit.
    for task in std::iter::once(stdout_task).chain(stderr_task) {
        let abort = task.abort_handle();
        if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, task).await.is_err() {
            tracing::warn!(server = %server_name, "pipe still open after exit; abandoning reader");
            abort.abort();
        }
    }

    tracing::info!(server = %server_name, exit_code = ?code, "server process exited");
    let _ = events.send(TransportEvent::Closed(code));
}

// ─── Tests ───────────────────────────────────────────────────────────────────
