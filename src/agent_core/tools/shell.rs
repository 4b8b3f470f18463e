//! `shell` tool: run a command through `sh -c`.
//!
//! Failures are reported to the model as output text, not as errors, so it
//! can read the message and try something else.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::agent_core::capability::Capability;
use crate::agent_core::types::ToolDefinition;

#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    cwd: Option<String>,
    /// Milliseconds.
    #[serde(default)]
    timeout: Option<u64>,
}

pub struct ShellTool {
    definition: ToolDefinition,
    default_timeout: Duration,
}

impl ShellTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            definition: ToolDefinition::new(
                "shell",
                "Execute shell commands",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "The shell command to execute"
                        },
                        "cwd": {
                            "type": "string",
                            "description": "Working directory for the command"
                        },
                        "timeout": {
                            "type": "number",
                            "description": "Command timeout in milliseconds"
                        }
                    },
                    "required": ["command"]
                }),
            ),
            default_timeout,
        }
    }
}

#[async_trait]
impl Capability for ShellTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<String> {
        let args: ShellArgs = serde_json::from_value(args)?;
        let timeout = args
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&args.command);
        if let Some(dir) = args.cwd.as_deref() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(command = %args.command, timeout_ms = timeout.as_millis() as u64, "running shell command");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Ok(format!("Command failed: {e}")),
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(format!("Command failed: {e}")),
            Err(_) => {
                return Ok(format!(
                    "Command failed: timed out after {}ms",
                    timeout.as_millis()
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Ok(format!("Command failed: {}\n{stderr}", output.status));
        }
        if stdout.is_empty() && !stderr.is_empty() {
            return Ok(format!("Error: {stderr}"));
        }
        if stderr.is_empty() {
            Ok(stdout.into_owned())
        } else {
            Ok(format!("{stdout}\nWarnings: {stderr}"))
        }
    }
}
