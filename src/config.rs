//! Runtime configuration: conversation limits, tool settings, and the MCP
//! servers to launch.
//!
//! Loaded from YAML. String values may reference environment variables as
//! `${VAR}` or `${VAR:-default}`; a leading `~` in a default, a server `cwd`,
//! or a server `command` expands to the home directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::agent_core::conversation::{ConversationBuffer, DEFAULT_MAX_MESSAGES};
use crate::agent_core::errors::AgentError;
use crate::mcp_client::client::{ConnectOptions, InitializedSignal};
use crate::mcp_client::types::ServerConfig;

/// Env var naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TOOLBRIDGE_CONFIG";

// ─── RuntimeConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Seeded as the first system message of every conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default)]
    pub parallel_tool_calls: bool,
    /// Per-request timeout for MCP calls. Absent means wait indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Send `initialized` as a request instead of a notification.
    #[serde(default)]
    pub initialized_as_request: bool,
    #[serde(default = "default_shell_timeout_ms")]
    pub shell_timeout_ms: u64,
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_shell_timeout_ms() -> u64 {
    30_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_messages: default_max_messages(),
            max_tool_rounds: default_max_tool_rounds(),
            parallel_tool_calls: false,
            request_timeout_ms: None,
            initialized_as_request: false,
            shell_timeout_ms: default_shell_timeout_ms(),
            servers: HashMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_messages == 0 {
            return Err(AgentError::ConfigError {
                reason: "max_messages must be at least 1".into(),
            });
        }
        if let Some((name, _)) = self
            .servers
            .iter()
            .find(|(_, server)| server.command.trim().is_empty())
        {
            return Err(AgentError::ConfigError {
                reason: format!("server '{name}' has an empty command"),
            });
        }
        Ok(())
    }

    /// Options for connecting every configured server.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            initialized_signal: if self.initialized_as_request {
                InitializedSignal::Request
            } else {
                InitializedSignal::Notification
            },
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
        }
    }

    /// An empty conversation seeded with the system prompt, if any.
    pub fn conversation(&self) -> ConversationBuffer {
        let mut buffer = ConversationBuffer::new(self.max_messages);
        if let Some(prompt) = self.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            buffer.push_system(prompt);
        }
        buffer
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Checks `TOOLBRIDGE_CONFIG` first, then `~/.toolbridge/config.yaml`.
pub fn find_config_path() -> Result<PathBuf, AgentError> {
    // 1. Check env var
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(candidate);
        }
        return Err(AgentError::ConfigError {
            reason: format!("{CONFIG_ENV_VAR} points to missing file {}", candidate.display()),
        });
    }

    // 2. Home directory
    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(".toolbridge").join("config.yaml");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(AgentError::ConfigError {
        reason: "could not find ~/.toolbridge/config.yaml".into(),
    })
}

/// Load, interpolate, and validate a config file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, AgentError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    let config = parse_config(&raw)?;
    tracing::info!(
        path = %path.display(),
        servers = config.servers.len(),
        "config loaded"
    );
    Ok(config)
}

/// Parse config YAML text.
pub fn parse_config(raw: &str) -> Result<RuntimeConfig, AgentError> {
    let interpolated = interpolate_env_vars(raw);

    let mut config: RuntimeConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    for server in config.servers.values_mut() {
        server.command = expand_tilde(&server.command);
        if let Some(cwd) = server.cwd.as_mut() {
            *cwd = expand_tilde(cwd);
        }
    }

    config.validate()?;
    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();
        let expr: String = chars.by_ref().take_while(|c| *c != '}').collect();
        result.push_str(&resolve_var_expr(&expr));
    }

    result
}

/// Resolve `VAR` or `VAR:-default`. Unset without a default is empty.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.max_messages, 20);
        assert_eq!(config.max_tool_rounds, 8);
        assert_eq!(config.shell_timeout_ms, 30_000);
        assert!(!config.parallel_tool_calls);
        assert!(config.servers.is_empty());

        let options = config.connect_options();
        assert_eq!(options.initialized_signal, InitializedSignal::Notification);
        assert!(options.request_timeout.is_none());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
system_prompt: "You are a helpful assistant."
max_messages: 10
parallel_tool_calls: true
request_timeout_ms: 5000
initialized_as_request: true
servers:
  files:
    command: node
    args: ["server.js", "--stdio"]
    env:
      LOG_LEVEL: debug
    cwd: /srv/files
"#;
        let config = parse_config(yaml).unwrap();
        let files = &config.servers["files"];
        assert_eq!(files.command, "node");
        assert_eq!(files.args, vec!["server.js", "--stdio"]);
        assert_eq!(files.env["LOG_LEVEL"], "debug");
        assert_eq!(files.cwd.as_deref(), Some("/srv/files"));

        let options = config.connect_options();
        assert_eq!(options.initialized_signal, InitializedSignal::Request);
        assert_eq!(options.request_timeout, Some(Duration::from_millis(5000)));

        let buffer = config.conversation();
        assert_eq!(buffer.max_messages(), 10);
        assert_eq!(buffer.len(), 1);
        assert!(buffer.messages()[0].is_system());
    }

    #[test]
    fn test_env_interpolation_in_yaml() {
        std::env::set_var("__TOOLBRIDGE_TEST_CMD__", "/opt/bin/server");
        std::env::remove_var("__TOOLBRIDGE_TEST_UNSET__");
        let yaml = r#"
servers:
  a:
    command: ${__TOOLBRIDGE_TEST_CMD__}
    cwd: ${__TOOLBRIDGE_TEST_UNSET__:-/tmp/fallback}
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.servers["a"].command, "/opt/bin/server");
        assert_eq!(config.servers["a"].cwd.as_deref(), Some("/tmp/fallback"));
        std::env::remove_var("__TOOLBRIDGE_TEST_CMD__");
    }

    #[test]
    fn test_tilde_in_cwd_is_expanded() {
        let config = parse_config("servers:\n  a:\n    command: x\n    cwd: ~/work\n").unwrap();
        let cwd = config.servers["a"].cwd.clone().unwrap();
        assert!(!cwd.starts_with('~'));
        assert!(cwd.ends_with("/work"));
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            parse_config("max_messages: 0"),
            Err(AgentError::ConfigError { .. })
        ));
        assert!(matches!(
            parse_config("servers:\n  a:\n    command: \"\"\n"),
            Err(AgentError::ConfigError { .. })
        ));
        assert!(matches!(
            parse_config("max_messages: [nope"),
            Err(AgentError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "max_tool_rounds: 3\n").unwrap();
        assert_eq!(load_config(&path).unwrap().max_tool_rounds, 3);

        let missing = load_config(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(missing.to_string().contains("failed to read"));
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_resolve_unset_without_default_is_empty() {
        std::env::remove_var("__TOOLBRIDGE_TEST_NOTHING__");
        assert_eq!(resolve_var_expr("__TOOLBRIDGE_TEST_NOTHING__"), "");
    }
}
