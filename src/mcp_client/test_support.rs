//! Scripted MCP server for process-level tests.
//!
//! A POSIX `sh` script that speaks just enough of the protocol: it extracts
//! `id` and `method` with `sed` (relying on our field order on the wire) and
//! answers from a fixed table.

use std::path::PathBuf;

use tempfile::TempDir;

use super::types::ServerConfig;

const MOCK_SERVER: &str = r#"#!/bin/sh
held=""
held_tag=""
respond() { printf '{"jsonrpc":"2.0","id":"%s","result":%s}\n' "$1" "$2"; }
fail() { printf '{"jsonrpc":"2.0","id":"%s","error":{"code":%s,"message":"%s"}}\n' "$1" "$2" "$3"; }

while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":"\([^"]*\)".*/\1/p')
  method=$(printf '%s\n' "$line" | sed -n \
    -e 's/^{"jsonrpc":"2.0","id":"[^"]*","method":"\([^"]*\)".*/\1/p' \
    -e 's/^{"jsonrpc":"2.0","method":"\([^"]*\)".*/\1/p')
  echo "mock got $method" >&2

  case "$method" in
    initialize)
      respond "$id" '{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"mock","version":"0.1.0"}}' ;;
    initialized)
      if [ -n "$id" ]; then respond "$id" '{}'; fi ;;
    tools/list)
      respond "$id" '{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","properties":{"text":{"type":"string"}},"required":["text"]}},{"name":"plain","description":"Plain string result","inputSchema":{"type":"object","properties":{}}},{"name":"fail","description":"Always fails","inputSchema":{"type":"object","properties":{}}}]}' ;;
    tools/call)
      tool=$(printf '%s\n' "$line" | sed -n 's/.*"name":"\([^"]*\)"}}$/\1/p')
      case "$tool" in
        echo) respond "$id" '{"content":[{"type":"text","text":"echoed"}]}' ;;
        plain) respond "$id" '"plain text"' ;;
        *) fail "$id" -32000 "tool $tool exploded" ;;
      esac ;;
    resources/list)
      respond "$id" '{"resources":[{"uri":"file:///readme","name":"readme","mimeType":"text/plain"}]}' ;;
    resources/read)
      respond "$id" '{"contents":[{"uri":"file:///readme","text":"hello"}]}' ;;
    slow)
      tag=$(printf '%s\n' "$line" | sed -n 's/.*"tag":"\([^"]*\)".*/\1/p')
      if [ -z "$held" ]; then
        held="$id"
        held_tag="$tag"
      else
        respond "$id" "{\"order\":1,\"tag\":\"$tag\"}"
        respond "$held" "{\"order\":2,\"tag\":\"$held_tag\"}"
        held=""
      fi ;;
    hang) ;;
    *)
      if [ -n "$id" ]; then fail "$id" -32601 "Method not found"; fi ;;
  esac
done
"#;

/// A mock server script on disk. Dropping it removes the script.
pub struct MockServer {
    _dir: TempDir,
    path: PathBuf,
}

impl MockServer {
    /// The standard scripted server.
    pub fn new() -> Self {
        Self::with_script(MOCK_SERVER)
    }

    /// A server running an arbitrary `sh` script body.
    pub fn with_script(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.sh");
        std::fs::write(&path, script).unwrap();
        Self { _dir: dir, path }
    }

    /// Launch config for this server.
    pub fn config(&self) -> ServerConfig {
        ServerConfig::new("sh", &[self.path.to_str().unwrap()])
    }
}
