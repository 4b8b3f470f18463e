//! ConversationBuffer: bounded, ordered message history.
//!
//! Responsibilities:
//! - Append messages in arrival order
//! - Enforce the message cap by evicting the oldest non-system messages
//! - Hand out owned snapshots for model requests
//! - Export/import history as a JSON array of message records
//!
//! System messages are never evicted. After eviction they always precede the
//! retained non-system messages, whose relative order is unchanged.

use super::errors::AgentError;
use super::types::{ConversationMessage, Role};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Default message cap.
pub const DEFAULT_MAX_MESSAGES: usize = 20;

// ─── ConversationBuffer ─────────────────────────────────────────────────────

/// Bounded conversation history.
#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    messages: Vec<ConversationMessage>,
    max_messages: usize,
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl ConversationBuffer {
    /// Create an empty buffer holding at most `max_messages` messages.
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    /// Append a message, evicting if the cap is exceeded.
    pub fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message);
        if self.messages.len() > self.max_messages {
            self.evict();
        }
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.append(ConversationMessage::system(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.append(ConversationMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.append(ConversationMessage::assistant(content));
    }

    /// Append a tool-role message answering call `correlation_id`.
    pub fn push_tool_result(
        &mut self,
        correlation_id: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.append(ConversationMessage::tool(correlation_id, content));
    }

    /// Owned copy of the current history.
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    /// Borrow the current history.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Change the cap. Shrinking evicts immediately.
    pub fn set_max_messages(&mut self, max_messages: usize) {
        self.max_messages = max_messages;
        if self.messages.len() > self.max_messages {
            self.evict();
        }
    }

    /// Drop every message, system messages included.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Export as a pretty-printed JSON array of `{role, content, correlation_id?}`.
    pub fn serialize(&self) -> Result<String, AgentError> {
        Ok(serde_json::to_string_pretty(&self.messages)?)
    }

    /// Replace the history with `data`.
    ///
    /// Fails with `InvalidConversation` unless `data` is a JSON array of
    /// message records; the buffer is left untouched on failure. The cap
    /// applies to imported data as well.
    pub fn deserialize(&mut self, data: &str) -> Result<(), AgentError> {
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| AgentError::InvalidConversation {
                reason: format!("not valid JSON: {e}"),
            })?;

        if !value.is_array() {
            return Err(AgentError::InvalidConversation {
                reason: "expected an array of messages".into(),
            });
        }

        let messages: Vec<ConversationMessage> =
            serde_json::from_value(value).map_err(|e| AgentError::InvalidConversation {
                reason: format!("invalid message record: {e}"),
            })?;

        tracing::debug!(count = messages.len(), "conversation imported");
        self.messages = messages;
        if self.messages.len() > self.max_messages {
            self.evict();
        }
        Ok(())
    }

    // ─── Eviction ───────────────────────────────────────────────────────

    fn evict(&mut self) {
        let before = self.messages.len();
        let (system, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.messages)
            .into_iter()
            .partition(|m| m.role == Role::System);

        if system.len() >= self.max_messages {
            tracing::warn!(
                system_messages = system.len(),
                max_messages = self.max_messages,
                "system messages fill the buffer; dropping all other history"
            );
        }

        let keep = self.max_messages.saturating_sub(system.len());
        let skip = rest.len().saturating_sub(keep);

        self.messages = system;
        self.messages.extend(rest.into_iter().skip(skip));

        tracing::debug!(
            evicted = before - self.messages.len(),
            retained = self.messages.len(),
            "conversation evicted"
        );
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(buffer: &ConversationBuffer) -> Vec<&str> {
        buffer.messages().iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_append_under_cap_keeps_everything() {
        let mut buffer = ConversationBuffer::new(5);
        buffer.push_user("a");
        buffer.push_assistant("b");
        assert_eq!(buffer.len(), 2);
        assert_eq!(contents(&buffer), vec!["a", "b"]);
    }

    #[test]
    fn test_eviction_keeps_system_and_latest() {
        let mut buffer = ConversationBuffer::new(5);
        buffer.push_system("s1");
        buffer.push_system("s2");
        for i in 0..10 {
            buffer.push_user(format!("u{i}"));
        }

        assert_eq!(buffer.len(), 5);
        assert_eq!(contents(&buffer), vec!["s1", "s2", "u7", "u8", "u9"]);
    }

    #[test]
    fn test_system_messages_move_to_front() {
        let mut buffer = ConversationBuffer::new(3);
        buffer.push_user("u1");
        buffer.push_system("s");
        buffer.push_user("u2");
        buffer.push_assistant("a1");

        assert_eq!(contents(&buffer), vec!["s", "u2", "a1"]);
    }

    #[test]
    fn test_system_count_equal_to_max_drops_other_history() {
        let mut buffer = ConversationBuffer::new(2);
        buffer.push_system("s1");
        buffer.push_system("s2");
        buffer.push_user("hello");

        assert_eq!(contents(&buffer), vec!["s1", "s2"]);
    }

    #[test]
    fn test_system_count_above_max_keeps_all_system() {
        let mut buffer = ConversationBuffer::new(2);
        buffer.push_system("s1");
        buffer.push_system("s2");
        buffer.push_system("s3");
        assert_eq!(contents(&buffer), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut buffer = ConversationBuffer::new(5);
        buffer.push_user("first");
        let snap = buffer.snapshot();
        buffer.push_user("second");
        buffer.clear();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].content, "first");
    }

    #[test]
    fn test_shrinking_cap_evicts() {
        let mut buffer = ConversationBuffer::default();
        assert_eq!(buffer.max_messages(), DEFAULT_MAX_MESSAGES);
        for i in 0..6 {
            buffer.push_user(format!("u{i}"));
        }
        buffer.set_max_messages(2);
        assert_eq!(contents(&buffer), vec!["u4", "u5"]);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut buffer = ConversationBuffer::new(10);
        buffer.push_system("be brief");
        buffer.push_user("list files");
        buffer.push_tool_result("call-1", "[]");

        let json = buffer.serialize().unwrap();
        assert!(json.contains("\"correlation_id\": \"call-1\""));
        assert!(!json.contains("\"correlation_id\": null"));

        let mut restored = ConversationBuffer::new(10);
        restored.push_user("stale");
        restored.deserialize(&json).unwrap();
        assert_eq!(restored.snapshot(), buffer.snapshot());
    }

    #[test]
    fn test_deserialize_accepts_tool_call_id_alias() {
        let mut buffer = ConversationBuffer::new(10);
        buffer
            .deserialize(r#"[{"role":"tool","content":"ok","tool_call_id":"c9"}]"#)
            .unwrap();
        assert_eq!(buffer.messages()[0].correlation_id.as_deref(), Some("c9"));
    }

    #[test]
    fn test_deserialize_rejects_non_array() {
        let mut buffer = ConversationBuffer::new(10);
        buffer.push_user("keep me");

        for bad in [r#"{"role":"user","content":"x"}"#, "not json", "42"] {
            let err = buffer.deserialize(bad).unwrap_err();
            assert!(matches!(err, AgentError::InvalidConversation { .. }), "{bad}");
        }
        assert_eq!(contents(&buffer), vec!["keep me"]);
    }

    #[test]
    fn test_deserialize_rejects_bad_records() {
        let mut buffer = ConversationBuffer::new(10);
        let err = buffer
            .deserialize(r#"[{"role":"wizard","content":"x"}]"#)
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidConversation { .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_deserialize_applies_cap() {
        let mut buffer = ConversationBuffer::new(2);
        buffer
            .deserialize(
                r#"[{"role":"system","content":"s"},
                    {"role":"user","content":"u1"},
                    {"role":"user","content":"u2"}]"#,
            )
            .unwrap();
        assert_eq!(contents(&buffer), vec!["s", "u2"]);
    }
}
