//! Shared types for the agent core.
//!
//! Conversation messages, tool definitions, and the tool-call request/result
//! pair exchanged between the model driver and the capability registry.

use serde::{Deserialize, Serialize};

// ─── Conversation Messages ──────────────────────────────────────────────────

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in conversation history.
///
/// Persisted as `{role, content, correlation_id?}`. `tool_call_id` is
/// accepted on input as an alias for `correlation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// For `tool` role: the id of the tool call this result answers.
    #[serde(
        default,
        alias = "tool_call_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<String>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            correlation_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A tool result correlated with the call that produced it.
    pub fn tool(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            correlation_id: Some(correlation_id.into()),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

// ─── Tools ──────────────────────────────────────────────────────────────────

/// Name, description, and JSON-Schema parameters of one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Parameter names listed in the schema's `required` array.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// OpenAI function-calling envelope.
    pub fn to_openai(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// One tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call id assigned by the model; may be empty.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded argument string, exactly as the model produced it.
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// Result of one tool call. Exactly one per request, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub name: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolExecutionResult {
    pub fn success(name: &str, output: String) -> Self {
        Self {
            name: name.to_string(),
            output,
            error: None,
        }
    }

    pub fn failure(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            output: String::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Text fed back to the model as the tool-role message.
    pub fn to_message_content(&self) -> String {
        match &self.error {
            Some(err) => format!("Error: {err}"),
            None => self.output.clone(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ConversationMessage::assistant("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_tool_message_carries_correlation_id() {
        let msg = ConversationMessage::tool("call_1", "done");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["correlation_id"], "call_1");
    }

    #[test]
    fn test_tool_call_id_alias_accepted() {
        let msg: ConversationMessage =
            serde_json::from_str(r#"{"role":"tool","content":"x","tool_call_id":"c9"}"#).unwrap();
        assert_eq!(msg.correlation_id.as_deref(), Some("c9"));
    }

    #[test]
    fn test_required_parameters() {
        let def = ToolDefinition::new(
            "filesystem",
            "fs",
            serde_json::json!({"type": "object", "required": ["operation", "path"]}),
        );
        assert_eq!(def.required_parameters(), vec!["operation", "path"]);

        let bare = ToolDefinition::new("noop", "", serde_json::json!({"type": "object"}));
        assert!(bare.required_parameters().is_empty());
    }

    #[test]
    fn test_to_openai_envelope() {
        let def = ToolDefinition::new("shell", "Run", serde_json::json!({"type": "object"}));
        let v = def.to_openai();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "shell");
    }

    #[test]
    fn test_result_message_content() {
        assert_eq!(
            ToolExecutionResult::success("a", "ok".into()).to_message_content(),
            "ok"
        );
        assert_eq!(
            ToolExecutionResult::failure("a", "boom".into()).to_message_content(),
            "Error: boom"
        );
    }
}
