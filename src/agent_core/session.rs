//! AgentSession: drives one conversation through the model and the tools.
//!
//! A turn pushes the user message, then alternates model calls and tool
//! dispatch until the model answers without requesting tools. Tool results
//! are fed back as tool-role messages correlated by call id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;

use super::conversation::ConversationBuffer;
use super::errors::AgentError;
use super::registry::CapabilityRegistry;
use super::types::{ConversationMessage, ToolCallRequest, ToolDefinition, ToolExecutionResult};

// ─── Model Service ──────────────────────────────────────────────────────────

/// Input to one model completion.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub messages: Vec<ConversationMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// One model completion: free text, tool calls, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    /// A plain text answer with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A response requesting the given tool calls.
    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

/// Chat-completion backend. The HTTP client lives outside this crate.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> anyhow::Result<ModelResponse>;
}

// ─── Session ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Tool rounds allowed per turn before giving up.
    pub max_tool_rounds: usize,
    /// Dispatch each batch with `dispatch_concurrent` instead of `dispatch`.
    pub parallel_tool_calls: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            parallel_tool_calls: false,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            parallel_tool_calls: config.parallel_tool_calls,
        }
    }
}

/// Result of one `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final assistant text.
    pub reply: String,
    /// Tool rounds executed before the final answer.
    pub tool_rounds: usize,
    /// Every tool result produced during the turn, in execution order.
    pub tool_results: Vec<ToolExecutionResult>,
}

pub struct AgentSession {
    model: Arc<dyn ModelService>,
    registry: Arc<CapabilityRegistry>,
    conversation: ConversationBuffer,
    options: SessionOptions,
}

impl AgentSession {
    pub fn new(
        model: Arc<dyn ModelService>,
        registry: Arc<CapabilityRegistry>,
        conversation: ConversationBuffer,
        options: SessionOptions,
    ) -> Self {
        Self {
            model,
            registry,
            conversation,
            options,
        }
    }

    pub fn conversation(&self) -> &ConversationBuffer {
        &self.conversation
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Run one user turn to completion.
    pub async fn send(&mut self, user_text: &str) -> Result<TurnOutcome, AgentError> {
        self.conversation.push_user(user_text);
        let tools = self.registry.describe();
        let mut tool_results = Vec::new();

        for round in 0..=self.options.max_tool_rounds {
            let request = ModelRequest {
                messages: self.conversation.snapshot(),
                tools: tools.clone(),
            };
            tracing::debug!(
                round,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "requesting completion"
            );

            let response = self
                .model
                .complete(request)
                .await
                .map_err(|e| AgentError::ModelError {
                    reason: format!("{e:#}"),
                })?;

            if response.tool_calls.is_empty() {
                self.conversation.push_assistant(response.content.clone());
                return Ok(TurnOutcome {
                    reply: response.content,
                    tool_rounds: round,
                    tool_results,
                });
            }

            if round == self.options.max_tool_rounds {
                tracing::warn!(
                    limit = self.options.max_tool_rounds,
                    "model still requesting tools at round limit"
                );
                break;
            }

            if !response.content.is_empty() {
                self.conversation.push_assistant(response.content);
            }

            let results = if self.options.parallel_tool_calls {
                self.registry.dispatch_concurrent(&response.tool_calls).await
            } else {
                self.registry.dispatch(&response.tool_calls).await
            };

            tracing::info!(
                round,
                calls = response.tool_calls.len(),
                failed = results.iter().filter(|r| r.is_error()).count(),
                "tool round complete"
            );

            for (call, result) in response.tool_calls.iter().zip(&results) {
                self.conversation
                    .push_tool_result(call.id.as_str(), result.to_message_content());
            }
            tool_results.extend(results);
        }

        Err(AgentError::ToolRoundLimit {
            limit: self.options.max_tool_rounds,
        })
    }

    /// Serialize the conversation history.
    pub fn export_conversation(&self) -> Result<String, AgentError> {
        self.conversation.serialize()
    }

    /// Replace the conversation history.
    pub fn import_conversation(&mut self, data: &str) -> Result<(), AgentError> {
        self.conversation.deserialize(data)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
