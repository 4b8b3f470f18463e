//! Capability registry: the directory of invocable tools and the dispatch
//! boundary that isolates per-call failures.
//!
//! `dispatch` never fails: every request yields exactly one
//! `ToolExecutionResult`, in request order. Unknown tools, malformed argument
//! strings, missing required parameters, and execution errors all become the
//! `error` field of that call's result.

use std::collections::HashMap;
use std::sync::Arc;

use super::capability::Capability;
use super::errors::DispatchError;
use super::types::{ToolCallRequest, ToolDefinition, ToolExecutionResult};

// ─── CapabilityRegistry ─────────────────────────────────────────────────────

/// Registered capabilities, kept in registration order.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    /// Names in registration order.
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. An existing one with the same name is replaced
    /// in place, keeping its position.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if self.tools.insert(name.clone(), capability).is_some() {
            tracing::debug!(tool = %name, "replaced existing capability");
        } else {
            self.order.push(name);
        }
    }

    /// Remove a capability. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        if self.tools.remove(name).is_some() {
            self.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.tools.get(name).cloned()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|n| n.as_str()).collect()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of every capability, in registration order.
    pub fn describe(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Definitions in OpenAI function-calling format.
    ///
    /// Used to populate the `tools` field in chat completion requests.
    pub fn to_openai_tools(&self) -> Vec<serde_json::Value> {
        self.describe().iter().map(ToolDefinition::to_openai).collect()
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Dispatch a batch of tool calls one after another.
    pub async fn dispatch(&self, calls: &[ToolCallRequest]) -> Vec<ToolExecutionResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.dispatch_single(call).await);
        }
        results
    }

    /// Dispatch a batch with overlapping execution.
    ///
    /// All calls are polled together; results still follow request order.
    pub async fn dispatch_concurrent(&self, calls: &[ToolCallRequest]) -> Vec<ToolExecutionResult> {
        futures::future::join_all(calls.iter().map(|call| self.dispatch_single(call))).await
    }

    /// Dispatch one call: resolve → decode → validate → execute.
    pub async fn dispatch_single(&self, call: &ToolCallRequest) -> ToolExecutionResult {
        match self.try_dispatch(call).await {
            Ok(output) => {
                tracing::debug!(tool = %call.name, id = %call.id, "tool call succeeded");
                ToolExecutionResult::success(&call.name, output)
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, id = %call.id, error = %e, "tool call failed");
                ToolExecutionResult::failure(&call.name, e.to_string())
            }
        }
    }

    async fn try_dispatch(&self, call: &ToolCallRequest) -> Result<String, DispatchError> {
        // 1. Resolve
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| DispatchError::CapabilityNotFound {
                name: call.name.clone(),
            })?;

        // 2. Decode
        let args: serde_json::Value =
            serde_json::from_str(&call.arguments).map_err(|e| DispatchError::MalformedArguments {
                tool: call.name.clone(),
                reason: e.to_string(),
            })?;

        // 3. Validate
        validate_arguments(tool.definition(), &args)?;

        // 4. Execute
        tool.execute(args)
            .await
            .map_err(|e| DispatchError::ExecutionFailed {
                tool: call.name.clone(),
                reason: format!("{e:#}"),
            })
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

/// Check that every `required` parameter is present in `args`.
///
/// Only presence is checked. Type validation is left to the capability.
pub fn validate_arguments(
    definition: &ToolDefinition,
    args: &serde_json::Value,
) -> Result<(), DispatchError> {
    let obj = args.as_object();
    for field in definition.required_parameters() {
        let present = obj.map(|o| o.contains_key(field)).unwrap_or(false);
        if !present {
            return Err(DispatchError::MissingParameter {
                tool: definition.name.clone(),
                parameter: field.to_string(),
            });
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
