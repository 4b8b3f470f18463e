//! The `Capability` trait: one invocable tool, local or remote.

use async_trait::async_trait;

use super::types::ToolDefinition;

/// A named, schema-described operation the model can invoke.
///
/// The registry validates arguments against `definition().parameters`
/// before calling `execute`, so implementations may assume every
/// `required` parameter is present.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name, description, and parameter schema. Must not change after
    /// registration.
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Run the tool with decoded arguments.
    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<String>;
}
