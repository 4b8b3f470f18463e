//! Built-in local capabilities.

mod filesystem;
mod shell;

use std::sync::Arc;
use std::time::Duration;

use crate::config::RuntimeConfig;

use super::registry::CapabilityRegistry;

pub use filesystem::FileSystemTool;
pub use shell::ShellTool;

/// Register the built-in `filesystem` and `shell` tools.
pub fn register_default_tools(registry: &mut CapabilityRegistry, config: &RuntimeConfig) {
    registry.register(Arc::new(FileSystemTool::new()));
    registry.register(Arc::new(ShellTool::new(Duration::from_millis(
        config.shell_timeout_ms,
    ))));
    tracing::debug!(count = 2, "registered built-in tools");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_default_tools() {
        let mut registry = CapabilityRegistry::new();
        register_default_tools(&mut registry, &RuntimeConfig::default());
        assert_eq!(registry.names(), vec!["filesystem", "shell"]);

        let fs = registry.get("filesystem").unwrap();
        assert_eq!(
            fs.definition().required_parameters(),
            vec!["operation", "path"]
        );
    }
}
