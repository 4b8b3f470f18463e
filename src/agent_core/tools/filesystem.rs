//! `filesystem` tool: read, write, list, delete, and create paths.

use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent_core::capability::Capability;
use crate::agent_core::types::ToolDefinition;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Read,
    Write,
    List,
    Delete,
    Mkdir,
}

#[derive(Debug, Deserialize)]
struct FileSystemArgs {
    operation: Operation,
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    recursive: bool,
}

/// One entry of a `list` result.
#[derive(Debug, Serialize)]
struct ListEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: &'static str,
    size: u64,
}

pub struct FileSystemTool {
    definition: ToolDefinition,
}

impl FileSystemTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                "filesystem",
                "Perform file system operations like read, write, list, delete files and directories",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "operation": {
                            "type": "string",
                            "enum": ["read", "write", "list", "delete", "mkdir"],
                            "description": "The operation to perform"
                        },
                        "path": {
                            "type": "string",
                            "description": "The file or directory path"
                        },
                        "content": {
                            "type": "string",
                            "description": "Content to write (only for write operation)"
                        },
                        "recursive": {
                            "type": "boolean",
                            "description": "Whether to perform operation recursively"
                        }
                    },
                    "required": ["operation", "path"]
                }),
            ),
        }
    }
}

impl Default for FileSystemTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for FileSystemTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<String> {
        run(args).await.context("FileSystem operation failed")
    }
}

async fn run(args: serde_json::Value) -> anyhow::Result<String> {
    let args: FileSystemArgs = serde_json::from_value(args).context("invalid arguments")?;
    let path = Path::new(&args.path);

    match args.operation {
        Operation::Read => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {}", args.path)),

        Operation::Write => {
            let Some(content) = args.content.filter(|c| !c.is_empty()) else {
                bail!("Content is required for write operation");
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("cannot write {}", args.path))?;
            Ok(format!("File written successfully to {}", args.path))
        }

        Operation::List => {
            let mut dir = tokio::fs::read_dir(path)
                .await
                .with_context(|| format!("cannot list {}", args.path))?;
            let mut entries = Vec::new();
            while let Some(entry) = dir.next_entry().await? {
                let metadata = tokio::fs::metadata(entry.path()).await?;
                entries.push(ListEntry {
                    name: entry.file_name().to_string_lossy().to_string(),
                    entry_type: if metadata.is_dir() { "directory" } else { "file" },
                    size: metadata.len(),
                });
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(serde_json::to_string_pretty(&entries)?)
        }

        Operation::Delete => {
            let metadata = tokio::fs::symlink_metadata(path)
                .await
                .with_context(|| format!("cannot delete {}", args.path))?;
            let result = if !metadata.is_dir() {
                tokio::fs::remove_file(path).await
            } else if args.recursive {
                tokio::fs::remove_dir_all(path).await
            } else {
                tokio::fs::remove_dir(path).await
            };
            result.with_context(|| format!("cannot delete {}", args.path))?;
            Ok(format!("Deleted {}", args.path))
        }

        Operation::Mkdir => {
            let result = if args.recursive {
                tokio::fs::create_dir_all(path).await
            } else {
                tokio::fs::create_dir(path).await
            };
            result.with_context(|| format!("cannot create {}", args.path))?;
            Ok(format!("Created directory {}", args.path))
        }
    }
}
