//! File system tools.
//!
//! Every operation resolves its target through the agent's
//! [`PathEnforcer`] before touching the disk, so path traversal and audit
//! log access raise [`PathAccessError`] and surface as
//! `TOOL_ACCESS_DENIED`.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use toolgate_core::{check_content_size, PathEnforcer, ToolError, ToolSchema};

use super::parse_args;
use crate::Tool;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

fn default_dir() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
struct ListDirArgs {
    #[serde(default = "default_dir")]
    path: String,
}

/// Read a file inside the agent's allowed roots.
pub struct ReadFileTool {
    enforcer: Arc<PathEnforcer>,
}

impl ReadFileTool {
    pub fn new(enforcer: Arc<PathEnforcer>) -> Self {
        Self { enforcer }
    }
}

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn call(&self, args: &Value) -> Result<String, ToolError> {
        let args: ReadFileArgs = parse_args(args)?;
        let resolved = self.enforcer.check(&args.path, "read")?;
        if !resolved.exists() {
            return Ok(format!("Error: file not found: {}", args.path));
        }
        if !resolved.is_file() {
            return Ok(format!("Error: not a file: {}", args.path));
        }
        match std::fs::read_to_string(&resolved) {
            Ok(content) => Ok(content),
            Err(e) => Ok(format!("Error reading file: {e}")),
        }
    }
}

/// Write a file inside the agent's allowed roots, creating parent
/// directories as needed.
pub struct WriteFileTool {
    enforcer: Arc<PathEnforcer>,
}

impl WriteFileTool {
    pub fn new(enforcer: Arc<PathEnforcer>) -> Self {
        Self { enforcer }
    }
}

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn call(&self, args: &Value) -> Result<String, ToolError> {
        let args: WriteFileArgs = parse_args(args)?;
        check_content_size(&args.content, "content")?;
        let resolved = self.enforcer.check(&args.path, "write")?;
        if let Some(parent) = resolved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Ok(format!("Error writing file: {e}"));
            }
        }
        match std::fs::write(&resolved, &args.content) {
            Ok(()) => Ok(format!(
                "Successfully wrote {} chars to {}",
                args.content.chars().count(),
                args.path
            )),
            Err(e) => Ok(format!("Error writing file: {e}")),
        }
    }
}

/// List a directory inside the agent's allowed roots.
pub struct ListDirTool {
    enforcer: Arc<PathEnforcer>,
}

impl ListDirTool {
    pub fn new(enforcer: Arc<PathEnforcer>) -> Self {
        Self { enforcer }
    }
}

impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn call(&self, args: &Value) -> Result<String, ToolError> {
        let args: ListDirArgs = parse_args(args)?;
        let resolved = self.enforcer.check(&args.path, "list")?;
        if !resolved.exists() {
            return Ok(format!("Error: path not found: {}", args.path));
        }
        if !resolved.is_dir() {
            return Ok(format!("Error: not a directory: {}", args.path));
        }

        let mut entries = match std::fs::read_dir(&resolved) {
            Ok(iter) => match iter.collect::<Result<Vec<_>, _>>() {
                Ok(entries) => entries,
                Err(e) => return Ok(format!("Error listing directory: {e}")),
            },
            Err(e) => return Ok(format!("Error listing directory: {e}")),
        };
        // Directories first, then files, each alphabetically.
        entries.sort_by_key(|entry| (entry.path().is_file(), entry.file_name()));

        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                lines.push(format!("[DIR]  {name}/"));
            } else {
                let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
                lines.push(format!("[FILE] {name} ({size} bytes)"));
            }
        }
        if lines.is_empty() {
            Ok("(empty directory)".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}

pub fn read_file_schema() -> ToolSchema {
    ToolSchema {
        name: "read_file".to_string(),
        description: "Read the contents of a file at the given path.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or relative file path"},
            },
            "required": ["path"],
        }),
    }
}

pub fn write_file_schema() -> ToolSchema {
    ToolSchema {
        name: "write_file".to_string(),
        description: "Write content to a file. Creates parent directories if needed.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or relative file path"},
                "content": {"type": "string", "description": "Content to write"},
            },
            "required": ["path", "content"],
        }),
    }
}

pub fn list_dir_schema() -> ToolSchema {
    ToolSchema {
        name: "list_dir".to_string(),
        description: "List the contents of a directory.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path (default: current directory)",
                },
            },
            "required": [],
        }),
    }
}
