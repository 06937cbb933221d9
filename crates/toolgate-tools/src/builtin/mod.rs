//! Built-in tools.
//!
//! Schemas are static; tool instances are built per agent via
//! [`make_builtin`] so every callable is bound to its agent's path
//! enforcer.

pub mod bash;
pub mod file;
pub mod web;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use toolgate_core::{ConfigError, PathEnforcer, ToolError, ToolSchema};

use crate::Tool;

/// Names of all built-in tools, in schema order.
pub const AVAILABLE_BUILTIN_TOOLS: &[&str] =
    &["read_file", "write_file", "list_dir", "bash", "web_fetch"];

/// Instantiate one built-in tool bound to the given enforcer.
pub(crate) fn make_builtin(
    name: &str,
    enforcer: &Arc<PathEnforcer>,
) -> Option<(ToolSchema, Arc<dyn Tool>)> {
    match name {
        "read_file" => Some((
            file::read_file_schema(),
            Arc::new(file::ReadFileTool::new(Arc::clone(enforcer))),
        )),
        "write_file" => Some((
            file::write_file_schema(),
            Arc::new(file::WriteFileTool::new(Arc::clone(enforcer))),
        )),
        "list_dir" => Some((
            file::list_dir_schema(),
            Arc::new(file::ListDirTool::new(Arc::clone(enforcer))),
        )),
        "bash" => Some((
            bash::bash_schema(),
            Arc::new(bash::BashTool::new(Arc::clone(enforcer))),
        )),
        "web_fetch" => Some((web::web_fetch_schema(), Arc::new(web::WebFetchTool::new()))),
        _ => None,
    }
}

/// Schemas for a list of enabled built-in names, without instantiating any
/// tool. Used by config introspection (`list-tools`).
pub fn builtin_schemas(enabled: &[String]) -> Result<Vec<ToolSchema>, ConfigError> {
    let unknown: Vec<String> = enabled
        .iter()
        .filter(|name| !AVAILABLE_BUILTIN_TOOLS.contains(&name.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(ConfigError::UnknownBuiltinTool {
            names: unknown,
            available: AVAILABLE_BUILTIN_TOOLS.to_vec(),
        });
    }
    Ok(enabled
        .iter()
        .map(|name| match name.as_str() {
            "read_file" => file::read_file_schema(),
            "write_file" => file::write_file_schema(),
            "list_dir" => file::list_dir_schema(),
            "bash" => bash::bash_schema(),
            _ => web::web_fetch_schema(),
        })
        .collect())
}

/// Parse typed tool arguments from the incoming JSON value.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    args: &Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs(e.to_string()))
}

/// Execute an async tool body from sync dispatch, reusing the current
/// runtime when one exists and creating a fresh one otherwise.
pub(crate) fn run_async<F, Fut>(f: F) -> Result<String, ToolError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, ToolError>>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(f()))
    } else {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(f()),
            Err(e) => Err(ToolError::Failed(format!(
                "failed to create async runtime: {e}"
            ))),
        }
    }
}
