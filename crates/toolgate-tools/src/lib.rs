//! # Toolgate Tools
//!
//! Built-in tool library and the per-agent tool registry.
//!
//! Tools are constructed per agent, bound to that agent's
//! [`PathEnforcer`](toolgate_core::PathEnforcer), so no tool state is
//! global. The registry classifies dispatch failures into audit events and
//! always returns a plain string to the agent loop so the model can react.

pub mod builtin;
pub mod registry;

pub use builtin::{builtin_schemas, AVAILABLE_BUILTIN_TOOLS};
pub use registry::{DispatchOutcome, ToolRegistry};

use serde_json::Value;
use toolgate_core::ToolError;

/// A named capability callable by the model.
///
/// Implementations receive the already-verified JSON arguments and return
/// either the model-visible output string or a classified [`ToolError`].
/// Operational failures a tool can describe (a missing file, a timeout)
/// are returned as `Ok` strings; errors the pipeline must audit are
/// returned as `Err`.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn call(&self, args: &Value) -> Result<String, ToolError>;
}
