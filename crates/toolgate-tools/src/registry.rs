//! Per-agent tool registry.
//!
//! Each agent gets its own registry with callables bound to that agent's
//! path enforcer (least privilege: no tool state is shared across agents).
//! Dispatch classifies failures into audit events and always hands the
//! agent loop a plain string, so a tool failure can never unwind the loop.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use toolgate_core::{
    AuditContext, AuditError, AuditEventType, AuditLogger, ConfigError, PathEnforcer, ToolError,
    ToolSchema,
};

use crate::builtin::{make_builtin, AVAILABLE_BUILTIN_TOOLS};
use crate::Tool;

/// What a dispatch produced, from the audit pipeline's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The tool ran (successfully or with an operational error it chose to
    /// describe). The caller emits `TOOL_EXECUTED` for this.
    Completed(String),
    /// The call was refused by an access or policy control; the matching
    /// `TOOL_ACCESS_DENIED` / `TOOL_BLOCKED` record has already been
    /// written. The string is the model-visible refusal.
    Refused(String),
}

impl DispatchOutcome {
    /// The model-visible string either way.
    pub fn into_content(self) -> String {
        match self {
            DispatchOutcome::Completed(content) | DispatchOutcome::Refused(content) => content,
        }
    }
}

/// Holds the set of tools enabled for one agent instance.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    schemas: Vec<ToolSchema>,
    audit: Arc<AuditLogger>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("schemas", &self.schemas)
            .finish()
    }
}

impl ToolRegistry {
    /// Build a registry containing the requested built-in tools, each bound
    /// to the given enforcer. Unknown names are a configuration error.
    pub fn with_builtins(
        enabled: &[String],
        enforcer: Arc<PathEnforcer>,
        audit: Arc<AuditLogger>,
    ) -> Result<Self, ConfigError> {
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

        let mut registry = Self {
            tools: HashMap::new(),
            schemas: Vec::new(),
            audit,
        };
        for name in enabled {
            if let Some((schema, tool)) = make_builtin(name, &enforcer) {
                registry.add_tool(schema, tool);
            }
        }
        Ok(registry)
    }

    /// Register an extra tool (the orchestrator injects `delegate_to_agent`
    /// through this).
    pub fn add_tool(&mut self, schema: ToolSchema, tool: Arc<dyn Tool>) {
        self.tools.insert(schema.name.clone(), tool);
        self.schemas.push(schema);
    }

    /// Ordered schemas for every registered tool.
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a registered tool by name.
    ///
    /// Failures map to audit outcomes:
    /// - access denial  → `TOOL_ACCESS_DENIED`, "Access denied: …"
    /// - policy block   → `TOOL_BLOCKED`, "Tool call blocked by security policy: …"
    /// - bad args       → "Error calling tool '<name>': …" (no event)
    /// - other failure  → "Tool '<name>' raised an error: …" (no event)
    ///
    /// Only an audit write failure propagates as `Err`.
    pub fn dispatch(&self, name: &str, args: &Value) -> Result<DispatchOutcome, AuditError> {
        let Some(tool) = self.tools.get(name) else {
            return Ok(DispatchOutcome::Completed(format!(
                "Error: unknown tool '{name}'"
            )));
        };

        match tool.call(args) {
            Ok(output) => Ok(DispatchOutcome::Completed(output)),
            Err(ToolError::AccessDenied(e)) => {
                tracing::warn!(tool = name, %e, "tool access denied");
                self.audit.log(
                    AuditEventType::ToolAccessDenied,
                    AuditContext {
                        tool_name: Some(name.to_string()),
                        outcome: Some("access_denied".to_string()),
                        detail: Some(e.to_string()),
                        ..AuditContext::default()
                    },
                )?;
                Ok(DispatchOutcome::Refused(format!("Access denied: {e}")))
            }
            Err(ToolError::Blocked(e)) => {
                tracing::warn!(tool = name, %e, "tool call blocked by policy");
                self.audit.log(
                    AuditEventType::ToolBlocked,
                    AuditContext {
                        tool_name: Some(name.to_string()),
                        outcome: Some("blocked".to_string()),
                        detail: Some(e.to_string()),
                        ..AuditContext::default()
                    },
                )?;
                Ok(DispatchOutcome::Refused(format!(
                    "Tool call blocked by security policy: {e}"
                )))
            }
            Err(ToolError::BadArgs(e)) => Ok(DispatchOutcome::Completed(format!(
                "Error calling tool '{name}': {e}"
            ))),
            Err(ToolError::Failed(e)) => Ok(DispatchOutcome::Completed(format!(
                "Tool '{name}' raised an error: {e}"
            ))),
            Err(ToolError::Audit(e)) => Err(e),
        }
    }
}
