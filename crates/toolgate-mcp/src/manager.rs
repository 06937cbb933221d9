//! MCP server connection manager.
//!
//! One manager per agent, torn down when the agent ends. The manager owns
//! a private tokio runtime; every public method drives its async work to
//! completion before returning, so the agent loop stays on a single
//! synchronous control path and tool-use blocks never fan out.

use rmcp::model::CallToolRequestParam;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::Value;
use tokio::runtime::Runtime;
use toolgate_core::{
    AuditContext, AuditError, AuditEventType, AuditLogger, ServerSpec, ToolSchema,
    MAX_CONTENT_BYTES,
};

use crate::error::{McpError, McpResult};

struct McpConnection {
    name: String,
    service: RunningService<RoleClient, ()>,
    tools: Vec<ToolSchema>,
}

/// Manages MCP server connections for one agent.
pub struct McpManager {
    runtime: Runtime,
    connections: Vec<McpConnection>,
}

impl McpManager {
    pub fn new() -> McpResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            connections: Vec::new(),
        })
    }

    /// Connect to every configured server.
    ///
    /// Connection failures are non-fatal: each emits `MCP_CONNECT_FAILED`
    /// and the agent runs with the servers that did connect. Successful
    /// connections emit `MCP_CONNECT` with the server name, transport,
    /// command, and discovered tool count; the server's `env` block is
    /// deliberately absent from the record.
    pub fn connect_all(
        &mut self,
        specs: &[ServerSpec],
        audit: &AuditLogger,
    ) -> Result<(), AuditError> {
        for spec in specs {
            match self.connect_stdio(spec) {
                Ok(connection) => {
                    tracing::info!(
                        server = %spec.name,
                        tools = connection.tools.len(),
                        "connected to MCP server"
                    );
                    audit.log(
                        AuditEventType::McpConnect,
                        AuditContext {
                            server_name: Some(spec.name.clone()),
                            transport: Some(spec.transport.as_str().to_string()),
                            command: Some(spec.command.clone()),
                            tool_count: Some(connection.tools.len()),
                            ..AuditContext::default()
                        },
                    )?;
                    self.connections.push(connection);
                }
                Err(e) => {
                    tracing::warn!(server = %spec.name, error = %e, "MCP connection failed");
                    audit.log(
                        AuditEventType::McpConnectFailed,
                        AuditContext {
                            server_name: Some(spec.name.clone()),
                            detail: Some(e.to_string()),
                            ..AuditContext::default()
                        },
                    )?;
                }
            }
        }
        Ok(())
    }

    fn connect_stdio(&self, spec: &ServerSpec) -> McpResult<McpConnection> {
        let server = spec.name.clone();
        self.runtime.block_on(async {
            let mut command = tokio::process::Command::new(&spec.command);
            command.args(&spec.args);
            command.envs(&spec.env);

            let transport = TokioChildProcess::new(command).map_err(|e| McpError::Spawn {
                server: server.clone(),
                detail: e.to_string(),
            })?;

            let service = ().serve(transport).await.map_err(|e| McpError::Handshake {
                server: server.clone(),
                detail: e.to_string(),
            })?;

            let listed = service
                .list_tools(Default::default())
                .await
                .map_err(|e| McpError::Protocol(e.to_string()))?;

            let tools = listed
                .tools
                .iter()
                .map(|tool| ToolSchema {
                    name: tool.name.to_string(),
                    description: tool
                        .description
                        .as_deref()
                        .unwrap_or_default()
                        .to_string(),
                    input_schema: Value::Object((*tool.input_schema).clone()),
                })
                .collect();

            Ok(McpConnection {
                name: server,
                service,
                tools,
            })
        })
    }

    /// Normalized schemas for every discovered tool, across all servers.
    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.connections
            .iter()
            .flat_map(|connection| connection.tools.iter().cloned())
            .collect()
    }

    /// Whether any connected server exposes a tool with this name.
    pub fn owns_tool(&self, name: &str) -> bool {
        self.connections
            .iter()
            .any(|connection| connection.tools.iter().any(|tool| tool.name == name))
    }

    /// Dispatch a tool call to its owning server.
    ///
    /// Errors are returned as strings for the model, the same contract the
    /// built-in registry uses. Responses are capped at 10 MiB with a
    /// truncation notice appended on overflow.
    pub fn call_tool(&self, name: &str, args: &Value) -> String {
        let Some(connection) = self
            .connections
            .iter()
            .find(|connection| connection.tools.iter().any(|tool| tool.name == name))
        else {
            return format!("Error: MCP tool '{name}' not found in any connected server");
        };

        let arguments = args.as_object().cloned();
        self.runtime.block_on(async {
            match connection
                .service
                .call_tool(CallToolRequestParam {
                    meta: None,
                    name: name.to_string().into(),
                    arguments,
                    task: None,
                })
                .await
            {
                Ok(result) => {
                    let text = result
                        .content
                        .iter()
                        .map(|content| match content.as_text() {
                            Some(text) => text.text.clone(),
                            None => format!("{content:?}"),
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    cap_response(&text, MAX_CONTENT_BYTES)
                }
                Err(e) => format!("MCP tool error: {e}"),
            }
        })
    }

    /// Close every session and subprocess handle.
    pub fn shutdown(&mut self) {
        for connection in self.connections.drain(..) {
            tracing::debug!(server = %connection.name, "shutting down MCP server");
            if let Err(e) = self.runtime.block_on(connection.service.cancel()) {
                tracing::warn!(server = %connection.name, error = %e, "MCP shutdown error");
            }
        }
    }
}

impl Drop for McpManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Truncate a response at a byte cap, on a char boundary, appending a
/// truncation notice on overflow.
fn cap_response(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n...[truncated: response exceeded {} MB]",
        &text[..cut],
        max_bytes / 1_048_576
    )
}
