//! MCP error types.

use thiserror::Error;

/// MCP operation result type.
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to spawn the server subprocess.
    #[error("failed to spawn MCP server '{server}': {detail}")]
    Spawn { server: String, detail: String },

    /// Handshake with the server failed.
    #[error("MCP handshake with '{server}' failed: {detail}")]
    Handshake { server: String, detail: String },

    /// Protocol-level failure after a session was established.
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// Async runtime could not be created.
    #[error("failed to create MCP runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
