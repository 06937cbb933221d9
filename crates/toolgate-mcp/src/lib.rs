//! # Toolgate MCP
//!
//! Connector for external MCP (Model Context Protocol) tool servers.
//!
//! The manager spawns each configured stdio server as a child process,
//! performs the MCP handshake, and exposes discovered tools under the same
//! normalized schema shape the built-in tools use. Server `env` blocks may
//! contain credentials: they are passed to the subprocess and never appear
//! in audit records.

pub mod error;
pub mod manager;

pub use error::{McpError, McpResult};
pub use manager::McpManager;
