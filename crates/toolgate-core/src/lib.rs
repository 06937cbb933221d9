//! # Toolgate Core
//!
//! Core types and security controls for the toolgate agent runtime:
//! session identity, the append-only audit logger, the secret scrubber,
//! machine-level input validation, filesystem path confinement, the agent
//! configuration model, and the normalized message model shared by every
//! provider and tool.

pub mod audit;
pub mod config;
pub mod error;
pub mod message;
pub mod security;
pub mod session;

pub use audit::{AuditContext, AuditError, AuditEventType, AuditLogger};
pub use config::{
    AgentConfig, AuditConfig, ConfigError, HandoffConfig, ProviderConfig, ServerSpec, ToolsConfig,
    Transport, VerificationConfig, VerificationMode, HIGH_RISK_TOOLS,
};
pub use error::ToolError;
pub use message::{ContentBlock, Message, ModelResponse, Role, StopReason, ToolSchema};
pub use security::enforce::PathEnforcer;
pub use security::errors::{PathAccessError, ValidationError};
pub use security::scrub::{scrub_str, scrub_url, scrub_value, truncate_chars};
pub use security::validate::{
    check_content_size, validate_bash_command, validate_bash_timeout, validate_tool_args,
    validate_url, MAX_BASH_TIMEOUT, MAX_COMMAND_LEN, MAX_CONTENT_BYTES, MAX_URL_LEN,
};
pub use session::Session;
