//! Tool dispatch error taxonomy.
//!
//! Each variant maps to a distinct audit outcome when a dispatch fails:
//! access denials and policy blocks get their own audit events, malformed
//! arguments and operational failures surface only as strings returned to
//! the model.

use thiserror::Error;

use crate::audit::AuditError;
use crate::security::errors::{PathAccessError, ValidationError};

/// Failure raised by a tool implementation during dispatch.
///
/// The registry classifies these into audit events and user-visible
/// strings; it never lets a tool failure propagate into the agent loop.
/// The one exception is [`ToolError::Audit`]: a lost audit record fails
/// the session.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Path outside allowed roots or inside a protected directory.
    /// Audited as `TOOL_ACCESS_DENIED`.
    #[error("{0}")]
    AccessDenied(#[from] PathAccessError),

    /// Machine-level policy block: denylist, size cap, SSRF, or schema
    /// violation. Audited as `TOOL_BLOCKED`.
    #[error("{0}")]
    Blocked(#[from] ValidationError),

    /// Arguments did not match the tool's expected shape. Returned to the
    /// model as a string; no distinct audit event.
    #[error("{0}")]
    BadArgs(String),

    /// Operational failure inside the tool. Returned to the model as a
    /// string; no distinct audit event.
    #[error("{0}")]
    Failed(String),

    /// Audit write failure inside a tool (delegation logs a handoff
    /// record). Propagates and fails the session.
    #[error("audit logging failed: {0}")]
    Audit(#[from] AuditError),
}
