//! Session identity anchoring every audit record to one CLI invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One CLI invocation.
///
/// The session id ties the `AGENT_TASK_START` → `TOOL_CALL_PROPOSED` →
/// `VERIFICATION_DECISION` → `TOOL_EXECUTED` chains together for forensic
/// reconstruction. Created exactly once per invocation and immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub operator: Option<String>,
}

impl Session {
    /// Create a new session, optionally attributed to a human operator.
    pub fn new(operator: Option<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            operator,
        }
    }

    /// First eight hex characters of the session id, used in the audit
    /// file name and operator-facing output.
    pub fn short_id(&self) -> String {
        self.session_id.to_string()[..8].to_string()
    }
}
