//! Structured audit logging.
//!
//! Every auditable event in the runtime flows through [`AuditLogger::log`].
//! Records are written as JSONL (one JSON object per line) to an
//! append-only file. Each record carries the mandatory fields:
//!
//! - `event_id`       (unique per record)
//! - `timestamp_utc`  (UTC, ISO 8601)
//! - `session_id`     (session correlation)
//! - `event_type`     (one of the defined auditable event types)
//! - `operator`       (human identity who started the session, if provided)
//!
//! plus event-specific context fields. `None` context values are omitted to
//! keep records compact.
//!
//! The log file is opened in append mode on each write and never opened for
//! reading, seeking, or truncation by this process. The log directory must
//! be excluded from agent-accessible allowed paths (enforced elsewhere via
//! protected directories). Write failures propagate; audit errors are never
//! silently swallowed.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::session::Session;

/// Catalog of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    // Session lifecycle
    SessionStart,
    SessionEnd,
    // Agent lifecycle
    AgentTaskStart,
    AgentTaskEnd,
    // Tool pipeline
    ToolCallProposed,
    VerificationDecision,
    ToolExecuted,
    ToolBlocked,
    ToolAccessDenied,
    // Multi-agent
    AgentHandoff,
    // MCP
    McpConnect,
    McpConnectFailed,
    // Validation
    ValidationFailed,
}

/// Event-specific context merged into an audit record.
///
/// Fields are optional; unset fields are omitted from the serialized
/// record. String values destined for this struct must already be scrubbed
/// by the caller where they can carry secrets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input_scrubbed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_count: Option<usize>,
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    event_id: Uuid,
    timestamp_utc: String,
    session_id: Uuid,
    event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<&'a str>,
    #[serde(flatten)]
    context: AuditContext,
}

/// Audit write failure. Fatal to the session by design: losing audit
/// records is worse than aborting.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Thread-safe, append-only structured audit logger.
///
/// One instance per session, created before any agent runs and closed
/// after. The file path is `audit_<session8>_<YYYYMMDD>.jsonl` inside the
/// log directory.
pub struct AuditLogger {
    session_id: Uuid,
    operator: Option<String>,
    log_dir: PathBuf,
    log_path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLogger {
    /// Create the logger, the log directory if needed, and write the
    /// `SESSION_START` record.
    pub fn new(log_dir: impl Into<PathBuf>, session: &Session) -> Result<Self, AuditError> {
        let log_dir = log_dir.into();
        std::fs::create_dir_all(&log_dir)?;

        let date = Utc::now().format("%Y%m%d");
        let log_path = log_dir.join(format!("audit_{}_{date}.jsonl", session.short_id()));

        let logger = Self {
            session_id: session.session_id,
            operator: session.operator.clone(),
            log_dir,
            log_path,
            lock: Mutex::new(()),
        };
        logger.log(AuditEventType::SessionStart, AuditContext::default())?;
        Ok(logger)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Write one audit record, synchronously, at event time.
    ///
    /// The record is serialized as a single JSON line and flushed before
    /// the file handle is dropped. A single mutex around the append keeps
    /// lines from interleaving across threads of this process.
    pub fn log(&self, event_type: AuditEventType, context: AuditContext) -> Result<(), AuditError> {
        let record = AuditRecord {
            event_id: Uuid::new_v4(),
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            session_id: self.session_id,
            event_type,
            operator: self.operator.as_deref(),
            context,
        };
        let line = serde_json::to_string(&record)?;

        let _guard = self.lock.lock().unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    /// Write the `SESSION_END` record. Call on every exit path.
    pub fn close(&self) -> Result<(), AuditError> {
        self.log(AuditEventType::SessionEnd, AuditContext::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_records(logger: &AuditLogger) -> Vec<Value> {
        std::fs::read_to_string(logger.log_path())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn filename_embeds_session_prefix_and_date() {
        let dir = tempdir().unwrap();
        let session = Session::new(None);
        let logger = AuditLogger::new(dir.path(), &session).unwrap();

        let name = logger.log_path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(&format!("audit_{}_", session.short_id())));
        assert!(name.ends_with(".jsonl"));
    }

    #[test]
    fn mandatory_fields_present_and_nulls_omitted() {
        let dir = tempdir().unwrap();
        let session = Session::new(Some("alice".into()));
        let logger = AuditLogger::new(dir.path(), &session).unwrap();

        logger
            .log(
                AuditEventType::ToolExecuted,
                AuditContext {
                    tool_name: Some("bash".into()),
                    outcome: Some("success".into()),
                    ..AuditContext::default()
                },
            )
            .unwrap();

        let records = read_records(&logger);
        assert_eq!(records.len(), 2);
        let record = &records[1];
        assert_eq!(record["event_type"], "TOOL_EXECUTED");
        assert_eq!(record["session_id"], session.session_id.to_string());
        assert_eq!(record["operator"], "alice");
        assert_eq!(record["tool_name"], "bash");
        assert!(record.get("event_id").is_some());
        assert!(record.get("timestamp_utc").is_some());
        // Unset context keys never appear, not even as null.
        assert!(record.get("detail").is_none());
        assert!(record.get("model").is_none());
    }

    #[test]
    fn session_start_first_and_session_end_last() {
        let dir = tempdir().unwrap();
        let session = Session::new(None);
        let logger = AuditLogger::new(dir.path(), &session).unwrap();
        logger
            .log(AuditEventType::AgentTaskStart, AuditContext::default())
            .unwrap();
        logger.close().unwrap();

        let records = read_records(&logger);
        assert_eq!(records.first().unwrap()["event_type"], "SESSION_START");
        assert_eq!(records.last().unwrap()["event_type"], "SESSION_END");
    }

    #[test]
    fn timestamps_are_monotonic_within_a_file() {
        let dir = tempdir().unwrap();
        let session = Session::new(None);
        let logger = AuditLogger::new(dir.path(), &session).unwrap();
        for _ in 0..20 {
            logger
                .log(AuditEventType::ToolCallProposed, AuditContext::default())
                .unwrap();
        }

        let records = read_records(&logger);
        let timestamps: Vec<String> = records
            .iter()
            .map(|record| record["timestamp_utc"].as_str().unwrap().to_string())
            .collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn event_ids_are_unique() {
        let dir = tempdir().unwrap();
        let session = Session::new(None);
        let logger = AuditLogger::new(dir.path(), &session).unwrap();
        for _ in 0..5 {
            logger
                .log(AuditEventType::ToolExecuted, AuditContext::default())
                .unwrap();
        }

        let records = read_records(&logger);
        let mut ids: Vec<String> = records
            .iter()
            .map(|record| record["event_id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), records.len());
    }
}
