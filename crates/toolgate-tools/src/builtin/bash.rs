//! Shell command tool.
//!
//! Two machine-level controls run before any subprocess is spawned: the
//! command denylist and the size/timeout caps. Human verification is an
//! additional control on top of these, never a replacement; a denylisted
//! command is rejected even if the operator would approve it.

use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::{validate_bash_command, validate_bash_timeout, PathEnforcer, ToolError, ToolSchema};

use super::{parse_args, run_async};
use crate::Tool;

fn default_timeout() -> i64 {
    60
}

#[derive(Debug, Deserialize)]
struct BashArgs {
    command: String,
    #[serde(default = "default_timeout")]
    timeout: i64,
}

/// Run a shell command confined to the agent's first allowed root.
pub struct BashTool {
    enforcer: Arc<PathEnforcer>,
}

impl BashTool {
    pub fn new(enforcer: Arc<PathEnforcer>) -> Self {
        Self { enforcer }
    }
}

impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn call(&self, args: &Value) -> Result<String, ToolError> {
        let args: BashArgs = parse_args(args)?;
        validate_bash_command(&args.command)?;
        let timeout = validate_bash_timeout(args.timeout);
        let cwd = self.enforcer.first_root().to_path_buf();
        let command = args.command;

        run_async(move || async move {
            let child = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&command)
                .current_dir(&cwd)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output();

            let output = match tokio::time::timeout(Duration::from_secs(timeout), child).await {
                Err(_) => return Ok(format!("Error: command timed out after {timeout}s")),
                Ok(Err(e)) => return Ok(format!("Error running command: {e}")),
                Ok(Ok(output)) => output,
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut parts = Vec::new();
            if !stdout.is_empty() {
                parts.push(stdout.into_owned());
            }
            if !stderr.is_empty() {
                parts.push(format!("[stderr]\n{stderr}"));
            }
            match output.status.code() {
                Some(0) => {}
                Some(code) => parts.push(format!("[exit code: {code}]")),
                None => parts.push("[terminated by signal]".to_string()),
            }
            if parts.is_empty() {
                Ok("(no output)".to_string())
            } else {
                Ok(parts.join("\n"))
            }
        })
    }
}

pub fn bash_schema() -> ToolSchema {
    ToolSchema {
        name: "bash".to_string(),
        description: "Run a shell command. Always requires user verification. \
                      Dangerous patterns are blocked unconditionally by security policy."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Shell command to execute"},
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (max 300, default 60)",
                    "default": 60,
                },
            },
            "required": ["command"],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use toolgate_core::ValidationError;

    fn bash_in(dir: &std::path::Path) -> BashTool {
        BashTool::new(Arc::new(
            PathEnforcer::new(vec![dir.to_path_buf()], vec![]).unwrap(),
        ))
    }

    #[test]
    fn runs_in_first_allowed_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let bash = bash_in(dir.path());

        let output = bash.call(&json!({"command": "ls"})).unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[test]
    fn denylisted_command_is_blocked_before_spawn() {
        let dir = tempdir().unwrap();
        let bash = bash_in(dir.path());

        let err = bash.call(&json!({"command": "rm -rf /"})).unwrap_err();
        match err {
            ToolError::Blocked(ValidationError::CommandBlocked { pattern }) => {
                assert_eq!(pattern, "rm of root-anchored path");
            }
            other => panic!("expected policy block, got {other:?}"),
        }
    }

    #[test]
    fn nonzero_exit_is_reported_inline() {
        let dir = tempdir().unwrap();
        let bash = bash_in(dir.path());

        let output = bash.call(&json!({"command": "exit 3"})).unwrap();
        assert!(output.contains("[exit code: 3]"));
    }

    #[test]
    fn stderr_is_labelled() {
        let dir = tempdir().unwrap();
        let bash = bash_in(dir.path());

        let output = bash.call(&json!({"command": "echo oops >&2"})).unwrap();
        assert!(output.contains("[stderr]\noops"));
    }

    #[test]
    fn timeout_is_clamped_and_enforced() {
        let dir = tempdir().unwrap();
        let bash = bash_in(dir.path());

        // A timeout of 0 clamps to 1 second; the sleep never finishes.
        let output = bash
            .call(&json!({"command": "sleep 5", "timeout": 0}))
            .unwrap();
        assert_eq!(output, "Error: command timed out after 1s");
    }

    #[test]
    fn silent_success_reports_no_output() {
        let dir = tempdir().unwrap();
        let bash = bash_in(dir.path());
        assert_eq!(bash.call(&json!({"command": "true"})).unwrap(), "(no output)");
    }
}
