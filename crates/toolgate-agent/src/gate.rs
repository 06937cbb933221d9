//! Verify-then-commit gate.
//!
//! Every tool call emits two audit events:
//!
//! 1. `TOOL_CALL_PROPOSED`, written before anything is shown to the
//!    operator.
//! 2. `VERIFICATION_DECISION`, written after the operator responds.
//!
//! The console shows REAL (unscrubbed) args to the operator, who is an
//! authorized reviewer and needs accurate information. The audit log
//! receives scrubbed args only. After an edit, the new args are
//! re-validated against the tool's declared input schema before acceptance.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use toolgate_core::{
    scrub_value, validate_tool_args, AuditContext, AuditError, AuditEventType, AuditLogger,
    ToolSchema, VerificationMode,
};

/// One operator keystroke decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Approve,
    Deny,
    Edit,
    /// Ctrl-C or EOF. Treated as denial.
    Interrupted,
}

/// Source of operator decisions.
///
/// The gate reads all interactivity through this trait so tests can drive
/// it with a scripted sequence instead of stdin.
pub trait OperatorPrompt: Send {
    /// Read one of approve / deny / edit.
    fn read_choice(&mut self, prompt: &str) -> PromptAnswer;

    /// Read replacement JSON args. `None` keeps the original args
    /// (cancelled edit or unparsable JSON).
    fn read_edited_args(&mut self) -> Option<Value>;

    /// Read a yes/no confirmation.
    fn read_confirm(&mut self, prompt: &str) -> PromptAnswer;
}

/// Line-based stdin prompt used by the CLI.
pub struct StdinPrompt;

impl StdinPrompt {
    fn read_line(prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl OperatorPrompt for StdinPrompt {
    fn read_choice(&mut self, prompt: &str) -> PromptAnswer {
        loop {
            match Self::read_line(prompt) {
                None => return PromptAnswer::Interrupted,
                Some(line) => match line.to_lowercase().as_str() {
                    "y" => return PromptAnswer::Approve,
                    "n" => return PromptAnswer::Deny,
                    "e" => return PromptAnswer::Edit,
                    _ => println!("Please enter y, n, or e."),
                },
            }
        }
    }

    fn read_edited_args(&mut self) -> Option<Value> {
        println!("Enter new JSON args (blank line to finish):");
        let mut lines = Vec::new();
        loop {
            match Self::read_line("") {
                None => return None,
                Some(line) if line.is_empty() => break,
                Some(line) => lines.push(line),
            }
        }
        let raw = lines.join("\n");
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                println!("Invalid JSON: {e}. Keeping original args.");
                None
            }
        }
    }

    fn read_confirm(&mut self, prompt: &str) -> PromptAnswer {
        loop {
            match Self::read_line(prompt) {
                None => return PromptAnswer::Interrupted,
                Some(line) => match line.to_lowercase().as_str() {
                    "y" => return PromptAnswer::Approve,
                    "n" => return PromptAnswer::Deny,
                    _ => println!("Please enter y or n."),
                },
            }
        }
    }
}

/// The operator's verdict on one proposed tool call.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub approved: bool,
    /// The proposed input, or the operator-edited replacement.
    pub input: Value,
}

/// Interactive gate surfacing every tool call to the operator for review.
pub struct VerificationGate {
    mode: VerificationMode,
    require_for: HashSet<String>,
    audit: Arc<AuditLogger>,
    // tool name → schema, for post-edit re-validation. Updated after MCP
    // discovery, hence the interior mutability.
    schemas: Mutex<HashMap<String, ToolSchema>>,
    prompt: Mutex<Box<dyn OperatorPrompt>>,
}

impl VerificationGate {
    pub fn new(
        mode: VerificationMode,
        require_for: Vec<String>,
        audit: Arc<AuditLogger>,
        prompt: Box<dyn OperatorPrompt>,
    ) -> Self {
        Self {
            mode,
            require_for: require_for.into_iter().collect(),
            audit,
            schemas: Mutex::new(HashMap::new()),
            prompt: Mutex::new(prompt),
        }
    }

    /// Publish the known tool schemas (called once built-in plus MCP tools
    /// are assembled).
    pub fn update_schemas(&self, schemas: &[ToolSchema]) {
        let mut known = self.schemas.lock().unwrap();
        for schema in schemas {
            known.insert(schema.name.clone(), schema.clone());
        }
    }

    fn needs_verification(&self, tool_name: &str) -> bool {
        match self.mode {
            VerificationMode::Always => true,
            VerificationMode::Never => false,
            VerificationMode::Selective => self.require_for.contains(tool_name),
        }
    }

    /// Show a proposed tool call to the operator and collect the verdict.
    ///
    /// No side effect outside the audit log; deterministic for a given
    /// operator response stream.
    pub fn review(
        &self,
        agent_name: &str,
        tool_name: &str,
        tool_input: &Value,
        model: &str,
    ) -> Result<VerificationOutcome, AuditError> {
        self.audit.log(
            AuditEventType::ToolCallProposed,
            AuditContext {
                agent_name: Some(agent_name.to_string()),
                model: Some(model.to_string()),
                tool_name: Some(tool_name.to_string()),
                tool_input_scrubbed: Some(scrub_value(tool_input)),
                ..AuditContext::default()
            },
        )?;

        if !self.needs_verification(tool_name) {
            self.audit.log(
                AuditEventType::VerificationDecision,
                AuditContext {
                    agent_name: Some(agent_name.to_string()),
                    tool_name: Some(tool_name.to_string()),
                    verification_choice: Some("auto_approved".to_string()),
                    outcome: Some("approved".to_string()),
                    ..AuditContext::default()
                },
            )?;
            return Ok(VerificationOutcome {
                approved: true,
                input: tool_input.clone(),
            });
        }

        // The authorized reviewer sees the real args, not the scrubbed ones.
        println!("\n{agent_name} wants to call: {tool_name}");
        println!(
            "{}",
            serde_json::to_string_pretty(tool_input).unwrap_or_else(|_| tool_input.to_string())
        );

        let mut prompt = self.prompt.lock().unwrap();
        let choice;
        let approved;
        let mut final_input = tool_input.clone();

        loop {
            match prompt.read_choice("  [y] Approve  [n] Deny  [e] Edit args > ") {
                PromptAnswer::Approve => {
                    choice = "y";
                    approved = true;
                    break;
                }
                PromptAnswer::Deny => {
                    choice = "n";
                    approved = false;
                    println!("Tool call denied.");
                    break;
                }
                PromptAnswer::Interrupted => {
                    choice = "interrupted";
                    approved = false;
                    println!("Interrupted; denying tool call.");
                    break;
                }
                PromptAnswer::Edit => {
                    let edited = prompt
                        .read_edited_args()
                        .unwrap_or_else(|| tool_input.clone());

                    let schema = self.schemas.lock().unwrap().get(tool_name).cloned();
                    if let Some(schema) = schema {
                        if let Err(e) =
                            validate_tool_args(tool_name, &edited, &schema.input_schema)
                        {
                            println!(
                                "Edited args failed schema validation: {e}\n\
                                 Please edit again or choose [n] to deny."
                            );
                            continue;
                        }
                    }

                    println!(
                        "Edited args:\n{}",
                        serde_json::to_string_pretty(&edited)
                            .unwrap_or_else(|_| edited.to_string())
                    );
                    match prompt.read_confirm("  [y] Approve edited  [n] Deny > ") {
                        PromptAnswer::Approve => {
                            choice = "e";
                            approved = true;
                            final_input = edited;
                        }
                        PromptAnswer::Interrupted => {
                            choice = "interrupted";
                            approved = false;
                        }
                        _ => {
                            choice = "n";
                            approved = false;
                        }
                    }
                    break;
                }
            }
        }
        drop(prompt);

        self.audit.log(
            AuditEventType::VerificationDecision,
            AuditContext {
                agent_name: Some(agent_name.to_string()),
                model: Some(model.to_string()),
                tool_name: Some(tool_name.to_string()),
                verification_choice: Some(choice.to_string()),
                tool_input_scrubbed: Some(scrub_value(&final_input)),
                outcome: Some(if approved { "approved" } else { "denied" }.to_string()),
                ..AuditContext::default()
            },
        )?;

        Ok(VerificationOutcome {
            approved,
            input: final_input,
        })
    }
}
