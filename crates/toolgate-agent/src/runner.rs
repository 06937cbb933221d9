//! The agent loop.
//!
//! Turn-by-turn orchestration of the model and its tools. Turns execute
//! sequentially; within a turn, tool-use blocks execute sequentially in
//! the order the provider returned them. Every approved dispatch produces
//! exactly one `TOOL_EXECUTED` record, or the registry's `TOOL_BLOCKED` /
//! `TOOL_ACCESS_DENIED` record instead, never both. `AGENT_TASK_END` is
//! written on every exit path, including aborts.

use std::sync::Arc;

use thiserror::Error;
use toolgate_core::{
    scrub_str, scrub_value, truncate_chars, AgentConfig, AuditContext, AuditError, AuditEventType,
    AuditLogger, ContentBlock, Message, Role, StopReason,
};
use toolgate_mcp::McpManager;
use toolgate_tools::{DispatchOutcome, ToolRegistry};

use crate::gate::VerificationGate;
use crate::provider::{Provider, ProviderRequest};

/// Max chars of a tool result written to an audit record.
const AUDIT_RESULT_MAX_CHARS: usize = 500;

/// Max chars of a task summary written to `AGENT_TASK_START`.
const AUDIT_TASK_MAX_CHARS: usize = 300;

const MAX_TOKENS: u32 = 8096;

/// Failure that aborts the agent loop. Per-tool errors never land here;
/// they are fed back to the model as strings.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// One configured agent, wired with its own registry, MCP connections,
/// verification gate, and provider.
pub struct AgentRunner {
    config: AgentConfig,
    registry: ToolRegistry,
    mcp: McpManager,
    gate: VerificationGate,
    provider: Box<dyn Provider>,
    audit: Arc<AuditLogger>,
}

impl AgentRunner {
    pub fn new(
        config: AgentConfig,
        registry: ToolRegistry,
        mcp: McpManager,
        gate: VerificationGate,
        provider: Box<dyn Provider>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            config,
            registry,
            mcp,
            gate,
            provider,
            audit,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Run the agent on a task, returning the final text response.
    pub fn run(&mut self, task: &str, context: &str) -> Result<String, AgentError> {
        self.audit.log(
            AuditEventType::AgentTaskStart,
            AuditContext {
                agent_name: Some(self.config.name.clone()),
                model: Some(self.config.model.clone()),
                task_summary: Some(scrub_str(&truncate_chars(task, AUDIT_TASK_MAX_CHARS))),
                ..AuditContext::default()
            },
        )?;

        let mut turns = 0u32;
        let result = self.run_loop(task, context, &mut turns);
        let outcome = match &result {
            Ok((_, outcome)) => *outcome,
            Err(_) => "error",
        };
        // Written even when the loop aborted; an audit failure here is
        // itself fatal.
        self.audit.log(
            AuditEventType::AgentTaskEnd,
            AuditContext {
                agent_name: Some(self.config.name.clone()),
                model: Some(self.config.model.clone()),
                turns_used: Some(turns),
                outcome: Some(outcome.to_string()),
                ..AuditContext::default()
            },
        )?;
        result.map(|(text, _)| text)
    }

    /// Tear down MCP connections. Call when the agent's run is over.
    pub fn shutdown(&mut self) {
        self.mcp.shutdown();
    }

    fn run_loop(
        &mut self,
        task: &str,
        context: &str,
        turns: &mut u32,
    ) -> Result<(String, &'static str), AgentError> {
        let user_content = if context.is_empty() {
            task.to_string()
        } else {
            format!("Context:\n{context}\n\nTask:\n{task}")
        };
        let mut messages = vec![Message::user_text(user_content)];

        let mut tools = self.registry.schemas().to_vec();
        tools.extend(self.mcp.tool_schemas());
        // The gate re-validates operator-edited args against these.
        self.gate.update_schemas(&tools);

        while *turns < self.config.max_turns {
            *turns += 1;
            tracing::debug!(
                agent = %self.config.name,
                turn = *turns,
                max_turns = self.config.max_turns,
                "starting turn"
            );

            let response = self.provider.create_message(ProviderRequest {
                model: &self.config.model,
                system: &self.config.system_prompt,
                messages: &messages,
                tools: &tools,
                max_tokens: MAX_TOKENS,
            })?;

            messages.push(Message::assistant(response.content.clone()));

            match response.stop_reason {
                StopReason::EndTurn => {
                    return Ok((response.text(), "completed"));
                }
                StopReason::ToolUse => {
                    let results = self.handle_tool_use(&response.content)?;
                    messages.push(Message::user_blocks(results));
                }
                StopReason::Other => {
                    tracing::warn!(agent = %self.config.name, "unexpected stop reason; stopping");
                    return Ok((response.text(), "completed"));
                }
            }
        }

        tracing::warn!(
            agent = %self.config.name,
            max_turns = self.config.max_turns,
            "reached max turns"
        );
        let final_text = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(Message::text)
            .unwrap_or_default();
        Ok((final_text, "max_turns"))
    }

    /// Verify and execute every tool-use block, in order, returning the
    /// tool_result blocks for the next user message.
    fn handle_tool_use(
        &mut self,
        content: &[ContentBlock],
    ) -> Result<Vec<ContentBlock>, AgentError> {
        let mut results = Vec::new();

        for block in content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };

            let verdict = self
                .gate
                .review(&self.config.name, name, input, &self.config.model)?;

            let result_content = if !verdict.approved {
                tracing::info!(agent = %self.config.name, tool = %name, "tool call denied");
                "User denied this tool call.".to_string()
            } else {
                let outcome = if self.registry.contains(name) {
                    self.registry.dispatch(name, &verdict.input)?
                } else {
                    // MCP-owned tools get the same uniform TOOL_EXECUTED
                    // treatment as built-ins.
                    DispatchOutcome::Completed(self.mcp.call_tool(name, &verdict.input))
                };

                match outcome {
                    DispatchOutcome::Completed(output) => {
                        self.audit.log(
                            AuditEventType::ToolExecuted,
                            AuditContext {
                                agent_name: Some(self.config.name.clone()),
                                model: Some(self.config.model.clone()),
                                tool_name: Some(name.clone()),
                                tool_input_scrubbed: Some(scrub_value(&verdict.input)),
                                outcome: Some("success".to_string()),
                                result_summary: Some(scrub_str(&truncate_chars(
                                    &output,
                                    AUDIT_RESULT_MAX_CHARS,
                                ))),
                                ..AuditContext::default()
                            },
                        )?;
                        output
                    }
                    DispatchOutcome::Refused(message) => message,
                }
            };

            results.push(ContentBlock::tool_result(id.clone(), result_content));
        }

        Ok(results)
    }
}
