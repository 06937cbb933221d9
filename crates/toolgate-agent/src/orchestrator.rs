//! Orchestrator: loads agent configs, wires security components, runs
//! tasks, and handles sub-agent delegation.
//!
//! One orchestrator serves one session: the same audit logger is threaded
//! into every agent, gate, and registry it builds, so all records share a
//! session id. The audit log directory is placed in every agent's
//! protected directories, keeping agents out of their own audit trail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use toolgate_core::{
    truncate_chars, AgentConfig, AuditContext, AuditError, AuditEventType, AuditLogger,
    ConfigError, PathAccessError, PathEnforcer, ProviderConfig, ToolError, ToolSchema,
};
use toolgate_mcp::{McpError, McpManager};
use toolgate_tools::{Tool, ToolRegistry};

use crate::gate::{OperatorPrompt, StdinPrompt, VerificationGate};
use crate::provider::{build_provider, Provider, ProviderError};
use crate::runner::{AgentError, AgentRunner};

/// Produces one operator prompt per built agent (sub-agents included).
pub type PromptFactory = Box<dyn Fn() -> Box<dyn OperatorPrompt> + Send + Sync>;

/// Produces the provider for a built agent.
pub type ProviderFactory =
    Box<dyn Fn(&ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("agent config not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read agent config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse agent config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error(transparent)]
    Path(#[from] PathAccessError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("agent '{0}' is not loaded")]
    UnknownAgent(String),
}

/// Loads agents from YAML, wires security components, and runs tasks.
pub struct Orchestrator {
    agents_dir: PathBuf,
    audit: Arc<AuditLogger>,
    configs: Mutex<HashMap<String, AgentConfig>>,
    prompts: PromptFactory,
    providers: ProviderFactory,
}

impl Orchestrator {
    pub fn new(agents_dir: impl Into<PathBuf>, audit: Arc<AuditLogger>) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            audit,
            configs: Mutex::new(HashMap::new()),
            prompts: Box::new(|| Box::new(StdinPrompt)),
            providers: Box::new(build_provider),
        }
    }

    /// Replace the operator prompt source (tests drive the gate with a
    /// scripted sequence through this).
    pub fn with_prompt_factory(mut self, prompts: PromptFactory) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replace the provider source.
    pub fn with_provider_factory(mut self, providers: ProviderFactory) -> Self {
        self.providers = providers;
        self
    }

    /// Load, validate, and cache a single agent YAML file.
    pub fn load_agent_file(&self, path: impl AsRef<Path>) -> Result<AgentConfig, OrchestratorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OrchestratorError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;

        tracing::debug!(agent = %config.name, path = %path.display(), "loaded agent config");
        self.configs
            .lock()
            .unwrap()
            .insert(config.name.clone(), config.clone());
        Ok(config)
    }

    /// Load every `*.yaml` in the agents directory. Files that fail to
    /// load are logged and skipped so one bad config cannot take down the
    /// whole directory.
    pub fn load_agents_dir(&self) {
        let Ok(entries) = std::fs::read_dir(&self.agents_dir) else {
            return;
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();
        for path in paths {
            if let Err(e) = self.load_agent_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "skipping agent config");
            }
        }
    }

    pub fn config(&self, name: &str) -> Option<AgentConfig> {
        self.configs.lock().unwrap().get(name).cloned()
    }

    /// Instantiate an agent with all security components wired.
    pub fn build_agent(
        self: &Arc<Self>,
        config: &AgentConfig,
    ) -> Result<AgentRunner, OrchestratorError> {
        // The audit log directory is protected for every agent built here.
        let audit_log_dir = config
            .audit
            .log_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.audit.log_dir().to_path_buf());

        let enforcer = Arc::new(PathEnforcer::from_config(
            &config.allowed_paths,
            vec![audit_log_dir],
        )?);

        let gate = VerificationGate::new(
            config.verification.mode,
            config.verification.require_for.clone(),
            Arc::clone(&self.audit),
            (self.prompts)(),
        );

        let mut registry = ToolRegistry::with_builtins(
            &config.tools.builtin,
            Arc::clone(&enforcer),
            Arc::clone(&self.audit),
        )?;

        if !config.handoff.can_delegate_to.is_empty() {
            registry.add_tool(
                delegate_tool_schema(),
                Arc::new(DelegateTool {
                    orchestrator: Arc::clone(self),
                    parent: config.name.clone(),
                    allowed: config.handoff.can_delegate_to.clone(),
                }),
            );
        }

        let mut mcp = McpManager::new()?;
        if !config.tools.mcp.is_empty() {
            tracing::info!(agent = %config.name, servers = config.tools.mcp.len(), "connecting MCP servers");
            mcp.connect_all(&config.tools.mcp, &self.audit)?;
        }

        let provider = (self.providers)(&config.provider)?;

        Ok(AgentRunner::new(
            config.clone(),
            registry,
            mcp,
            gate,
            provider,
            Arc::clone(&self.audit),
        ))
    }

    /// Run a task on a named, already-loaded agent.
    pub fn run_task(
        self: &Arc<Self>,
        agent_name: &str,
        task: &str,
        context: &str,
    ) -> Result<String, OrchestratorError> {
        let config = self
            .config(agent_name)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent_name.to_string()))?;
        let mut agent = self.build_agent(&config)?;
        let result = agent.run(task, context);
        agent.shutdown();
        Ok(result?)
    }

    /// Load a YAML file and immediately run a task on it.
    pub fn run_from_yaml(
        self: &Arc<Self>,
        path: impl AsRef<Path>,
        task: &str,
        context: &str,
    ) -> Result<String, OrchestratorError> {
        let config = self.load_agent_file(path)?;
        let mut agent = self.build_agent(&config)?;
        let result = agent.run(task, context);
        agent.shutdown();
        Ok(result?)
    }
}

#[derive(Debug, Deserialize)]
struct DelegateArgs {
    agent: String,
    task: String,
    #[serde(default)]
    context: String,
}

/// The `delegate_to_agent` tool injected into agents with a non-empty
/// delegation allowlist. Builds a fresh sub-agent per call and tears down
/// its MCP connections on return.
struct DelegateTool {
    orchestrator: Arc<Orchestrator>,
    parent: String,
    allowed: Vec<String>,
}

impl Tool for DelegateTool {
    fn name(&self) -> &str {
        "delegate_to_agent"
    }

    fn call(&self, args: &Value) -> Result<String, ToolError> {
        let args: DelegateArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs(e.to_string()))?;

        if !self.allowed.contains(&args.agent) {
            return Ok(format!(
                "Error: agent '{}' not in allowed delegation list: {:?}",
                args.agent, self.allowed
            ));
        }

        let config = match self.orchestrator.config(&args.agent) {
            Some(config) => config,
            None => {
                let candidate = self
                    .orchestrator
                    .agents_dir
                    .join(format!("{}.yaml", args.agent));
                if !candidate.exists() {
                    return Ok(format!("Error: agent '{}' YAML not found.", args.agent));
                }
                match self.orchestrator.load_agent_file(&candidate) {
                    Ok(config) => config,
                    Err(e) => return Ok(format!("Error loading agent '{}': {e}", args.agent)),
                }
            }
        };

        // Handoff is audited before the sub-agent starts.
        self.orchestrator.audit.log(
            AuditEventType::AgentHandoff,
            AuditContext {
                agent_name: Some(self.parent.clone()),
                tool_name: Some("delegate_to_agent".to_string()),
                outcome: Some(format!("delegating_to:{}", args.agent)),
                task_summary: Some(truncate_chars(&args.task, 200)),
                ..AuditContext::default()
            },
        )?;
        tracing::info!(parent = %self.parent, child = %args.agent, "agent handoff");

        let mut sub_agent = match self.orchestrator.build_agent(&config) {
            Ok(agent) => agent,
            Err(OrchestratorError::Audit(e)) => return Err(ToolError::Audit(e)),
            Err(e) => return Ok(format!("Error building agent '{}': {e}", args.agent)),
        };
        let result = sub_agent.run(&args.task, &args.context);
        sub_agent.shutdown();

        match result {
            Ok(text) => Ok(text),
            Err(AgentError::Audit(e)) => Err(ToolError::Audit(e)),
            Err(e) => Ok(format!("Error: sub-agent '{}' failed: {e}", args.agent)),
        }
    }
}

fn delegate_tool_schema() -> ToolSchema {
    ToolSchema {
        name: "delegate_to_agent".to_string(),
        description: "Delegate a subtask to a specialized agent. \
                      Returns the agent's final response as a string."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "description": "Name of the agent to delegate to",
                },
                "task": {
                    "type": "string",
                    "description": "Clear description of the subtask",
                },
                "context": {
                    "type": "string",
                    "description": "Relevant context to pass to the sub-agent",
                },
            },
            "required": ["agent", "task"],
        }),
    }
}
