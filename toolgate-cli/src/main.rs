//! CLI entry point.
//!
//! The session is created here, once per invocation, before any agent
//! runs. The audit logger is created from the session and handed to the
//! orchestrator; its path is printed to the operator at startup and the
//! `SESSION_END` record is written on every exit path.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use toolgate_agent::Orchestrator;
use toolgate_core::{AuditLogger, Session};
use toolgate_tools::builtin_schemas;

#[derive(Parser, Debug)]
#[command(name = "toolgate", version, about = "Secure tool-execution pipeline for LLM agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single agent on a task.
    Run {
        /// Path to the agent YAML file.
        agent_yaml: PathBuf,
        /// Task description for the agent.
        task: String,
        /// Optional context string.
        #[arg(long, short, default_value = "")]
        context: String,
        /// Human identity running this session, for audit attribution.
        #[arg(long, short)]
        operator: Option<String>,
        /// Directory of delegation-target agent YAML files.
        #[arg(long, default_value = "agents")]
        agents_dir: PathBuf,
    },
    /// Start a multi-agent workflow via an orchestrator agent.
    Orchestrate {
        /// Path to the orchestrator agent YAML file.
        agent_yaml: PathBuf,
        /// High-level task for the orchestrator.
        task: String,
        #[arg(long, short, default_value = "")]
        context: String,
        #[arg(long, short)]
        operator: Option<String>,
        #[arg(long, default_value = "agents")]
        agents_dir: PathBuf,
    },
    /// List the tools an agent config enables, without starting a session.
    ListTools {
        /// Path to the agent YAML file.
        agent_yaml: PathBuf,
    },
}

fn audit_log_dir() -> PathBuf {
    std::env::var("AUDIT_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".audit_logs"))
}

fn create_session_and_logger(operator: Option<String>) -> Result<(Session, Arc<AuditLogger>), ExitCode> {
    let session = Session::new(operator);
    match AuditLogger::new(audit_log_dir(), &session) {
        Ok(logger) => {
            println!(
                "Session: {}...  Audit log: {}",
                session.short_id(),
                logger.log_path().display()
            );
            Ok((session, Arc::new(logger)))
        }
        Err(e) => {
            eprintln!("Fatal: could not open audit log: {e}");
            Err(ExitCode::FAILURE)
        }
    }
}

fn run_command(
    agent_yaml: &PathBuf,
    task: &str,
    context: &str,
    operator: Option<String>,
    agents_dir: PathBuf,
    load_dir: bool,
) -> ExitCode {
    let (_session, audit) = match create_session_and_logger(operator) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let orchestrator = Arc::new(Orchestrator::new(agents_dir, Arc::clone(&audit)));
    if load_dir {
        orchestrator.load_agents_dir();
    }

    let result = orchestrator.run_from_yaml(agent_yaml, task, context);

    if let Err(e) = audit.close() {
        eprintln!("Fatal: could not write session end record: {e}");
        return ExitCode::FAILURE;
    }

    match result {
        Ok(text) => {
            println!("\n{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn list_tools(agent_yaml: &PathBuf) -> ExitCode {
    let raw = match std::fs::read_to_string(agent_yaml) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: cannot read {}: {e}", agent_yaml.display());
            return ExitCode::FAILURE;
        }
    };
    let config: toolgate_core::AgentConfig = match serde_yaml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to parse agent config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let mut schemas = match builtin_schemas(&config.tools.builtin) {
        Ok(schemas) => schemas,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if !config.handoff.can_delegate_to.is_empty() {
        schemas.push(toolgate_core::ToolSchema {
            name: "delegate_to_agent".to_string(),
            description: format!(
                "Delegate a subtask to one of: {}",
                config.handoff.can_delegate_to.join(", ")
            ),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        });
    }

    println!("\nTools for agent '{}':\n", config.name);
    for schema in &schemas {
        let args = schema
            .input_schema
            .get("properties")
            .and_then(|props| props.as_object())
            .map(|props| props.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        println!("  {}({args})", schema.name);
        if !schema.description.is_empty() {
            println!("    {}", schema.description);
        }
    }
    for spec in &config.tools.mcp {
        println!(
            "  [MCP] {} ({} {}): tools discovered at connect time",
            spec.name,
            spec.transport.as_str(),
            spec.command
        );
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .json()
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            agent_yaml,
            task,
            context,
            operator,
            agents_dir,
        } => run_command(&agent_yaml, &task, &context, operator, agents_dir, false),
        Command::Orchestrate {
            agent_yaml,
            task,
            context,
            operator,
            agents_dir,
        } => run_command(&agent_yaml, &task, &context, operator, agents_dir, true),
        Command::ListTools { agent_yaml } => list_tools(&agent_yaml),
    }
}
