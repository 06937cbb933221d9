//! Declarative agent configuration.
//!
//! Agent YAML files deserialize into [`AgentConfig`]. Unknown keys are
//! rejected at parse time; cross-field policy checks run in
//! [`AgentConfig::validate`] before any agent is built. A configuration
//! that would let high-risk tools run without human review never loads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Tools that must never run without a human-capable verification mode.
pub const HIGH_RISK_TOOLS: &[&str] = &["bash", "write_file"];

fn default_max_turns() -> u32 {
    20
}

/// One agent definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub model: String,
    pub system_prompt: String,
    /// Human identity who configured or runs this agent, for audit
    /// attribution.
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    /// Filesystem paths the agent may read and write. Defaults to the
    /// current directory when omitted (logged as a warning). Must not
    /// include the audit log directory.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    #[serde(default)]
    pub builtin: Vec<String>,
    #[serde(default)]
    pub mcp: Vec<ServerSpec>,
}

/// One external MCP tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSpec {
    pub name: String,
    pub transport: Transport,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment for the spawned server. May contain credentials; these
    /// values are passed to the subprocess and must never appear in audit
    /// records.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    #[serde(default)]
    pub mode: VerificationMode,
    /// Tool names requiring review under `selective` mode.
    #[serde(default)]
    pub require_for: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    #[default]
    Always,
    Selective,
    Never,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    #[serde(default)]
    pub can_delegate_to: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Directory for audit JSONL files. Defaults to the session logger's
    /// directory.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Max chars of tool result to include in an audit record.
    #[serde(default)]
    pub max_result_chars: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(rename = "type", default = "default_provider_type")]
    pub kind: String,
    /// Override for the provider API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_provider_type() -> String {
    "anthropic".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_type(),
            base_url: None,
        }
    }
}

/// Configuration rejected at load time. The process exits non-zero; no
/// agent is built from a config that fails these checks.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "verification mode 'never' is not permitted when high-risk tools are enabled: {tools:?}; use 'always' or 'selective'"
    )]
    HighRiskNeverMode { tools: Vec<String> },

    #[error(
        "verification mode 'never' is not permitted when MCP servers are configured: {servers:?}"
    )]
    NeverModeWithMcp { servers: Vec<String> },

    #[error("max_turns must be at least 1")]
    ZeroMaxTurns,

    #[error("agent name must not be empty")]
    EmptyName,

    #[error("unknown built-in tool(s): {names:?}; available: {available:?}")]
    UnknownBuiltinTool {
        names: Vec<String>,
        available: Vec<&'static str>,
    },
}

impl AgentConfig {
    /// Cross-field policy checks, applied after parse and before any agent
    /// is built from this config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.max_turns == 0 {
            return Err(ConfigError::ZeroMaxTurns);
        }

        if self.verification.mode == VerificationMode::Never {
            let risky: Vec<String> = self
                .tools
                .builtin
                .iter()
                .filter(|name| HIGH_RISK_TOOLS.contains(&name.as_str()))
                .cloned()
                .collect();
            if !risky.is_empty() {
                return Err(ConfigError::HighRiskNeverMode { tools: risky });
            }
            // MCP tool names are unknown until connect time, so their risk
            // cannot be assessed here. Require a human-capable mode.
            if !self.tools.mcp.is_empty() {
                let servers = self
                    .tools
                    .mcp
                    .iter()
                    .map(|spec| spec.name.clone())
                    .collect();
                return Err(ConfigError::NeverModeWithMcp { servers });
            }
        }
        Ok(())
    }
}
