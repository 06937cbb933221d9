//! End-to-end pipeline scenarios driven by a scripted provider and a
//! scripted operator prompt: blocked commands, SSRF, path denial,
//! edit-then-approve, operator denial, and delegation. Each scenario
//! asserts the exact audit event sequence on disk.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use toolgate_agent::{
    Orchestrator, PromptAnswer, Provider, ProviderError, ProviderRequest,
};
use toolgate_core::{
    AuditLogger, ContentBlock, Message, ModelResponse, Session, StopReason,
};

/// Provider double serving canned responses from a queue shared across all
/// agents in a scenario (sub-agents consume from the same queue, in run
/// order). Every request's message list is recorded for inspection.
#[derive(Clone)]
struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<ModelResponse>>>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

impl Provider for ScriptedProvider {
    fn create_message(&self, request: ProviderRequest<'_>) -> Result<ModelResponse, ProviderError> {
        self.seen.lock().unwrap().push(request.messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Http("script exhausted".to_string()))
    }
}

/// Operator prompt double with a shared answer queue, so parent and
/// sub-agent gates drain the same script.
struct ScriptedPrompt {
    answers: Arc<Mutex<VecDeque<PromptAnswer>>>,
    edits: Arc<Mutex<VecDeque<Value>>>,
}

impl toolgate_agent::OperatorPrompt for ScriptedPrompt {
    fn read_choice(&mut self, _prompt: &str) -> PromptAnswer {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptAnswer::Interrupted)
    }

    fn read_edited_args(&mut self) -> Option<Value> {
        self.edits.lock().unwrap().pop_front()
    }

    fn read_confirm(&mut self, _prompt: &str) -> PromptAnswer {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptAnswer::Interrupted)
    }
}

struct Scenario {
    audit: Arc<AuditLogger>,
    orchestrator: Arc<Orchestrator>,
    provider: ScriptedProvider,
    _audit_dir: tempfile::TempDir,
}

fn scenario(
    agents_dir: &Path,
    responses: Vec<ModelResponse>,
    answers: Vec<PromptAnswer>,
    edits: Vec<Value>,
) -> Scenario {
    let audit_dir = tempfile::tempdir().unwrap();
    let session = Session::new(Some("tester".to_string()));
    let audit = Arc::new(AuditLogger::new(audit_dir.path(), &session).unwrap());

    let provider = ScriptedProvider::new(responses);
    let provider_for_factory = provider.clone();
    let answer_queue = Arc::new(Mutex::new(VecDeque::from(answers)));
    let edit_queue = Arc::new(Mutex::new(VecDeque::from(edits)));

    let orchestrator = Arc::new(
        Orchestrator::new(agents_dir, Arc::clone(&audit))
            .with_provider_factory(Box::new(move |_config| {
                Ok(Box::new(provider_for_factory.clone()))
            }))
            .with_prompt_factory(Box::new(move || {
                Box::new(ScriptedPrompt {
                    answers: Arc::clone(&answer_queue),
                    edits: Arc::clone(&edit_queue),
                })
            })),
    );

    Scenario {
        audit,
        orchestrator,
        provider,
        _audit_dir: audit_dir,
    }
}

fn records(audit: &AuditLogger) -> Vec<Value> {
    std::fs::read_to_string(audit.log_path())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn event_types(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|record| record["event_type"].as_str().unwrap().to_string())
        .collect()
}

fn tool_use(id: &str, name: &str, input: Value) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::ToolUse,
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
    }
}

fn end_turn(text: &str) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::EndTurn,
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
    }
}

fn write_agent(dir: &Path, name: &str, body: String) {
    std::fs::write(dir.join(format!("{name}.yaml")), body).unwrap();
}

/// The tool_result content fed back to the model on the request after the
/// tool turn.
fn last_tool_result(provider: &ScriptedProvider) -> String {
    let requests = provider.requests();
    let last = requests.last().unwrap();
    let message = last.last().unwrap();
    match &message.content[0] {
        ContentBlock::ToolResult { content, .. } => content.clone(),
        other => panic!("expected tool_result, got {other:?}"),
    }
}

#[test]
fn blocked_shell_command_survives_operator_approval() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "shell",
        format!(
            "name: shell\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\ntools:\n  builtin: [bash]\n",
            work.path().display()
        ),
    );

    let s = scenario(
        agents.path(),
        vec![
            tool_use("t1", "bash", json!({"command": "rm -rf /"})),
            end_turn("done"),
        ],
        vec![PromptAnswer::Approve],
        vec![],
    );

    let result = s
        .orchestrator
        .run_from_yaml(agents.path().join("shell.yaml"), "clean up", "")
        .unwrap();
    assert_eq!(result, "done");

    let records = records(&s.audit);
    assert_eq!(
        event_types(&records),
        vec![
            "SESSION_START",
            "AGENT_TASK_START",
            "TOOL_CALL_PROPOSED",
            "VERIFICATION_DECISION",
            "TOOL_BLOCKED",
            "AGENT_TASK_END",
        ]
    );
    assert_eq!(records[3]["verification_choice"], "y");
    assert_eq!(records[3]["outcome"], "approved");
    assert!(records[4]["detail"]
        .as_str()
        .unwrap()
        .contains("rm of root-anchored path"));

    let fed_back = last_tool_result(&s.provider);
    assert!(fed_back.starts_with("Tool call blocked by security policy:"));
}

#[test]
fn ssrf_is_blocked_at_dispatch_after_approval() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "fetcher",
        format!(
            "name: fetcher\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\ntools:\n  builtin: [web_fetch]\n",
            work.path().display()
        ),
    );

    let s = scenario(
        agents.path(),
        vec![
            tool_use(
                "t1",
                "web_fetch",
                json!({"url": "http://169.254.169.254/latest/meta-data/"}),
            ),
            end_turn("ok"),
        ],
        vec![PromptAnswer::Approve],
        vec![],
    );

    s.orchestrator
        .run_from_yaml(agents.path().join("fetcher.yaml"), "fetch metadata", "")
        .unwrap();

    let records = records(&s.audit);
    let types = event_types(&records);
    assert!(types.contains(&"TOOL_BLOCKED".to_string()));
    assert!(!types.contains(&"TOOL_EXECUTED".to_string()));
    let blocked = records
        .iter()
        .find(|record| record["event_type"] == "TOOL_BLOCKED")
        .unwrap();
    let detail = blocked["detail"].as_str().unwrap();
    assert!(detail.contains("SSRF blocked"));
    assert!(detail.contains("169.254"));
}

#[test]
fn path_outside_allowed_roots_is_denied_at_dispatch() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "reader",
        format!(
            "name: reader\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\ntools:\n  builtin: [read_file]\n",
            work.path().display()
        ),
    );

    let s = scenario(
        agents.path(),
        vec![
            tool_use("t1", "read_file", json!({"path": "/etc/passwd"})),
            end_turn("ok"),
        ],
        vec![PromptAnswer::Approve],
        vec![],
    );

    s.orchestrator
        .run_from_yaml(agents.path().join("reader.yaml"), "read the users file", "")
        .unwrap();

    let records = records(&s.audit);
    assert_eq!(
        event_types(&records),
        vec![
            "SESSION_START",
            "AGENT_TASK_START",
            "TOOL_CALL_PROPOSED",
            "VERIFICATION_DECISION",
            "TOOL_ACCESS_DENIED",
            "AGENT_TASK_END",
        ]
    );
    let denied = &records[4];
    assert!(denied["detail"].as_str().unwrap().contains("/etc/passwd"));
    assert!(denied["detail"].as_str().unwrap().contains("outside allowed"));

    assert!(last_tool_result(&s.provider).starts_with("Access denied:"));
}

#[test]
fn edit_then_approve_executes_with_edited_args() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "writer",
        format!(
            "name: writer\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\ntools:\n  builtin: [write_file]\n",
            work.path().display()
        ),
    );

    let target = work.path().join("ok.txt");
    let s = scenario(
        agents.path(),
        vec![
            tool_use("t1", "write_file", json!({"path": "/etc/motd", "content": "bad"})),
            end_turn("written"),
        ],
        vec![PromptAnswer::Edit, PromptAnswer::Approve],
        vec![json!({"path": target, "content": "hi"})],
    );

    s.orchestrator
        .run_from_yaml(agents.path().join("writer.yaml"), "write a note", "")
        .unwrap();

    let records = records(&s.audit);
    assert_eq!(
        event_types(&records),
        vec![
            "SESSION_START",
            "AGENT_TASK_START",
            "TOOL_CALL_PROPOSED",
            "VERIFICATION_DECISION",
            "TOOL_EXECUTED",
            "AGENT_TASK_END",
        ]
    );
    assert_eq!(records[3]["verification_choice"], "e");
    assert_eq!(records[3]["outcome"], "approved");
    assert_eq!(records[4]["outcome"], "success");
    assert_eq!(
        records[4]["result_summary"],
        format!("Successfully wrote 2 chars to {}", target.display())
    );

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "hi");
}

#[test]
fn operator_denial_feeds_refusal_back_to_model() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "shell",
        format!(
            "name: shell\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\ntools:\n  builtin: [bash]\n",
            work.path().display()
        ),
    );

    let s = scenario(
        agents.path(),
        vec![
            tool_use("t1", "bash", json!({"command": "ls"})),
            end_turn("understood"),
        ],
        vec![PromptAnswer::Deny],
        vec![],
    );

    s.orchestrator
        .run_from_yaml(agents.path().join("shell.yaml"), "list files", "")
        .unwrap();

    let records = records(&s.audit);
    assert_eq!(
        event_types(&records),
        vec![
            "SESSION_START",
            "AGENT_TASK_START",
            "TOOL_CALL_PROPOSED",
            "VERIFICATION_DECISION",
            "AGENT_TASK_END",
        ]
    );
    assert_eq!(records[3]["outcome"], "denied");
    assert_eq!(last_tool_result(&s.provider), "User denied this tool call.");
}

#[test]
fn delegation_runs_child_in_same_session() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "parent",
        format!(
            "name: parent\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\nhandoff:\n  can_delegate_to: [child]\n",
            work.path().display()
        ),
    );
    write_agent(
        agents.path(),
        "child",
        format!(
            "name: child\nmodel: model-2\nsystem_prompt: p\nallowed_paths: [\"{}\"]\n",
            work.path().display()
        ),
    );

    let s = scenario(
        agents.path(),
        vec![
            tool_use("t1", "delegate_to_agent", json!({"agent": "child", "task": "do x"})),
            end_turn("child finished x"),
            end_turn("all done"),
        ],
        vec![PromptAnswer::Approve],
        vec![],
    );

    let result = s
        .orchestrator
        .run_from_yaml(agents.path().join("parent.yaml"), "coordinate", "")
        .unwrap();
    assert_eq!(result, "all done");

    let records = records(&s.audit);
    assert_eq!(
        event_types(&records),
        vec![
            "SESSION_START",
            "AGENT_TASK_START",
            "TOOL_CALL_PROPOSED",
            "VERIFICATION_DECISION",
            "AGENT_HANDOFF",
            "AGENT_TASK_START",
            "AGENT_TASK_END",
            "TOOL_EXECUTED",
            "AGENT_TASK_END",
        ]
    );

    let handoff = &records[4];
    assert_eq!(handoff["agent_name"], "parent");
    assert_eq!(handoff["outcome"], "delegating_to:child");
    assert_eq!(handoff["task_summary"], "do x");
    assert_eq!(records[5]["agent_name"], "child");
    assert_eq!(records[6]["agent_name"], "child");
    assert_eq!(records[8]["agent_name"], "parent");

    // All records share the session id.
    let session_ids: Vec<&str> = records
        .iter()
        .map(|record| record["session_id"].as_str().unwrap())
        .collect();
    assert!(session_ids.windows(2).all(|pair| pair[0] == pair[1]));

    // The child's answer is what the parent's model sees as tool output.
    assert_eq!(last_tool_result(&s.provider), "child finished x");
}

#[test]
fn delegation_to_unlisted_agent_is_refused_without_handoff_record() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "parent",
        format!(
            "name: parent\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\nhandoff:\n  can_delegate_to: [child]\n",
            work.path().display()
        ),
    );

    let s = scenario(
        agents.path(),
        vec![
            tool_use("t1", "delegate_to_agent", json!({"agent": "villain", "task": "do x"})),
            end_turn("ok"),
        ],
        vec![PromptAnswer::Approve],
        vec![],
    );

    s.orchestrator
        .run_from_yaml(agents.path().join("parent.yaml"), "coordinate", "")
        .unwrap();

    let records = records(&s.audit);
    let types = event_types(&records);
    assert!(!types.contains(&"AGENT_HANDOFF".to_string()));
    assert!(last_tool_result(&s.provider)
        .contains("not in allowed delegation list"));
}

#[test]
fn max_turns_bounds_the_loop() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "looper",
        format!(
            "name: looper\nmodel: model-1\nsystem_prompt: p\nmax_turns: 2\nallowed_paths: [\"{}\"]\ntools:\n  builtin: [list_dir]\n",
            work.path().display()
        ),
    );

    let list_call = || tool_use("t1", "list_dir", json!({"path": "."}));
    let s = scenario(
        agents.path(),
        vec![list_call(), list_call(), end_turn("never reached")],
        vec![PromptAnswer::Approve, PromptAnswer::Approve],
        vec![],
    );

    s.orchestrator
        .run_from_yaml(agents.path().join("looper.yaml"), "loop forever", "")
        .unwrap();

    let records = records(&s.audit);
    let end = records
        .iter()
        .find(|record| record["event_type"] == "AGENT_TASK_END")
        .unwrap();
    assert_eq!(end["outcome"], "max_turns");
    assert_eq!(end["turns_used"], 2);
}

#[test]
fn provider_failure_still_writes_task_end() {
    let work = tempfile::tempdir().unwrap();
    let agents = tempfile::tempdir().unwrap();
    write_agent(
        agents.path(),
        "doomed",
        format!(
            "name: doomed\nmodel: model-1\nsystem_prompt: p\nallowed_paths: [\"{}\"]\n",
            work.path().display()
        ),
    );

    // Empty script: the first provider call fails.
    let s = scenario(agents.path(), vec![], vec![], vec![]);

    let err = s
        .orchestrator
        .run_from_yaml(agents.path().join("doomed.yaml"), "task", "")
        .unwrap_err();
    assert!(err.to_string().contains("script exhausted"));

    let records = records(&s.audit);
    let end = records.last().unwrap();
    assert_eq!(end["event_type"], "AGENT_TASK_END");
    assert_eq!(end["outcome"], "error");
}
