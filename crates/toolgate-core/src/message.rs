//! Normalized message model shared by the agent loop, providers, and tools.
//!
//! Content blocks are a tagged union so that assistant tool requests and the
//! tool results fed back to the model are explicit types rather than
//! duck-typed maps. Block order within a message is preserved.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }
}

/// A conversation message: a role plus an ordered list of content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn user_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// Concatenation of all text blocks, newline separated.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        parts.join("\n")
    }
}

/// Why the model stopped producing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    /// Any stop reason this runtime does not act on (max_tokens, refusals).
    #[serde(other)]
    Other,
}

/// Normalized provider response: a stop reason plus ordered content blocks.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    /// Concatenation of all text blocks, newline separated.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        parts.join("\n")
    }
}

/// A named, schema-described capability callable by the model.
///
/// `input_schema` is a JSON Schema object; edited arguments are re-validated
/// against it at the verification gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_block_serializes_with_type_tag() {
        let block = ContentBlock::ToolUse {
            id: "toolu_1".into(),
            name: "bash".into(),
            input: json!({"command": "ls"}),
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["name"], "bash");
    }

    #[test]
    fn unknown_stop_reason_maps_to_other() {
        let response: ModelResponse = serde_json::from_value(json!({
            "stop_reason": "max_tokens",
            "content": [{"type": "text", "text": "partial"}],
        }))
        .unwrap();
        assert_eq!(response.stop_reason, StopReason::Other);
    }

    #[test]
    fn response_text_concatenates_text_blocks() {
        let response = ModelResponse {
            stop_reason: StopReason::EndTurn,
            content: vec![
                ContentBlock::text("one"),
                ContentBlock::ToolUse {
                    id: "x".into(),
                    name: "bash".into(),
                    input: json!({}),
                },
                ContentBlock::text("two"),
            ],
        };
        assert_eq!(response.text(), "one\ntwo");
    }

    #[test]
    fn block_order_round_trips() {
        let message = Message::user_blocks(vec![
            ContentBlock::tool_result("a", "first"),
            ContentBlock::tool_result("b", "second"),
        ]);
        let value = serde_json::to_value(&message).unwrap();
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back.content, message.content);
    }
}
