//! Web fetch tool.
//!
//! The URL is validated (scheme, length, SSRF) before any network I/O.
//! Redirects are not followed, so an open redirect cannot route an
//! approved request to an unvalidated destination. Response bodies are
//! size-capped.

use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use toolgate_core::{check_content_size, validate_url, ToolError, ToolSchema};

use super::{parse_args, run_async};
use crate::Tool;

/// Fetch timeout cap in seconds.
const MAX_FETCH_TIMEOUT: i64 = 60;

const USER_AGENT: &str = concat!("toolgate/", env!("CARGO_PKG_VERSION"));

fn default_timeout() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
struct WebFetchArgs {
    url: String,
    #[serde(default = "default_timeout")]
    timeout: i64,
}

/// Fetch a URL and return the response body as text.
pub struct WebFetchTool;

impl WebFetchTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn call(&self, args: &Value) -> Result<String, ToolError> {
        let args: WebFetchArgs = parse_args(args)?;
        validate_url(&args.url)?;
        let timeout = args.timeout.clamp(1, MAX_FETCH_TIMEOUT) as u64;
        let url = args.url;

        run_async(move || async move {
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .timeout(Duration::from_secs(timeout))
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| ToolError::Failed(format!("failed to build HTTP client: {e}")))?;

            let response = match client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => return Ok(format!("Request error: {e}")),
            };

            let status = response.status();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string();

            if !status.is_success() {
                return Ok(format!("HTTP error {}: request to '{url}' failed", status.as_u16()));
            }

            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => return Ok(format!("Request error: {e}")),
            };
            check_content_size(&text, "response_body")?;

            Ok(format!(
                "[Status: {}] [Content-Type: {content_type}]\n\n{text}",
                status.as_u16()
            ))
        })
    }
}

pub fn web_fetch_schema() -> ToolSchema {
    ToolSchema {
        name: "web_fetch".to_string(),
        description: "Fetch the content of a web URL and return the response body. \
                      Only http/https allowed. Private/internal addresses are blocked."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "URL to fetch (http/https only)"},
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (max 60, default 30)",
                    "default": 30,
                },
            },
            "required": ["url"],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::ValidationError;

    #[test]
    fn non_http_scheme_is_blocked() {
        let tool = WebFetchTool::new();
        let err = tool
            .call(&json!({"url": "file:///etc/passwd"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Blocked(ValidationError::SchemeNotAllowed { .. })
        ));
    }

    #[test]
    fn metadata_endpoint_is_blocked_before_any_io() {
        let tool = WebFetchTool::new();
        let err = tool
            .call(&json!({"url": "http://169.254.169.254/latest/meta-data/"}))
            .unwrap_err();
        let detail = err.to_string();
        assert!(detail.contains("SSRF blocked"));
        assert!(detail.contains("169.254"));
    }

    #[test]
    fn loopback_is_blocked() {
        let tool = WebFetchTool::new();
        assert!(tool.call(&json!({"url": "http://127.0.0.1:8080/"})).is_err());
    }

    #[test]
    fn missing_url_is_bad_args() {
        let tool = WebFetchTool::new();
        assert!(matches!(
            tool.call(&json!({})),
            Err(ToolError::BadArgs(_))
        ));
    }
}
