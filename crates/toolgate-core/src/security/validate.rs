//! Machine-level input validation.
//!
//! These checks run before the human verification gate and cannot be
//! overridden by operator approval. The command blocklist and SSRF guard
//! enforce a deny policy at the machine level; the gate is an additional
//! control on top, not a substitute.
//!
//! Pure functions, with one exception: the SSRF check performs DNS
//! resolution and fails closed when a host does not resolve.

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use url::Url;

use super::errors::ValidationError;

/// Maximum shell command length in characters.
pub const MAX_COMMAND_LEN: usize = 4_096;

/// Maximum content size in bytes for tool inputs and responses.
pub const MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;

/// Maximum URL length in characters.
pub const MAX_URL_LEN: usize = 2_048;

/// Maximum shell command timeout in seconds.
pub const MAX_BASH_TIMEOUT: u64 = 300;

/// Shell command denylist. Matching commands are rejected unconditionally,
/// before the verification gate sees them.
static BASH_BLOCKLIST: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"(?i)\brm\s+(-[a-zA-Z]*f[a-zA-Z]*\s+|--force\s+)?/",
            "rm of root-anchored path",
        ),
        (r"(?i)\bmkfs\b", "filesystem format"),
        (r"(?i)\bdd\b.*\bof=/dev/", "raw device write via dd"),
        (r"(?i)>\s*/dev/sd[a-z]\b", "redirect to block device"),
        (r"(?i)\bshred\b", "secure file deletion"),
        (r"(?i)\bwipefs\b", "filesystem wipe"),
        (r":\(\)\s*\{.*\}.*:", "fork bomb"),
        (
            r"(?i)\bcurl\b[^|]*\|\s*(bash|sh|python3?|perl|ruby)\b",
            "curl pipe-to-shell",
        ),
        (
            r"(?i)\bwget\b[^|]*\|\s*(bash|sh|python3?|perl|ruby)\b",
            "wget pipe-to-shell",
        ),
        (
            r"(?i)>\s*/etc/(passwd|shadow|sudoers|crontab)\b",
            "system credential file overwrite",
        ),
        (r"(?i)\biptables\s+-F\b", "firewall rule flush"),
        (r"(?i)\bufw\s+disable\b", "firewall disable"),
        (r"(?i)\bkill\s+-9\s+-1\b", "kill all processes"),
        (
            r"(?i)\bchmod\s+(777|a\+rwx)\s+/",
            "world-write on root-anchored path",
        ),
    ]
    .into_iter()
    .map(|(pattern, desc)| (Regex::new(pattern).unwrap(), desc))
    .collect()
});

/// Validate a shell command against the denylist and size cap.
pub fn validate_bash_command(command: &str) -> Result<(), ValidationError> {
    let len = command.chars().count();
    if len > MAX_COMMAND_LEN {
        return Err(ValidationError::CommandTooLong {
            len,
            max: MAX_COMMAND_LEN,
        });
    }
    for (pattern, desc) in BASH_BLOCKLIST.iter() {
        if pattern.is_match(command) {
            return Err(ValidationError::CommandBlocked { pattern: desc });
        }
    }
    Ok(())
}

/// Clamp a shell command timeout to `1..=300` seconds.
pub fn validate_bash_timeout(timeout: i64) -> u64 {
    timeout.clamp(1, MAX_BASH_TIMEOUT as i64) as u64
}

/// Validate a URL for safe fetching.
///
/// Blocks non-http(s) schemes, oversized URLs, and hosts that resolve to
/// private, loopback, link-local, or otherwise reserved addresses.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let len = url.chars().count();
    if len > MAX_URL_LEN {
        return Err(ValidationError::UrlTooLong {
            len,
            max: MAX_URL_LEN,
        });
    }

    let parsed = Url::parse(url).map_err(|e| ValidationError::MalformedUrl {
        detail: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::SchemeNotAllowed {
                scheme: other.to_string(),
            });
        }
    }

    let host = parsed.host_str().ok_or(ValidationError::MissingHost)?;
    // Url keeps IPv6 literals bracketed.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    check_ssrf(host)
}

/// Resolve a hostname and reject it if any resolved address is reserved.
/// Unresolvable hosts are rejected (fail-closed).
fn check_ssrf(host: &str) -> Result<(), ValidationError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_reserved(ip) {
            return Err(ValidationError::SsrfBlocked {
                host: host.to_string(),
                addr: ip,
            });
        }
        return Ok(());
    }

    let addrs: Vec<_> = (host, 80u16)
        .to_socket_addrs()
        .map_err(|e| ValidationError::UnresolvableHost {
            host: host.to_string(),
            detail: e.to_string(),
        })?
        .collect();

    if addrs.is_empty() {
        return Err(ValidationError::UnresolvableHost {
            host: host.to_string(),
            detail: "no addresses returned".to_string(),
        });
    }

    for addr in addrs {
        let ip = addr.ip();
        if is_reserved(ip) {
            return Err(ValidationError::SsrfBlocked {
                host: host.to_string(),
                addr: ip,
            });
        }
    }
    Ok(())
}

/// Reserved ranges: loopback, link-local, multicast, RFC 1918, shared
/// address space (RFC 6598), the zero network, and their IPv6 analogues.
fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => is_reserved_v6(v6),
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_private()
        || ip.is_unspecified()
        || octets[0] == 0
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_reserved_v4(mapped);
    }
    let segments = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (segments[0] & 0xfe00) == 0xfc00
        || (segments[0] & 0xffc0) == 0xfe80
}

/// Reject content exceeding the size cap. `field` names the offending value
/// in the error detail.
pub fn check_content_size(content: &str, field: &str) -> Result<(), ValidationError> {
    let size = content.len();
    if size > MAX_CONTENT_BYTES {
        return Err(ValidationError::ContentTooLarge {
            field: field.to_string(),
            size,
            max: MAX_CONTENT_BYTES,
        });
    }
    Ok(())
}

/// Validate tool arguments against the tool's declared input schema.
///
/// Called after human edits at the verification gate, so operator-edited
/// args still conform to the declared schema before execution.
pub fn validate_tool_args(
    tool_name: &str,
    args: &Value,
    input_schema: &Value,
) -> Result<(), ValidationError> {
    let compiled =
        JSONSchema::compile(input_schema).map_err(|e| ValidationError::SchemaViolation {
            tool: tool_name.to_string(),
            detail: e.to_string(),
        })?;
    if let Err(errors) = compiled.validate(args) {
        let detail = errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ValidationError::SchemaViolation {
            tool: tool_name.to_string(),
            detail,
        });
    }
    Ok(())
}
