//! Security error types.
//!
//! Error messages carry the NIST 800-53 control tag they enforce (SI-3,
//! SI-10, AC-3, AU-9) so that audit records map back to controls without a
//! separate lookup.

use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Machine-level policy violation: blocklist hit, size cap, URL or SSRF
/// failure, or a JSON-Schema mismatch. Maps to the `TOOL_BLOCKED` audit
/// event when raised during dispatch.
#[derive(Debug, Error, Clone)]
pub enum ValidationError {
    #[error("SI-10: command length {len} exceeds maximum {max} characters")]
    CommandTooLong { len: usize, max: usize },

    #[error("SI-3: command blocked by denylist pattern: '{pattern}'")]
    CommandBlocked { pattern: &'static str },

    #[error("SI-10: URL length {len} exceeds maximum {max} characters")]
    UrlTooLong { len: usize, max: usize },

    #[error("SI-10: malformed URL: {detail}")]
    MalformedUrl { detail: String },

    #[error("SI-10/SC-8: URL scheme '{scheme}' is not permitted; allowed: http, https")]
    SchemeNotAllowed { scheme: String },

    #[error("SI-10: URL contains no hostname")]
    MissingHost,

    #[error(
        "AC-3/SI-10: cannot resolve hostname '{host}': {detail}; unresolvable hosts are blocked (fail-closed)"
    )]
    UnresolvableHost { host: String, detail: String },

    #[error("AC-3/SI-10: SSRF blocked: '{host}' resolves to private/reserved address {addr}")]
    SsrfBlocked { host: String, addr: IpAddr },

    #[error("SI-10: '{field}' size {size} bytes exceeds maximum {max} bytes")]
    ContentTooLarge {
        field: String,
        size: usize,
        max: usize,
    },

    #[error("SI-10: args for tool '{tool}' failed schema validation: {detail}")]
    SchemaViolation { tool: String, detail: String },
}

/// Filesystem access denial from the path enforcer. Maps to the
/// `TOOL_ACCESS_DENIED` audit event when raised during dispatch.
#[derive(Debug, Error, Clone)]
pub enum PathAccessError {
    #[error("AC-6: at least one allowed root is required")]
    NoRoots,

    #[error("AC-6: allowed root '{path}' is invalid: {detail}")]
    InvalidRoot { path: PathBuf, detail: String },

    #[error("AC-3: invalid path for '{operation}': {detail}")]
    Unresolvable {
        operation: String,
        detail: String,
    },

    #[error(
        "AC-3/AU-9: '{operation}' denied: '{path}' is inside protected directory '{protected}'"
    )]
    ProtectedDir {
        operation: String,
        path: PathBuf,
        protected: PathBuf,
    },

    #[error("AC-3: '{operation}' denied: '{path}' is outside allowed paths: [{roots}]")]
    OutsideRoots {
        operation: String,
        path: PathBuf,
        roots: String,
    },
}
