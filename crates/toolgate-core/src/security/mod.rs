//! Security controls for the tool-execution pipeline.
//!
//! Three layers run before any tool side effect:
//!
//! 1. **Machine-level validation** ([`validate`]): command blocklist, size
//!    caps, URL scheme and SSRF checks. These cannot be overridden by human
//!    approval.
//! 2. **Path confinement** ([`enforce`]): filesystem operations are confined
//!    to declared allowed roots and kept out of protected directories such
//!    as the audit log directory.
//! 3. **Scrubbing** ([`scrub`]): values written to the audit log have
//!    secrets replaced with auditable `[REDACTED:<pattern>]` tags.

pub mod enforce;
pub mod errors;
pub mod scrub;
pub mod validate;

pub use enforce::PathEnforcer;
pub use errors::{PathAccessError, ValidationError};
