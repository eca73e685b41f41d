//! # agora-cli: Offline Bundle Verifier
//!
//! Provides the `agora-verify` command. A tenant who downloaded an audit
//! bundle from `/v1/audit/export` can check its hash chain without any
//! access to the platform:
//!
//! ```bash
//! agora-verify audit-lyon.json
//! agora-verify -v audit-lyon.json
//! ```
//!
//! Exit codes: `0` chain valid, `1` chain invalid, `2` file unreadable or
//! not JSON.

pub mod verify;

pub use verify::{run_verify, EXIT_INVALID, EXIT_UNREADABLE, EXIT_VALID};
