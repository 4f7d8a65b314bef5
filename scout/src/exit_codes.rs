//! Stable exit codes for scout CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input or config, or a fatal browser/oracle/storage error.
pub const INVALID: i32 = 1;
/// A section could not be discovered within its retry budget.
pub const DISCOVERY_FAILED: i32 = 2;
/// `scout show` or `scout forget` found no stored knowledge for the site.
pub const NO_KNOWLEDGE: i32 = 3;
