//! Browser, oracle, filesystem and process I/O.

pub mod browser;
pub mod config;
pub mod knowledge;
pub mod oracle;
pub mod process;
pub mod prompt;
pub mod session;
