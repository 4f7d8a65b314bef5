//! Deterministic, pure logic shared by discovery and scraping.
//!
//! Core modules must be free of browser, oracle, and filesystem side effects.
//! They operate on in-memory data and are fully testable in isolation.

pub mod clean;
pub mod dates;
pub mod ledger;
pub mod locator;
pub mod section;
pub mod site_key;
pub mod types;
