//! Self-configuring search-result scraper.
//!
//! For each site, scout learns how to search, sort by date, read posts and page
//! through results by asking an oracle (an LLM) for element locators and proving
//! every proposal against the live page before trusting it. Proven locators are
//! stored per site so later runs go straight to scraping.
//!
//! - **[`core`]**: Pure logic (locators, sections, failure ledger, HTML cleaning,
//!   date parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (browser session, oracle process, knowledge files,
//!   config). Behind traits where tests need to script them.
//!
//! Orchestration modules ([`discovery`], [`validate`], [`walker`], [`pipeline`])
//! combine the two to implement CLI commands.

pub mod core;
pub mod discovery;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
pub mod walker;
