//! Diagnostic tracing for scout runs.
//!
//! Logs go to stderr so stdout stays reserved for scraped URLs and JSON.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "scout=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `scout=info` so discovery attempts and page
/// progress are visible without configuration.
///
/// # Example
/// ```bash
/// RUST_LOG=scout=debug scout scrape https://blog.example.com --keyword rust
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
