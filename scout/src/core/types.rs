//! Shared types produced by a scrape run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One collected post. `date` is `None` when the date text did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub url: String,
    pub date: Option<NaiveDateTime>,
}

impl Post {
    /// True when the post has a known date no older than `cutoff`.
    ///
    /// Unknown dates are never in range.
    pub fn is_on_or_after(&self, cutoff: NaiveDateTime) -> bool {
        self.date.is_some_and(|date| date >= cutoff)
    }
}
