//! Failure ledger replayed to the oracle on every discovery attempt.

/// Digest returned while no attempt has failed yet.
pub const NO_FAILURES: &str = "There is no previous failed experience.";

/// Markers after which browser diagnostics carry no signal for the oracle.
const NOISE_MARKERS: [&str; 2] = ["Stacktrace:", "(Session info:"];

/// One rejected proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// 1-indexed position in the ledger.
    pub attempt_index: u32,
    /// Short description of the rejected locators.
    pub proposal: String,
    /// Why the proposal was rejected, already cleaned.
    pub reason: String,
}

/// Append-only log of rejected proposals for one discovery run.
#[derive(Debug, Clone, Default)]
pub struct FailureLedger {
    records: Vec<FailureRecord>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure. Repeats are kept; repetition is signal for the oracle.
    pub fn record(&mut self, proposal: impl Into<String>, reason: &str) {
        let attempt_index = self.records.len() as u32 + 1;
        self.records.push(FailureRecord {
            attempt_index,
            proposal: proposal.into(),
            reason: clean_reason(reason),
        });
    }

    /// Render every failure so far as a 1-indexed list.
    pub fn digest(&self) -> String {
        if self.records.is_empty() {
            return NO_FAILURES.to_string();
        }
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&format!("{}. ", record.attempt_index));
            if !record.proposal.is_empty() {
                out.push_str(&record.proposal);
                out.push_str(", ");
            }
            out.push_str("error_message: ");
            out.push_str(&record.reason);
            out.push('\n');
        }
        out
    }

    /// Clear all records. Only called between independent discovery runs.
    pub fn reset(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Cut trailing stack/session diagnostics and trim.
pub fn clean_reason(reason: &str) -> String {
    let mut cleaned = reason;
    for marker in NOISE_MARKERS {
        if let Some(idx) = cleaned.find(marker) {
            cleaned = &cleaned[..idx];
        }
    }
    cleaned.trim().to_string()
}
