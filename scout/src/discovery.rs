//! Propose, validate, remember: the locator discovery loop.
//!
//! One loop serves every section kind. Each attempt renders the page fresh,
//! asks the oracle for locators with the failure ledger attached, and runs the
//! kind's validator. The first proposal that survives is saved to the knowledge
//! store; the loop never runs more than `max_retry_times` attempts.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::clean::{clean_html, truncate_to_budget};
use crate::core::ledger::FailureLedger;
use crate::core::section::{SectionKind, SectionResult};
use crate::io::knowledge::KnowledgeStore;
use crate::io::oracle::{Oracle, OracleRequest};
use crate::io::prompt::{PromptBuilder, PromptInputs};
use crate::io::session::Session;
use crate::validate::{ValidationContext, ValidationOutcome, validate_candidate};

/// Malformed answers are quoted in the ledger up to this many characters.
const RAW_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct DiscoveryRequest<'a> {
    /// Key under which validated locators are stored.
    pub site_url: &'a str,
    /// Page the section lives on (home page for search, result page otherwise).
    pub page_url: &'a str,
    pub kind: SectionKind,
    pub keyword: &'a str,
    pub max_retry_times: u32,
    pub prompt_budget_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Proposal passed validation and was saved.
    Validated {
        section: SectionResult,
        attempts: u32,
        /// Result-page URL for the search section.
        payload: Option<String>,
    },
    /// Every attempt was rejected.
    Exhausted { attempts: u32 },
    /// The oracle declared a role impossible to locate.
    Unresolvable { role: String, attempts: u32 },
}

impl DiscoveryOutcome {
    pub fn is_validated(&self) -> bool {
        matches!(self, DiscoveryOutcome::Validated { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DiscoveryOutcome::Validated { attempts, .. }
            | DiscoveryOutcome::Exhausted { attempts }
            | DiscoveryOutcome::Unresolvable { attempts, .. } => *attempts,
        }
    }
}

/// Run the discovery loop for one section.
///
/// `ledger` is reset first and holds every rejected proposal of this run when the
/// function returns. Oracle and browser transport errors are returned as `Err`;
/// rejected proposals never are.
#[instrument(skip_all, fields(section = %request.kind, page = request.page_url))]
pub fn discover_section<S: Session, O: Oracle>(
    session: &mut S,
    oracle: &O,
    store: &KnowledgeStore,
    ledger: &mut FailureLedger,
    request: &DiscoveryRequest<'_>,
) -> Result<DiscoveryOutcome> {
    ledger.reset();
    let kind = request.kind;
    let prompts = PromptBuilder::new();
    info!(budget = request.max_retry_times, "discovering section");

    for attempt in 1..=request.max_retry_times {
        let html = session
            .render(request.page_url)
            .with_context(|| format!("render {}", request.page_url))?;
        let cleaned = truncate_to_budget(
            &clean_html(&html, kind.denylist()),
            request.prompt_budget_bytes,
        );
        let digest = ledger.digest();
        let pair = prompts.render(&PromptInputs {
            section: kind,
            keyword: request.keyword,
            failed_experiences: &digest,
            cleaned_html: &cleaned,
        })?;
        let raw = oracle
            .propose(&OracleRequest {
                section: kind,
                system_prompt: pair.system,
                user_prompt: pair.user,
                output_schema: kind.output_schema(),
            })
            .with_context(|| format!("ask oracle for {kind} locators"))?;

        let candidate = match SectionResult::from_response(kind, &raw) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(attempt, reason = %err, "oracle answer rejected");
                ledger.record(excerpt(&raw), &err.to_string());
                continue;
            }
        };

        if let Some(role) = candidate.sentinel_role(kind) {
            warn!(attempt, role, "oracle found no stable locator, giving up");
            ledger.record(
                candidate.summary(kind),
                &format!("no stable locator for {role}"),
            );
            return Ok(DiscoveryOutcome::Unresolvable {
                role: role.to_string(),
                attempts: attempt,
            });
        }

        let ctx = ValidationContext {
            page_url: request.page_url,
            keyword: request.keyword,
        };
        match validate_candidate(session, kind, &candidate, ctx)? {
            ValidationOutcome::Passed { payload } => {
                store.save(request.site_url, kind.storage_section(), &candidate)?;
                info!(attempt, locators = %candidate.summary(kind), "section validated");
                return Ok(DiscoveryOutcome::Validated {
                    section: candidate,
                    attempts: attempt,
                    payload,
                });
            }
            ValidationOutcome::Failed { reason } => {
                warn!(attempt, %reason, "proposal rejected");
                ledger.record(candidate.summary(kind), &reason);
            }
        }
    }

    warn!(attempts = request.max_retry_times, "retry budget exhausted");
    Ok(DiscoveryOutcome::Exhausted {
        attempts: request.max_retry_times,
    })
}

fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(RAW_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
