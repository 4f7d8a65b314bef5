//! One site, end to end: learn what is missing, then scrape.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};

use crate::core::ledger::FailureLedger;
use crate::core::section::{SEARCH_BAR, SORT_DATE_OPTION, SORT_DROPDOWN, SectionKind};
use crate::discovery::{DiscoveryOutcome, DiscoveryRequest, discover_section};
use crate::io::config::ScoutConfig;
use crate::io::knowledge::{KnowledgeRecord, KnowledgeStore};
use crate::io::oracle::Oracle;
use crate::io::session::Session;
use crate::walker::{WalkLocators, WalkOptions, WalkReport, walk};

#[derive(Debug, Clone)]
pub struct SiteRequest<'a> {
    /// Home page; also the knowledge key.
    pub site_url: &'a str,
    pub keyword: &'a str,
    pub window_days: Option<u32>,
    pub now: NaiveDateTime,
    pub max_retry_times: u32,
    pub prompt_budget_bytes: usize,
    pub max_pages: u32,
}

impl<'a> SiteRequest<'a> {
    pub fn new(
        site_url: &'a str,
        keyword: &'a str,
        window_days: Option<u32>,
        now: NaiveDateTime,
        cfg: &ScoutConfig,
    ) -> Self {
        Self {
            site_url,
            keyword,
            window_days,
            now,
            max_retry_times: cfg.max_retry_times,
            prompt_budget_bytes: cfg.prompt_budget_bytes,
            max_pages: cfg.max_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteOutcome {
    Scraped(WalkReport),
    /// A section could not be learned; nothing was scraped.
    DiscoveryFailed {
        section: SectionKind,
        outcome: DiscoveryOutcome,
    },
}

/// Discover every section the store does not know yet, in order, then scrape.
///
/// The first section that fails discovery halts the site. Known locators that
/// fail during replay are an error: the site changed under stored knowledge.
#[instrument(skip_all, fields(site = request.site_url, keyword = request.keyword))]
pub fn run_site<S: Session, O: Oracle>(
    session: &mut S,
    oracle: &O,
    store: &KnowledgeStore,
    request: &SiteRequest<'_>,
) -> Result<SiteOutcome> {
    let site = request.site_url;
    session
        .render(site)
        .with_context(|| format!("render {site}"))?;
    let mut record = store
        .lookup(site)?
        .unwrap_or_else(|| KnowledgeRecord::new(site));

    let mut ledger = FailureLedger::new();
    let mut result_url: Option<String> = None;
    for kind in SectionKind::ORDER {
        if record.covers(kind) {
            info!(section = %kind, "section already known");
            continue;
        }
        let page_url = if kind == SectionKind::Search {
            site.to_string()
        } else if let Some(url) = &result_url {
            url.clone()
        } else {
            let url = replay_search(session, &record, request)?;
            result_url = Some(url.clone());
            url
        };
        let outcome = discover_section(
            session,
            oracle,
            store,
            &mut ledger,
            &DiscoveryRequest {
                site_url: site,
                page_url: &page_url,
                kind,
                keyword: request.keyword,
                max_retry_times: request.max_retry_times,
                prompt_budget_bytes: request.prompt_budget_bytes,
            },
        )?;
        match outcome {
            DiscoveryOutcome::Validated { payload, .. } => {
                if kind == SectionKind::Search {
                    result_url = payload;
                }
                record = store
                    .lookup(site)?
                    .ok_or_else(|| anyhow!("knowledge for {site} vanished after saving"))?;
            }
            outcome => {
                warn!(section = %kind, ?outcome, "discovery failed, halting site");
                return Ok(SiteOutcome::DiscoveryFailed {
                    section: kind,
                    outcome,
                });
            }
        }
    }

    let report = scrape(session, &record, request)?;
    info!(posts = report.posts.len(), pages = report.pages_visited, "site scraped");
    Ok(SiteOutcome::Scraped(report))
}

/// Replay known controls from the home page, then walk the results.
fn scrape<S: Session>(
    session: &mut S,
    record: &KnowledgeRecord,
    request: &SiteRequest<'_>,
) -> Result<WalkReport> {
    let locators = WalkLocators::from_record(record)
        .ok_or_else(|| anyhow!("extract and pagination locators missing for {}", record.url))?;
    replay_search(session, record, request)?;
    replay_sort(session, record)?;
    walk(
        session,
        &locators,
        &WalkOptions {
            window_days: request.window_days,
            now: request.now,
            max_pages: request.max_pages,
        },
    )
}

/// Search the keyword with the stored search bar. Returns the result-page URL.
fn replay_search<S: Session>(
    session: &mut S,
    record: &KnowledgeRecord,
    request: &SiteRequest<'_>,
) -> Result<String> {
    let search = record
        .locators_for(SectionKind::Search)
        .ok_or_else(|| anyhow!("search locator missing for {}", record.url))?;
    let search_bar = search.require(SEARCH_BAR)?;
    session
        .render(request.site_url)
        .with_context(|| format!("render {}", request.site_url))?;
    let input = session
        .find(search_bar)
        .with_context(|| format!("replay search bar {search_bar}"))?;
    session.type_text(&input, request.keyword)?;
    session.press_enter(&input)?;
    session.settle();
    let url = session.current_url()?;
    info!(%url, "search replayed");
    Ok(url)
}

fn replay_sort<S: Session>(session: &mut S, record: &KnowledgeRecord) -> Result<()> {
    let sort = record
        .locators_for(SectionKind::Sort)
        .ok_or_else(|| anyhow!("sort locators missing for {}", record.url))?;
    for role in [SORT_DROPDOWN, SORT_DATE_OPTION] {
        let locator = sort.require(role)?;
        let element = session
            .find(locator)
            .with_context(|| format!("replay {role} {locator}"))?;
        session
            .click(&element)
            .with_context(|| format!("replay {role} {locator}"))?;
        session.settle();
    }
    info!("sort replayed");
    Ok(())
}
