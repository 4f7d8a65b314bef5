//! Live validation of proposed locators.
//!
//! Each section kind has one validator that exercises the proposal against the
//! page. DOM failures reject the proposal; anything else is fatal and
//! propagates to the caller.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::section::{
    BLOG_DATE, BLOG_ITEM, BLOG_URL, NEXT_PAGE_BUTTON, SEARCH_BAR, SORT_DATE_OPTION, SORT_DROPDOWN,
    SectionKind, SectionResult,
};
use crate::io::session::{Session, dom_failure};

/// Page number substituted into pagination proposals while validating.
pub const TRIAL_PAGE: u32 = 2;

/// Page state the validator runs against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// URL the candidate page was rendered from.
    pub page_url: &'a str,
    pub keyword: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// `payload` carries the post-search URL for the search section.
    Passed { payload: Option<String> },
    Failed { reason: String },
}

impl ValidationOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Exercise `candidate` on the current page of `session`.
///
/// Assumes the page at `ctx.page_url` has just been rendered.
#[instrument(skip_all, fields(section = %kind))]
pub fn validate_candidate<S: Session>(
    session: &mut S,
    kind: SectionKind,
    candidate: &SectionResult,
    ctx: ValidationContext<'_>,
) -> Result<ValidationOutcome> {
    let attempt = match kind {
        SectionKind::Search => try_search(session, candidate, ctx),
        SectionKind::Sort => try_sort(session, candidate),
        SectionKind::Extract => try_extract(session, candidate),
        SectionKind::Pagination => try_pagination(session, candidate),
    };
    match attempt {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            let reason = dom_failure(err)?;
            debug!(%reason, "candidate rejected by page");
            Ok(ValidationOutcome::Failed { reason })
        }
    }
}

/// Type the keyword, submit, and require the URL to change.
///
/// The baseline is the URL the browser actually shows, which may differ from
/// `ctx.page_url` after normalisation or redirects.
fn try_search<S: Session>(
    session: &mut S,
    candidate: &SectionResult,
    ctx: ValidationContext<'_>,
) -> Result<ValidationOutcome> {
    let search_bar = candidate.require(SEARCH_BAR)?;
    let before = session.current_url()?;
    let input = session.find(search_bar)?;
    session.type_text(&input, ctx.keyword)?;
    session.press_enter(&input)?;
    session.settle();
    let landed = session.current_url()?;
    if landed == before || landed == ctx.page_url {
        return Ok(ValidationOutcome::failed(format!(
            "search did not navigate: URL is still {landed}"
        )));
    }
    Ok(ValidationOutcome::Passed {
        payload: Some(landed),
    })
}

fn try_sort<S: Session>(session: &mut S, candidate: &SectionResult) -> Result<ValidationOutcome> {
    let dropdown = session.find(candidate.require(SORT_DROPDOWN)?)?;
    session.click(&dropdown)?;
    session.settle();
    let option = session.find(candidate.require(SORT_DATE_OPTION)?)?;
    session.click(&option)?;
    Ok(ValidationOutcome::Passed { payload: None })
}

/// Only the first item is checked; later items are trusted to share its shape.
fn try_extract<S: Session>(
    session: &mut S,
    candidate: &SectionResult,
) -> Result<ValidationOutcome> {
    let items = session.find_all(candidate.require(BLOG_ITEM)?)?;
    let Some(first) = items.first() else {
        return Ok(ValidationOutcome::failed("No blog items found on the page."));
    };
    session.find_within(first, candidate.require(BLOG_URL)?)?;
    session.find_within(first, candidate.require(BLOG_DATE)?)?;
    debug!(items = items.len(), "extract locators resolved on first item");
    Ok(ValidationOutcome::Passed { payload: None })
}

fn try_pagination<S: Session>(
    session: &mut S,
    candidate: &SectionResult,
) -> Result<ValidationOutcome> {
    let next = candidate.require(NEXT_PAGE_BUTTON)?.for_page(TRIAL_PAGE);
    let button = session.find(&next)?;
    session.click(&button)?;
    Ok(ValidationOutcome::Passed { payload: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::locator::{Locator, LocatorKind};
    use crate::test_support::{FakeNode, FakePage, FakeSession, post_node};

    const HOME: &str = "https://blog.example.com/";
    const RESULTS: &str = "https://blog.example.com/search?q=rust";

    fn ctx(page_url: &str) -> ValidationContext<'_> {
        ValidationContext {
            page_url,
            keyword: "rust",
        }
    }

    fn loaded(url: &str, page: FakePage) -> FakeSession {
        let mut session = FakeSession::new().with_page(url, page);
        session.render(url).expect("render");
        session
    }

    #[test]
    fn search_passes_when_url_changes() {
        let search_bar = Locator::new(LocatorKind::Name, "q");
        let mut session = loaded(
            HOME,
            FakePage::new("").with(search_bar.clone(), FakeNode::new().on_submit(RESULTS)),
        );
        let candidate = SectionResult::new().with(SEARCH_BAR, search_bar);

        let outcome = validate_candidate(&mut session, SectionKind::Search, &candidate, ctx(HOME))
            .expect("validate");

        assert_eq!(
            outcome,
            ValidationOutcome::Passed {
                payload: Some(RESULTS.to_string())
            }
        );
    }

    #[test]
    fn search_fails_when_url_stays_the_same() {
        let search_bar = Locator::new(LocatorKind::Name, "q");
        let mut session = loaded(
            HOME,
            FakePage::new("").with(search_bar.clone(), FakeNode::new()),
        );
        let candidate = SectionResult::new().with(SEARCH_BAR, search_bar);

        let outcome = validate_candidate(&mut session, SectionKind::Search, &candidate, ctx(HOME))
            .expect("validate");

        assert!(matches!(outcome, ValidationOutcome::Failed { reason } if reason.contains("did not navigate")));
    }

    #[test]
    fn search_fails_when_only_browser_normalisation_changed_the_url() {
        let bare = "https://news.example.com";
        let normalised = "https://news.example.com/";
        let search_bar = Locator::new(LocatorKind::Name, "q");
        let mut session = FakeSession::new()
            .with_redirect(bare, normalised)
            .with_page(
                normalised,
                FakePage::new("").with(search_bar.clone(), FakeNode::new()),
            );
        session.render(bare).expect("render");
        let candidate = SectionResult::new().with(SEARCH_BAR, search_bar);

        let outcome = validate_candidate(&mut session, SectionKind::Search, &candidate, ctx(bare))
            .expect("validate");

        assert!(matches!(outcome, ValidationOutcome::Failed { reason } if reason.contains("did not navigate")));
    }

    #[test]
    fn sort_fails_when_option_is_not_interactable() {
        let dropdown = Locator::css("button.sort");
        let option = Locator::css("li[data-sort=date]");
        let mut session = loaded(
            RESULTS,
            FakePage::new("")
                .with(dropdown.clone(), FakeNode::new())
                .with(option.clone(), FakeNode::new().disabled()),
        );
        let candidate = SectionResult::new()
            .with(SORT_DROPDOWN, dropdown.clone())
            .with(SORT_DATE_OPTION, option);

        let outcome = validate_candidate(&mut session, SectionKind::Sort, &candidate, ctx(RESULTS))
            .expect("validate");

        assert!(matches!(outcome, ValidationOutcome::Failed { reason } if reason.contains("not interactable")));
        assert!(session.clicked(&dropdown));
    }

    #[test]
    fn extract_requires_at_least_one_item() {
        let mut session = loaded(RESULTS, FakePage::new(""));
        let candidate = SectionResult::new()
            .with(BLOG_ITEM, Locator::css("li.post"))
            .with(BLOG_URL, Locator::css("a"))
            .with(BLOG_DATE, Locator::css("time"));

        let outcome =
            validate_candidate(&mut session, SectionKind::Extract, &candidate, ctx(RESULTS))
                .expect("validate");

        assert_eq!(
            outcome,
            ValidationOutcome::Failed {
                reason: "No blog items found on the page.".to_string()
            }
        );
    }

    #[test]
    fn extract_checks_children_of_first_item_only() {
        let item = Locator::css("li.post");
        let url = Locator::css("a");
        let date = Locator::css("time");
        let mut session = loaded(
            RESULTS,
            FakePage::new("")
                .with(item.clone(), post_node(&url, &date, "/p/1", "1 days ago"))
                .with(item.clone(), FakeNode::new()),
        );
        let candidate = SectionResult::new()
            .with(BLOG_ITEM, item)
            .with(BLOG_URL, url)
            .with(BLOG_DATE, date);

        let outcome =
            validate_candidate(&mut session, SectionKind::Extract, &candidate, ctx(RESULTS))
                .expect("validate");

        assert_eq!(outcome, ValidationOutcome::Passed { payload: None });
    }

    #[test]
    fn pagination_tries_page_two() {
        let mut session = loaded(
            RESULTS,
            FakePage::new("").with(Locator::css("a[data-page='2']"), FakeNode::new()),
        );
        let candidate =
            SectionResult::new().with(NEXT_PAGE_BUTTON, Locator::css("a[data-page='{page_num}']"));

        let outcome =
            validate_candidate(&mut session, SectionKind::Pagination, &candidate, ctx(RESULTS))
                .expect("validate");

        assert_eq!(outcome, ValidationOutcome::Passed { payload: None });
        assert!(session.clicked(&Locator::css("a[data-page='2']")));
    }

    #[test]
    fn missing_element_becomes_rejection_reason() {
        let mut session = loaded(HOME, FakePage::new(""));
        let candidate = SectionResult::new().with(SEARCH_BAR, Locator::css("input"));

        let outcome = validate_candidate(&mut session, SectionKind::Search, &candidate, ctx(HOME))
            .expect("validate");

        assert_eq!(
            outcome,
            ValidationOutcome::Failed {
                reason: "no such element: Unable to locate element: css selector=input".to_string()
            }
        );
        assert!(session.typed.is_empty());
    }
}
