//! Result-page walker: collect posts page by page until the results go stale.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::dates::parse_post_date;
use crate::core::locator::Locator;
use crate::core::section::{BLOG_DATE, BLOG_ITEM, BLOG_URL, NEXT_PAGE_BUTTON, SectionKind};
use crate::core::types::Post;
use crate::io::knowledge::KnowledgeRecord;
use crate::io::session::{Session, dom_failure};

/// Validated locators the walker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkLocators {
    pub blog_item: Locator,
    /// Resolved inside each item.
    pub blog_url: Locator,
    /// Resolved inside each item.
    pub blog_date: Locator,
    /// May contain the `{page_num}` placeholder.
    pub next_page_button: Locator,
}

impl WalkLocators {
    /// Extract and pagination locators from a record, if both are known.
    pub fn from_record(record: &KnowledgeRecord) -> Option<Self> {
        let extract = record.locators_for(SectionKind::Extract)?;
        let paging = record.locators_for(SectionKind::Pagination)?;
        Some(Self {
            blog_item: extract.get(BLOG_ITEM)?.clone(),
            blog_url: extract.get(BLOG_URL)?.clone(),
            blog_date: extract.get(BLOG_DATE)?.clone(),
            next_page_button: paging.get(NEXT_PAGE_BUTTON)?.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Only keep posts from the last N days. `None` keeps everything.
    pub window_days: Option<u32>,
    pub now: NaiveDateTime,
    pub max_pages: u32,
}

impl WalkOptions {
    fn cutoff(&self) -> Option<NaiveDateTime> {
        let days = Duration::try_days(i64::from(self.window_days?))?;
        self.now.checked_sub_signed(days)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkReport {
    pub posts: Vec<Post>,
    pub pages_visited: u32,
}

/// Walk result pages starting from the one currently loaded in `session`.
///
/// Stops when a page yields no in-window posts, when the next-page control
/// cannot be found or clicked, or at `max_pages`. Stopping is never an error;
/// only non-DOM failures are.
#[instrument(skip_all, fields(window_days = ?options.window_days, max_pages = options.max_pages))]
pub fn walk<S: Session>(
    session: &mut S,
    locators: &WalkLocators,
    options: &WalkOptions,
) -> Result<WalkReport> {
    let cutoff = options.cutoff();
    let mut seen: HashSet<String> = HashSet::new();
    let mut report = WalkReport::default();
    let mut page: u32 = 1;

    loop {
        report.pages_visited = page;
        let items = match session.find_all(&locators.blog_item) {
            Ok(items) => items,
            Err(err) => {
                let reason = dom_failure(err)?;
                debug!(page, %reason, "item lookup failed, treating page as empty");
                Vec::new()
            }
        };

        let mut in_window = Vec::new();
        for item in &items {
            let Some(post) = read_post(session, item, locators, options.now)? else {
                continue;
            };
            if cutoff.is_some_and(|cutoff| !post.is_on_or_after(cutoff)) {
                continue;
            }
            in_window.push(post);
        }
        // Seen posts count toward `in_range` but are not kept twice.
        let in_range = in_window.len();
        let mut fresh: Vec<Post> = in_window
            .into_iter()
            .filter(|post| seen.insert(post.url.clone()))
            .collect();
        info!(page, items = items.len(), in_range, new = fresh.len(), "page scraped");
        if in_range == 0 {
            info!(page, "no posts in range, stopping");
            break;
        }
        report.posts.append(&mut fresh);

        if page >= options.max_pages {
            info!(page, "page cap reached, stopping");
            break;
        }
        let next = locators.next_page_button.for_page(page + 1);
        if let Err(err) = click_next(session, &next) {
            let reason = dom_failure(err)?;
            info!(page, %reason, "no next page, stopping");
            break;
        }
        session.settle();
        page += 1;
    }

    Ok(report)
}

fn click_next<S: Session>(session: &mut S, next: &Locator) -> Result<()> {
    let button = session.find(next)?;
    session.click(&button)
}

/// Read one item. `Ok(None)` skips an item whose link or date cannot be resolved.
fn read_post<S: Session>(
    session: &mut S,
    item: &S::Element,
    locators: &WalkLocators,
    now: NaiveDateTime,
) -> Result<Option<Post>> {
    let (href, date_text) = match read_fields(session, item, locators) {
        Ok(fields) => fields,
        Err(err) => {
            let reason = dom_failure(err)?;
            debug!(%reason, "skipping item");
            return Ok(None);
        }
    };
    let Some(url) = href.map(|href| href.trim().to_string()).filter(|url| !url.is_empty()) else {
        debug!("skipping item without link");
        return Ok(None);
    };
    Ok(Some(Post {
        url,
        date: parse_post_date(&date_text, now),
    }))
}

fn read_fields<S: Session>(
    session: &mut S,
    item: &S::Element,
    locators: &WalkLocators,
) -> Result<(Option<String>, String)> {
    let link = session.find_within(item, &locators.blog_url)?;
    let href = session.attribute(&link, "href")?;
    let date = session.find_within(item, &locators.blog_date)?;
    let date_text = session.text(&date)?;
    Ok((href, date_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePage, FakeSession, FakeNode, post_node};
    use chrono::NaiveDate;

    const RESULTS: &str = "https://blog.example.com/search?q=rust";

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    fn locators() -> WalkLocators {
        WalkLocators {
            blog_item: Locator::css("li.post"),
            blog_url: Locator::css("a.title"),
            blog_date: Locator::css("span.date"),
            next_page_button: Locator::css("a.page-{page_num}"),
        }
    }

    fn page_url(n: u32) -> String {
        format!("{RESULTS}&page={n}")
    }

    /// Results page `n` listing `posts` as (href, date text), linking to page `n + 1`.
    fn page(n: u32, posts: &[(&str, &str)]) -> FakePage {
        let l = locators();
        let mut page = FakePage::new("<ul></ul>");
        for (href, date) in posts {
            page = page.with(l.blog_item.clone(), post_node(&l.blog_url, &l.blog_date, href, date));
        }
        page.with(
            l.next_page_button.for_page(n + 1),
            FakeNode::new().on_click(&page_url(n + 1)),
        )
    }

    fn options(window_days: Option<u32>) -> WalkOptions {
        WalkOptions {
            window_days,
            now: now(),
            max_pages: 100,
        }
    }

    fn start(session: FakeSession) -> FakeSession {
        let mut session = session;
        session.render(&page_url(1)).expect("render first page");
        session
    }

    #[test]
    fn stops_when_page_has_no_posts_in_window_without_clicking_further() {
        let session = FakeSession::new()
            .with_page(&page_url(1), page(1, &[("/p/1", "1 days ago"), ("/p/2", "2 days ago")]))
            .with_page(&page_url(2), page(2, &[("/p/3", "3 天前")]))
            .with_page(&page_url(3), page(3, &[("/p/4", "2020-01-01"), ("/p/5", "2019/12/31")]));
        let mut session = start(session);

        let report = walk(&mut session, &locators(), &options(Some(7))).expect("walk");

        let urls: Vec<&str> = report.posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/p/1", "/p/2", "/p/3"]);
        assert_eq!(report.pages_visited, 3);
        assert!(session.clicked(&Locator::css("a.page-3")));
        assert!(!session.clicked(&Locator::css("a.page-4")));
    }

    #[test]
    fn deduplicates_urls_across_pages() {
        let session = FakeSession::new()
            .with_page(&page_url(1), page(1, &[("/p/1", "1 days ago"), ("/p/2", "1 days ago")]))
            .with_page(&page_url(2), page(2, &[("/p/2", "1 days ago"), ("/p/3", "2 days ago")]))
            .with_page(&page_url(3), FakePage::new("<ul></ul>"));
        let mut session = start(session);

        let report = walk(&mut session, &locators(), &options(None)).expect("walk");

        let urls: Vec<&str> = report.posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/p/1", "/p/2", "/p/3"]);
    }

    #[test]
    fn page_of_already_collected_posts_does_not_stop_walk() {
        let session = FakeSession::new()
            .with_page(&page_url(1), page(1, &[("/p/1", "1 days ago")]))
            .with_page(&page_url(2), page(2, &[("/p/1", "1 days ago")]))
            .with_page(&page_url(3), page(3, &[("/p/3", "2 days ago")]))
            .with_page(&page_url(4), FakePage::new("<ul></ul>"));
        let mut session = start(session);

        let report = walk(&mut session, &locators(), &options(Some(7))).expect("walk");

        let urls: Vec<&str> = report.posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/p/1", "/p/3"]);
        assert_eq!(report.pages_visited, 4);
    }

    #[test]
    fn missing_next_button_ends_walk_with_partial_results() {
        let mut only = FakePage::new("<ul></ul>");
        let l = locators();
        only = only.with(
            l.blog_item.clone(),
            post_node(&l.blog_url, &l.blog_date, "/p/1", "2 hours ago"),
        );
        let mut session = start(FakeSession::new().with_page(&page_url(1), only));

        let report = walk(&mut session, &locators(), &options(Some(1))).expect("walk");

        assert_eq!(report.posts.len(), 1);
        assert_eq!(report.pages_visited, 1);
    }

    #[test]
    fn undated_posts_are_excluded_only_with_window() {
        let build = || {
            FakeSession::new()
                .with_page(&page_url(1), page(1, &[("/p/1", "yesterday-ish"), ("/p/2", "1 days ago")]))
                .with_page(&page_url(2), FakePage::new("<ul></ul>"))
        };

        let mut windowed = start(build());
        let report = walk(&mut windowed, &locators(), &options(Some(3))).expect("walk");
        assert_eq!(report.posts.len(), 1);
        assert_eq!(report.posts[0].url, "/p/2");

        let mut unbounded = start(build());
        let report = walk(&mut unbounded, &locators(), &options(None)).expect("walk");
        assert_eq!(report.posts.len(), 2);
        assert_eq!(report.posts[0].date, None);
    }

    #[test]
    fn items_without_link_are_skipped() {
        let l = locators();
        let broken = FakeNode::new().child(l.blog_date.clone(), FakeNode::new().text("1 days ago"));
        let first = FakePage::new("<ul></ul>")
            .with(l.blog_item.clone(), broken)
            .with(l.blog_item.clone(), post_node(&l.blog_url, &l.blog_date, "/p/ok", "1 days ago"));
        let mut session = start(FakeSession::new().with_page(&page_url(1), first));

        let report = walk(&mut session, &locators(), &options(None)).expect("walk");

        assert_eq!(report.posts.len(), 1);
        assert_eq!(report.posts[0].url, "/p/ok");
    }

    #[test]
    fn respects_page_cap() {
        let session = FakeSession::new()
            .with_page(&page_url(1), page(1, &[("/p/1", "1 days ago")]))
            .with_page(&page_url(2), page(2, &[("/p/2", "1 days ago")]));
        let mut session = start(session);
        let capped = WalkOptions {
            max_pages: 1,
            ..options(None)
        };

        let report = walk(&mut session, &locators(), &capped).expect("walk");

        assert_eq!(report.pages_visited, 1);
        assert!(!session.clicked(&Locator::css("a.page-2")));
    }
}
