//! Retry-budget and sentinel behavior of the discovery loop.
//!
//! Drives `discover_section` with a scripted session and oracle and checks how
//! many proposals are requested and what ends up in the ledger and the store.

use scout::core::ledger::FailureLedger;
use scout::core::locator::{Locator, LocatorKind};
use scout::core::section::{SEARCH_BAR, SORT_DATE_OPTION, SORT_DROPDOWN, SectionKind};
use scout::discovery::{DiscoveryOutcome, DiscoveryRequest, discover_section};
use scout::io::knowledge::KnowledgeStore;
use scout::test_support::{FakeNode, FakePage, FakeSession, ScriptedOracle, answer, answer_roles};

const HOME: &str = "https://news.example.com/";
const RESULTS: &str = "https://news.example.com/search?q=rust";

fn home_session() -> FakeSession {
    FakeSession::new().with_page(
        HOME,
        FakePage::new("<html><body><form><input id=\"kw\"></form></body></html>").with(
            Locator::new(LocatorKind::Id, "kw"),
            FakeNode::new().on_submit(RESULTS),
        ),
    )
}

fn search_request(max_retry_times: u32) -> DiscoveryRequest<'static> {
    DiscoveryRequest {
        site_url: HOME,
        page_url: HOME,
        kind: SectionKind::Search,
        keyword: "rust",
        max_retry_times,
        prompt_budget_bytes: 50_000,
    }
}

#[test]
fn always_failing_oracle_uses_exactly_the_retry_budget() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = KnowledgeStore::new(temp.path());
    let mut session = home_session();
    let oracle = ScriptedOracle::always(&answer(SEARCH_BAR, &Locator::css("#missing")));
    let mut ledger = FailureLedger::new();

    let outcome = discover_section(
        &mut session,
        &oracle,
        &store,
        &mut ledger,
        &search_request(3),
    )
    .expect("discover");

    assert_eq!(outcome, DiscoveryOutcome::Exhausted { attempts: 3 });
    assert_eq!(oracle.calls(), 3);
    assert_eq!(ledger.len(), 3);
    assert_eq!(session.renders.len(), 3);
    assert!(store.lookup(HOME).expect("lookup").is_none());
}

#[test]
fn fail_fail_pass_validates_on_third_attempt() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = KnowledgeStore::new(temp.path());
    let mut session = home_session();
    let oracle = ScriptedOracle::new([
        answer(SEARCH_BAR, &Locator::new(LocatorKind::Name, "q")),
        answer(SEARCH_BAR, &Locator::css("input.search")),
        answer(SEARCH_BAR, &Locator::new(LocatorKind::Id, "kw")),
    ]);
    let mut ledger = FailureLedger::new();

    let outcome = discover_section(
        &mut session,
        &oracle,
        &store,
        &mut ledger,
        &search_request(3),
    )
    .expect("discover");

    match outcome {
        DiscoveryOutcome::Validated {
            section,
            attempts,
            payload,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(payload.as_deref(), Some(RESULTS));
            assert_eq!(
                section.get(SEARCH_BAR),
                Some(&Locator::new(LocatorKind::Id, "kw"))
            );
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(ledger.len(), 2);
    let digest = ledger.digest();
    assert!(digest.starts_with("1. search_bar: {selector: name, value: q}, error_message: "));
    assert!(digest.contains("\n2. search_bar: {selector: css selector, value: input.search}"));

    let third_prompt = &oracle.requests()[2].user_prompt;
    assert!(third_prompt.contains("1. search_bar"));
    assert!(third_prompt.contains("2. search_bar"));

    let record = store.lookup(HOME).expect("lookup").expect("record");
    assert!(record.covers(SectionKind::Search));
}

#[test]
fn sentinel_ends_discovery_without_further_proposals() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = KnowledgeStore::new(temp.path());
    let mut session = FakeSession::new().with_page(RESULTS, FakePage::new("<ul></ul>"));
    let none = Locator::new(LocatorKind::None, "none");
    let oracle = ScriptedOracle::always(&answer_roles(&[
        (SORT_DROPDOWN, &none),
        (SORT_DATE_OPTION, &none),
    ]));
    let mut ledger = FailureLedger::new();
    let request = DiscoveryRequest {
        page_url: RESULTS,
        kind: SectionKind::Sort,
        ..search_request(3)
    };

    let outcome = discover_section(&mut session, &oracle, &store, &mut ledger, &request)
        .expect("discover");

    assert_eq!(
        outcome,
        DiscoveryOutcome::Unresolvable {
            role: SORT_DROPDOWN.to_string(),
            attempts: 1,
        }
    );
    assert_eq!(oracle.calls(), 1);
    assert_eq!(ledger.len(), 1);
    assert!(session.clicks.is_empty());
}

#[test]
fn schema_violations_consume_attempts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = KnowledgeStore::new(temp.path());
    let mut session = home_session();
    let oracle = ScriptedOracle::always(r#"{"search_bar": {"selector": "aria label", "value": "Search"}}"#);
    let mut ledger = FailureLedger::new();

    let outcome = discover_section(
        &mut session,
        &oracle,
        &store,
        &mut ledger,
        &search_request(2),
    )
    .expect("discover");

    assert_eq!(outcome, DiscoveryOutcome::Exhausted { attempts: 2 });
    assert_eq!(oracle.calls(), 2);
    assert!(session.typed.is_empty());
}
