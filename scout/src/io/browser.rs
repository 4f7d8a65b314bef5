//! Headless Chrome implementation of [`Session`].

use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::core::locator::{Locator, Query};
use crate::io::config::ScoutConfig;
use crate::io::session::{DomError, DomErrorKind, Session};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Prefer the resolved DOM property (absolute `href`), fall back to the raw attribute.
const READ_ATTRIBUTE: &str = "function(name) { \
    const prop = this[name]; \
    if (typeof prop === 'string') { return prop; } \
    return this.getAttribute(name); }";

const READ_TEXT: &str = "function() { return this.innerText || this.textContent || ''; }";

/// The browser connection is otherwise dropped while the oracle is thinking.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Element handle: a DOM node id re-resolved on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromeElement {
    node_id: u32,
}

/// One Chrome process with one tab, owned by the CLI for a site run.
pub struct ChromeSession {
    // Dropping the browser kills the process; keep it alive as long as the tab.
    _browser: Browser,
    tab: Arc<Tab>,
    settle: Duration,
}

impl ChromeSession {
    #[instrument(skip_all, fields(headless = cfg.browser.headless))]
    pub fn launch(cfg: &ScoutConfig) -> Result<Self> {
        let user_agent = format!("--user-agent={}", cfg.browser.user_agent);
        let options = LaunchOptions::default_builder()
            .headless(cfg.browser.headless)
            .sandbox(false)
            .window_size(Some((cfg.browser.window_width, cfg.browser.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![OsStr::new(&user_agent)])
            .build()
            .map_err(|err| anyhow!("build browser launch options: {err}"))?;
        let browser = Browser::new(options).context("launch chrome")?;
        let tab = browser.new_tab().context("open browser tab")?;
        tab.set_default_timeout(cfg.page_load_timeout());
        info!("browser session started");
        Ok(Self {
            _browser: browser,
            tab,
            settle: cfg.settle(),
        })
    }

    fn element(&self, handle: &ChromeElement) -> Result<Element<'_>> {
        Element::new(&self.tab, handle.node_id).map_err(|err| {
            DomError::new(
                DomErrorKind::Stale,
                format!("stale element reference: {err}"),
            )
            .into()
        })
    }

    fn pause(&self) {
        thread::sleep(self.settle);
    }
}

fn query_for(locator: &Locator) -> Result<Query> {
    locator
        .query()
        .ok_or_else(|| DomError::invalid_locator(locator).into())
}

fn not_found(locator: &Locator, err: anyhow::Error) -> anyhow::Error {
    DomError::new(
        DomErrorKind::NotFound,
        format!("no such element: Unable to locate element: {locator} ({err})"),
    )
    .into()
}

fn not_interactable(action: &str, err: anyhow::Error) -> anyhow::Error {
    DomError::new(
        DomErrorKind::NotInteractable,
        format!("element not interactable: {action} failed ({err})"),
    )
    .into()
}

impl Session for ChromeSession {
    type Element = ChromeElement;

    #[instrument(skip(self))]
    fn render(&mut self, url: &str) -> Result<String> {
        let navigated = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());
        if let Err(err) = navigated {
            warn!(err = %err, "page load did not finish, stopping it");
            self.tab.stop_loading().context("stop page load")?;
        }
        self.pause();
        if let Err(err) = self.tab.evaluate(SCROLL_TO_BOTTOM, false) {
            debug!(err = %err, "scroll to bottom failed");
        }
        self.pause();
        self.tab.get_content().context("read page content")
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    fn find_all(&mut self, locator: &Locator) -> Result<Vec<ChromeElement>> {
        let found = match query_for(locator)? {
            Query::Css(selector) => self.tab.find_elements(&selector),
            Query::XPath(xpath) => self.tab.find_elements_by_xpath(&xpath),
        };
        match found {
            Ok(elements) => Ok(elements
                .iter()
                .map(|el| ChromeElement {
                    node_id: el.node_id,
                })
                .collect()),
            Err(err) => {
                debug!(%locator, err = %err, "no elements matched");
                Ok(Vec::new())
            }
        }
    }

    fn find(&mut self, locator: &Locator) -> Result<ChromeElement> {
        let found = match query_for(locator)? {
            Query::Css(selector) => self.tab.find_element(&selector),
            Query::XPath(xpath) => self.tab.find_element_by_xpath(&xpath),
        };
        let element = found.map_err(|err| not_found(locator, err))?;
        Ok(ChromeElement {
            node_id: element.node_id,
        })
    }

    fn find_within(&mut self, parent: &ChromeElement, locator: &Locator) -> Result<ChromeElement> {
        let query = query_for(locator)?;
        let parent = self.element(parent)?;
        let found = match query {
            Query::Css(selector) => parent.find_element(&selector),
            Query::XPath(xpath) => parent.find_element_by_xpath(&xpath),
        };
        let element = found.map_err(|err| not_found(locator, err))?;
        Ok(ChromeElement {
            node_id: element.node_id,
        })
    }

    fn click(&mut self, element: &ChromeElement) -> Result<()> {
        {
            let element = self.element(element)?;
            element
                .click()
                .map_err(|err| not_interactable("click", err))?;
        }
        self.pause();
        Ok(())
    }

    fn type_text(&mut self, element: &ChromeElement, text: &str) -> Result<()> {
        let element = self.element(element)?;
        element
            .type_into(text)
            .map_err(|err| not_interactable("type", err))?;
        Ok(())
    }

    fn press_enter(&mut self, element: &ChromeElement) -> Result<()> {
        {
            let element = self.element(element)?;
            element
                .focus()
                .map_err(|err| not_interactable("focus", err))?;
            self.tab
                .press_key("Enter")
                .map_err(|err| not_interactable("press Enter", err))?;
        }
        self.pause();
        Ok(())
    }

    fn attribute(&mut self, element: &ChromeElement, name: &str) -> Result<Option<String>> {
        let element = self.element(element)?;
        let remote = element
            .call_js_fn(READ_ATTRIBUTE, vec![json!(name)], false)
            .map_err(|err| not_interactable("read attribute", err))?;
        Ok(remote
            .value
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    fn text(&mut self, element: &ChromeElement) -> Result<String> {
        let element = self.element(element)?;
        let remote = element
            .call_js_fn(READ_TEXT, Vec::new(), false)
            .map_err(|err| not_interactable("read text", err))?;
        Ok(remote
            .value
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    fn settle(&mut self) {
        self.pause();
    }
}
