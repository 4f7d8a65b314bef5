//! Test-only scripted session and oracle.
//!
//! [`FakeSession`] serves canned pages whose elements are looked up by exact
//! locator equality; clicks and submits navigate to scripted URLs. Element
//! handles go stale on every navigation, like a real DOM.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};

use crate::core::locator::Locator;
use crate::io::oracle::{Oracle, OracleRequest};
use crate::io::session::{DomError, DomErrorKind, Session};

/// A scripted DOM element.
#[derive(Debug, Clone)]
pub struct FakeNode {
    pub href: Option<String>,
    pub text: String,
    pub children: Vec<(Locator, FakeNode)>,
    /// Navigate here when clicked.
    pub on_click: Option<String>,
    /// Navigate here when Enter is pressed.
    pub on_submit: Option<String>,
    pub interactable: bool,
}

impl Default for FakeNode {
    fn default() -> Self {
        Self {
            href: None,
            text: String::new(),
            children: Vec::new(),
            on_click: None,
            on_submit: None,
            interactable: true,
        }
    }
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn child(mut self, locator: Locator, node: FakeNode) -> Self {
        self.children.push((locator, node));
        self
    }

    pub fn on_click(mut self, url: &str) -> Self {
        self.on_click = Some(url.to_string());
        self
    }

    pub fn on_submit(mut self, url: &str) -> Self {
        self.on_submit = Some(url.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.interactable = false;
        self
    }
}

/// A post listing entry: container with a link and a date child.
pub fn post_node(url_locator: &Locator, date_locator: &Locator, href: &str, date: &str) -> FakeNode {
    FakeNode::new()
        .child(url_locator.clone(), FakeNode::new().href(href))
        .child(date_locator.clone(), FakeNode::new().text(date))
}

/// A scripted page: raw HTML plus top-level elements.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub html: String,
    pub elements: Vec<(Locator, FakeNode)>,
}

impl FakePage {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, locator: Locator, node: FakeNode) -> Self {
        self.elements.push((locator, node));
        self
    }
}

/// Handle into the current page: indexes from the top-level list down the children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    generation: u64,
    path: Vec<usize>,
}

/// In-memory [`Session`] with render, click and typing logs.
#[derive(Debug, Default)]
pub struct FakeSession {
    pages: BTreeMap<String, FakePage>,
    redirects: BTreeMap<String, String>,
    current: Option<String>,
    generation: u64,
    /// Every URL passed to `render`.
    pub renders: Vec<String>,
    /// Locator of every successfully clicked element.
    pub clicks: Vec<String>,
    /// Every string typed into an element.
    pub typed: Vec<String>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Rendering `from` lands on `to`, like a browser normalising or following a redirect.
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn clicked(&self, locator: &Locator) -> bool {
        let wanted = locator.to_string();
        self.clicks.iter().any(|clicked| *clicked == wanted)
    }

    fn navigate(&mut self, url: &str) {
        self.current = Some(url.to_string());
        self.generation += 1;
    }

    fn page(&self) -> Option<&FakePage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }

    fn node(&self, element: &FakeElement) -> Result<(&Locator, &FakeNode)> {
        let stale = || DomError::new(DomErrorKind::Stale, "stale element reference");
        if element.generation != self.generation {
            return Err(stale().into());
        }
        let page = self.page().ok_or_else(stale)?;
        let (first, rest) = element.path.split_first().ok_or_else(stale)?;
        let (mut locator, mut node) = page
            .elements
            .get(*first)
            .map(|(l, n)| (l, n))
            .ok_or_else(stale)?;
        for idx in rest {
            let (l, n) = node.children.get(*idx).ok_or_else(stale)?;
            locator = l;
            node = n;
        }
        Ok((locator, node))
    }

    fn interactable(&self, element: &FakeElement) -> Result<&FakeNode> {
        let (locator, node) = self.node(element)?;
        if !node.interactable {
            return Err(DomError::new(
                DomErrorKind::NotInteractable,
                format!("element not interactable: {locator}"),
            )
            .into());
        }
        Ok(node)
    }

    fn handle(&self, path: Vec<usize>) -> FakeElement {
        FakeElement {
            generation: self.generation,
            path,
        }
    }
}

impl Session for FakeSession {
    type Element = FakeElement;

    fn render(&mut self, url: &str) -> Result<String> {
        self.renders.push(url.to_string());
        let landed = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        let html = self
            .pages
            .get(&landed)
            .map(|page| page.html.clone())
            .ok_or_else(|| anyhow!("navigation failed: no page at {url}"))?;
        self.navigate(&landed);
        Ok(html)
    }

    fn current_url(&mut self) -> Result<String> {
        self.current
            .clone()
            .ok_or_else(|| anyhow!("no page loaded"))
    }

    fn find_all(&mut self, locator: &Locator) -> Result<Vec<FakeElement>> {
        if locator.query().is_none() {
            return Err(DomError::invalid_locator(locator).into());
        }
        let Some(page) = self.page() else {
            return Ok(Vec::new());
        };
        let paths: Vec<Vec<usize>> = page
            .elements
            .iter()
            .enumerate()
            .filter(|(_, (candidate, _))| candidate == locator)
            .map(|(idx, _)| vec![idx])
            .collect();
        Ok(paths.into_iter().map(|path| self.handle(path)).collect())
    }

    fn find(&mut self, locator: &Locator) -> Result<FakeElement> {
        self.find_all(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| DomError::not_found(locator).into())
    }

    fn find_within(&mut self, parent: &FakeElement, locator: &Locator) -> Result<FakeElement> {
        if locator.query().is_none() {
            return Err(DomError::invalid_locator(locator).into());
        }
        let (_, node) = self.node(parent)?;
        let idx = node
            .children
            .iter()
            .position(|(candidate, _)| candidate == locator)
            .ok_or_else(|| DomError::not_found(locator))?;
        let mut path = parent.path.clone();
        path.push(idx);
        Ok(self.handle(path))
    }

    fn click(&mut self, element: &FakeElement) -> Result<()> {
        let target = self.interactable(element)?.on_click.clone();
        let label = self.node(element)?.0.to_string();
        self.clicks.push(label);
        if let Some(url) = target {
            self.navigate(&url);
        }
        Ok(())
    }

    fn type_text(&mut self, element: &FakeElement, text: &str) -> Result<()> {
        self.interactable(element)?;
        self.typed.push(text.to_string());
        Ok(())
    }

    fn press_enter(&mut self, element: &FakeElement) -> Result<()> {
        let target = self.interactable(element)?.on_submit.clone();
        if let Some(url) = target {
            self.navigate(&url);
        }
        Ok(())
    }

    fn attribute(&mut self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let (_, node) = self.node(element)?;
        Ok(match name {
            "href" => node.href.clone(),
            _ => None,
        })
    }

    fn text(&mut self, element: &FakeElement) -> Result<String> {
        let (_, node) = self.node(element)?;
        Ok(node.text.clone())
    }
}

/// Oracle answering from a queue, optionally repeating a fallback once drained.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    answers: RefCell<VecDeque<String>>,
    fallback: Option<String>,
    requests: RefCell<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new<I, T>(answers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Oracle that gives the same answer forever.
    pub fn always(answer: &str) -> Self {
        Self {
            fallback: Some(answer.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.borrow().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn propose(&self, request: &OracleRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(answer) = self.answers.borrow_mut().pop_front() {
            return Ok(answer);
        }
        self.fallback
            .clone()
            .ok_or_else(|| anyhow!("scripted oracle has no answer left"))
    }
}

/// JSON answer proposing a single role.
pub fn answer(role: &str, locator: &Locator) -> String {
    serde_json::json!({ role: locator }).to_string()
}

/// JSON answer proposing several roles.
pub fn answer_roles(roles: &[(&str, &Locator)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = roles
        .iter()
        .map(|(role, locator)| {
            (
                (*role).to_string(),
                serde_json::to_value(locator).unwrap_or_default(),
            )
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}
