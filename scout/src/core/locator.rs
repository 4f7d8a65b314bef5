//! Typed element locators and their translation into browser queries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with a page number in pagination locators.
pub const PAGE_NUM_PLACEHOLDER: &str = "{page_num}";

/// Strategy used to find an element, spelled the way WebDriver spells it on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorKind {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "xpath")]
    XPath,
    #[serde(rename = "css selector", alias = "css_selector")]
    CssSelector,
    #[serde(rename = "class name", alias = "class_name")]
    ClassName,
    #[serde(rename = "link text", alias = "link_text")]
    LinkText,
    #[serde(rename = "tag name", alias = "tag_name")]
    TagName,
    /// No stable locator exists. Never retried.
    #[serde(rename = "none")]
    None,
}

impl LocatorKind {
    pub const ALL: [LocatorKind; 8] = [
        LocatorKind::Id,
        LocatorKind::Name,
        LocatorKind::XPath,
        LocatorKind::CssSelector,
        LocatorKind::ClassName,
        LocatorKind::LinkText,
        LocatorKind::TagName,
        LocatorKind::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LocatorKind::Id => "id",
            LocatorKind::Name => "name",
            LocatorKind::XPath => "xpath",
            LocatorKind::CssSelector => "css selector",
            LocatorKind::ClassName => "class name",
            LocatorKind::LinkText => "link text",
            LocatorKind::TagName => "tag name",
            LocatorKind::None => "none",
        }
    }
}

/// How to find one element: `{"selector": kind, "value": value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(rename = "selector")]
    pub kind: LocatorKind,
    pub value: String,
}

/// Concrete query understood by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::CssSelector, value)
    }

    pub fn is_none(&self) -> bool {
        self.kind == LocatorKind::None
    }

    pub fn has_page_placeholder(&self) -> bool {
        self.value.contains(PAGE_NUM_PLACEHOLDER)
    }

    /// Substitute `{page_num}` in the value. Locators without the placeholder are returned as-is.
    pub fn for_page(&self, page_num: u32) -> Locator {
        Locator {
            kind: self.kind,
            value: self
                .value
                .replace(PAGE_NUM_PLACEHOLDER, &page_num.to_string()),
        }
    }

    /// Translate into a CSS or XPath query. `None` for the sentinel kind.
    pub fn query(&self) -> Option<Query> {
        let value = self.value.trim();
        let query = match self.kind {
            LocatorKind::Id => Query::Css(format!("[id=\"{}\"]", escape_quotes(value))),
            LocatorKind::Name => Query::Css(format!("[name=\"{}\"]", escape_quotes(value))),
            LocatorKind::ClassName => Query::Css(class_selector(value)),
            LocatorKind::TagName | LocatorKind::CssSelector => Query::Css(value.to_string()),
            LocatorKind::XPath => Query::XPath(value.to_string()),
            LocatorKind::LinkText => Query::XPath(format!(
                ".//a[normalize-space(.)={}]",
                xpath_literal(value)
            )),
            LocatorKind::None => return None,
        };
        Some(query)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind.as_str(), self.value)
    }
}

fn class_selector(value: &str) -> String {
    value
        .split_whitespace()
        .map(|class| format!(".{class}"))
        .collect::<String>()
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// XPath 1.0 has no escapes; mixed quotes need `concat()`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}
