//! Discoverable sections, their roles, and coercion of oracle output into locators.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::locator::{Locator, LocatorKind};

pub const SEARCH_BAR: &str = "search_bar";
pub const SORT_DROPDOWN: &str = "sort_dropdown";
pub const SORT_DATE_OPTION: &str = "sort_date_option";
pub const BLOG_ITEM: &str = "blog_item";
pub const BLOG_URL: &str = "blog_url";
pub const BLOG_DATE: &str = "blog_date";
pub const NEXT_PAGE_BUTTON: &str = "next_page_button";

/// One discoverable capability group on a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Search,
    Sort,
    Extract,
    Pagination,
}

impl SectionKind {
    /// Discovery order. Later sections depend on page state reached by earlier ones.
    pub const ORDER: [SectionKind; 4] = [
        SectionKind::Search,
        SectionKind::Sort,
        SectionKind::Extract,
        SectionKind::Pagination,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Search => "search",
            SectionKind::Sort => "sort",
            SectionKind::Extract => "extract",
            SectionKind::Pagination => "pagination",
        }
    }

    pub fn roles(self) -> &'static [&'static str] {
        match self {
            SectionKind::Search => &[SEARCH_BAR],
            SectionKind::Sort => &[SORT_DROPDOWN, SORT_DATE_OPTION],
            SectionKind::Extract => &[BLOG_ITEM, BLOG_URL, BLOG_DATE],
            SectionKind::Pagination => &[NEXT_PAGE_BUTTON],
        }
    }

    /// Name of the knowledge section the validated roles are merged into.
    ///
    /// Pagination shares the extract section so a record keeps the on-disk layout
    /// `extract_posts_section: {blog_item, blog_url, blog_date, next_page_button}`.
    pub fn storage_section(self) -> &'static str {
        match self {
            SectionKind::Search => "search_section",
            SectionKind::Sort => "sort_section",
            SectionKind::Extract | SectionKind::Pagination => "extract_posts_section",
        }
    }

    /// Tags whose subtrees are stripped from the page before prompting.
    pub fn denylist(self) -> &'static [&'static str] {
        match self {
            SectionKind::Search => &[
                "script", "footer", "style", "iframe", "a", "aside", "article", "section",
            ],
            SectionKind::Sort => &["script", "footer", "style", "iframe", "a", "meta"],
            SectionKind::Extract | SectionKind::Pagination => {
                &["script", "style", "nav", "footer", "meta", "header"]
            }
        }
    }

    /// JSON Schema the oracle output must satisfy.
    pub fn output_schema(self) -> Value {
        let kinds: Vec<&str> = LocatorKind::ALL.iter().map(|k| k.as_str()).collect();
        let mut properties = serde_json::Map::new();
        for role in self.roles() {
            properties.insert(
                (*role).to_string(),
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["selector", "value"],
                    "properties": {
                        "selector": { "type": "string", "enum": kinds },
                        "value": { "type": "string" }
                    }
                }),
            );
        }
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": self.roles(),
            "properties": properties,
        })
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role name to locator, as proposed by the oracle or loaded from knowledge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionResult(BTreeMap<String, Locator>);

/// Oracle output that does not have the shape of a section result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError(pub String);

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed proposal: {}", self.0)
    }
}

impl std::error::Error for ShapeError {}

impl SectionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: &str, locator: Locator) -> Self {
        self.insert(role, locator);
        self
    }

    pub fn insert(&mut self, role: &str, locator: Locator) {
        self.0.insert(role.to_string(), locator);
    }

    pub fn get(&self, role: &str) -> Option<&Locator> {
        self.0.get(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite roles present in `other`, keep the rest.
    pub fn merge(&mut self, other: &SectionResult) {
        for (role, locator) in &other.0 {
            self.0.insert(role.clone(), locator.clone());
        }
    }

    /// True when every role of `kind` has a locator.
    pub fn covers(&self, kind: SectionKind) -> bool {
        kind.roles().iter().all(|role| self.0.contains_key(*role))
    }

    /// Keep only the roles of `kind`.
    pub fn project(&self, kind: SectionKind) -> SectionResult {
        let mut out = SectionResult::new();
        for role in kind.roles() {
            if let Some(locator) = self.0.get(*role) {
                out.insert(role, locator.clone());
            }
        }
        out
    }

    /// First role of `kind` that carries the `none` sentinel.
    pub fn sentinel_role(&self, kind: SectionKind) -> Option<&'static str> {
        kind.roles()
            .iter()
            .copied()
            .find(|role| self.0.get(*role).is_some_and(Locator::is_none))
    }

    /// Locator for a role the caller has already checked through [`SectionResult::covers`].
    pub fn require(&self, role: &str) -> Result<&Locator, ShapeError> {
        self.0
            .get(role)
            .ok_or_else(|| ShapeError(format!("missing role `{role}`")))
    }

    /// One-line description of the proposal for the failure ledger.
    pub fn summary(&self, kind: SectionKind) -> String {
        kind.roles()
            .iter()
            .map(|role| match self.0.get(*role) {
                Some(locator) => format!(
                    "{role}: {{selector: {}, value: {}}}",
                    locator.kind.as_str(),
                    locator.value
                ),
                None => format!("{role}: <missing>"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse and shape-check raw oracle output for `kind`.
    ///
    /// The raw text may be wrapped in a markdown code fence. Any deviation from the
    /// output schema is a [`ShapeError`], never a panic.
    pub fn from_response(kind: SectionKind, raw: &str) -> Result<SectionResult, ShapeError> {
        let body = strip_code_fence(raw);
        let value: Value =
            serde_json::from_str(body).map_err(|err| ShapeError(format!("invalid json: {err}")))?;
        let schema = kind.output_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| ShapeError(format!("invalid output schema: {err}")))?;
        let messages: Vec<String> = validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(ShapeError(messages.join("; ")));
        }
        let parsed: SectionResult = serde_json::from_value(value)
            .map_err(|err| ShapeError(format!("unexpected structure: {err}")))?;
        Ok(parsed)
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_search_response() {
        let raw = r#"{"search_bar": {"selector": "name", "value": "q"}}"#;
        let result = SectionResult::from_response(SectionKind::Search, raw).expect("parse");
        assert_eq!(
            result.get(SEARCH_BAR),
            Some(&Locator::new(LocatorKind::Name, "q"))
        );
        assert!(result.covers(SectionKind::Search));
    }

    #[test]
    fn accepts_fenced_json() {
        let raw = "```json\n{\"next_page_button\": {\"selector\": \"xpath\", \"value\": \"//a\"}}\n```";
        let result = SectionResult::from_response(SectionKind::Pagination, raw).expect("parse");
        assert!(result.covers(SectionKind::Pagination));
    }

    #[test]
    fn missing_role_is_a_shape_error() {
        let raw = r#"{"sort_dropdown": {"selector": "id", "value": "sort"}}"#;
        let err = SectionResult::from_response(SectionKind::Sort, raw).unwrap_err();
        assert!(err.to_string().contains("sort_date_option"), "{err}");
    }

    #[test]
    fn unknown_selector_kind_is_a_shape_error() {
        let raw = r#"{"search_bar": {"selector": "jquery", "value": "$q"}}"#;
        assert!(SectionResult::from_response(SectionKind::Search, raw).is_err());
    }

    #[test]
    fn non_json_is_a_shape_error() {
        let err = SectionResult::from_response(SectionKind::Search, "I could not find it").unwrap_err();
        assert!(err.to_string().starts_with("malformed proposal: invalid json"));
    }

    #[test]
    fn sentinel_role_reports_first_none() {
        let result = SectionResult::new()
            .with(SORT_DROPDOWN, Locator::css("#sort"))
            .with(SORT_DATE_OPTION, Locator::new(LocatorKind::None, "none"));
        assert_eq!(result.sentinel_role(SectionKind::Sort), Some(SORT_DATE_OPTION));
    }

    #[test]
    fn merge_overwrites_only_given_roles() {
        let mut extract = SectionResult::new()
            .with(BLOG_ITEM, Locator::css(".post"))
            .with(BLOG_URL, Locator::css("a"));
        let paging = SectionResult::new().with(NEXT_PAGE_BUTTON, Locator::css(".next"));
        extract.merge(&paging);
        assert!(extract.get(BLOG_ITEM).is_some());
        assert!(extract.get(NEXT_PAGE_BUTTON).is_some());
    }

    #[test]
    fn summary_lists_roles_in_kind_order() {
        let result = SectionResult::new().with(SEARCH_BAR, Locator::css("input.q"));
        assert_eq!(
            result.summary(SectionKind::Search),
            "search_bar: {selector: css selector, value: input.q}"
        );
    }
}
