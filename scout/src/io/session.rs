//! Browser session abstraction.
//!
//! The [`Session`] trait decouples discovery and scraping from the concrete
//! browser (currently headless Chrome, see [`crate::io::browser`]). Tests use
//! a scripted in-memory session instead.
//!
//! Errors from element lookup or interaction are wrapped in [`DomError`] so
//! validators can turn them into rejected proposals. Any other error (browser
//! crashed, navigation transport failure) is fatal and propagates.

use std::fmt;

use anyhow::{Error, Result};

use crate::core::locator::Locator;

/// Class of a DOM-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomErrorKind {
    NotFound,
    NotInteractable,
    Stale,
    /// The locator has no query (the `none` sentinel).
    InvalidLocator,
}

/// A locate/interact failure against the live page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomError {
    pub kind: DomErrorKind,
    pub message: String,
}

impl DomError {
    pub fn new(kind: DomErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(locator: &Locator) -> Self {
        Self::new(
            DomErrorKind::NotFound,
            format!("no such element: Unable to locate element: {locator}"),
        )
    }

    pub fn invalid_locator(locator: &Locator) -> Self {
        Self::new(
            DomErrorKind::InvalidLocator,
            format!("invalid locator: {locator}"),
        )
    }
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DomError {}

/// Split an error into a DOM failure message (`Ok`) or a fatal error (`Err`).
pub fn dom_failure(err: Error) -> Result<String> {
    match err.downcast_ref::<DomError>() {
        Some(dom) => Ok(dom.message.clone()),
        None => Err(err),
    }
}

/// A live, stateful page that discovery and scraping drive.
///
/// Methods take `&mut self`: one page, one DOM, one navigation history, used by
/// a single actor at a time.
pub trait Session {
    /// Handle to an element found on the current page.
    type Element: Clone;

    /// Navigate to `url` and return the rendered HTML.
    ///
    /// A load that exceeds the page-load timeout is stopped and the partial DOM
    /// is returned.
    fn render(&mut self, url: &str) -> Result<String>;

    fn current_url(&mut self) -> Result<String>;

    /// All elements matching `locator`. No match is an empty list, not an error.
    fn find_all(&mut self, locator: &Locator) -> Result<Vec<Self::Element>>;

    /// First element matching `locator`, or a [`DomError`].
    fn find(&mut self, locator: &Locator) -> Result<Self::Element>;

    /// First descendant of `parent` matching `locator`, or a [`DomError`].
    fn find_within(&mut self, parent: &Self::Element, locator: &Locator) -> Result<Self::Element>;

    fn click(&mut self, element: &Self::Element) -> Result<()>;

    fn type_text(&mut self, element: &Self::Element, text: &str) -> Result<()>;

    /// Submit-like key press (Enter) on the element.
    fn press_enter(&mut self, element: &Self::Element) -> Result<()>;

    fn attribute(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Visible text of the element.
    fn text(&mut self, element: &Self::Element) -> Result<String>;

    /// Fixed pause letting asynchronous re-rendering settle.
    fn settle(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn dom_errors_become_messages() {
        let err = Error::new(DomError::not_found(&Locator::css("#missing")));
        let message = dom_failure(err).expect("dom failure");
        assert!(message.contains("css selector=#missing"));
    }

    #[test]
    fn context_wrapped_dom_errors_are_still_recognized() {
        let err = Error::new(DomError::new(DomErrorKind::Stale, "stale element reference"))
            .context("click sort option");
        assert_eq!(dom_failure(err).expect("dom failure"), "stale element reference");
    }

    #[test]
    fn other_errors_stay_fatal() {
        let err = anyhow!("browser process exited");
        assert!(dom_failure(err).is_err());
    }
}
