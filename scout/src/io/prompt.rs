//! Prompt rendering for locator proposals.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::locator::LocatorKind;
use crate::core::section::SectionKind;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const USER_TEMPLATE: &str = include_str!("prompts/user.md");

/// Inputs for one proposal attempt.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub section: SectionKind,
    pub keyword: &'a str,
    /// Ledger digest of earlier rejected proposals.
    pub failed_experiences: &'a str,
    /// Cleaned and budget-truncated page HTML.
    pub cleaned_html: &'a str,
}

/// Rendered system and user prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("user", USER_TEMPLATE)
            .expect("user template should be valid");
        Self { env }
    }

    pub fn render(&self, input: &PromptInputs<'_>) -> Result<PromptPair> {
        let selector_types: Vec<&str> = LocatorKind::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect();
        let system = self
            .env
            .get_template("system")?
            .render(context! {
                section => input.section.as_str(),
                roles => input.section.roles(),
                selector_types => selector_types,
            })
            .context("render system prompt")?;
        let user = self
            .env
            .get_template("user")?
            .render(context! {
                section => input.section.as_str(),
                keyword => input.keyword,
                failed_experiences => input.failed_experiences.trim(),
                cleaned_html => input.cleaned_html,
            })
            .context("render user prompt")?;
        debug!(
            section = %input.section,
            system_len = system.len(),
            user_len = user.len(),
            "rendered prompts"
        );
        Ok(PromptPair { system, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::NO_FAILURES;

    fn inputs(section: SectionKind) -> PromptInputs<'static> {
        PromptInputs {
            section,
            keyword: "rust",
            failed_experiences: NO_FAILURES,
            cleaned_html: "<form><input name=\"q\"></form>",
        }
    }

    #[test]
    fn system_prompt_lists_roles_and_selector_types() {
        let prompts = PromptBuilder::new()
            .render(&inputs(SectionKind::Extract))
            .expect("render");
        assert!(prompts.system.contains("\"blog_item\": {\"selector\""));
        assert!(prompts.system.contains("\"blog_date\": {\"selector\""));
        assert!(prompts.system.contains("css selector"));
        assert!(prompts.system.contains("\"none\""));
    }

    #[test]
    fn user_prompt_embeds_html_ledger_and_keyword() {
        let prompts = PromptBuilder::new()
            .render(&inputs(SectionKind::Search))
            .expect("render");
        assert!(prompts.user.contains("\"rust\""));
        assert!(prompts.user.contains(NO_FAILURES));
        assert!(prompts.user.contains("<form><input name=\"q\"></form>"));
    }

    #[test]
    fn pagination_prompt_mentions_page_placeholder() {
        let prompts = PromptBuilder::new()
            .render(&inputs(SectionKind::Pagination))
            .expect("render");
        assert!(prompts.system.contains("{page_num}"));
        assert!(prompts.user.contains("next_page_button"));
    }
}
