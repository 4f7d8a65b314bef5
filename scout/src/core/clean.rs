//! HTML reduction before the page is handed to the oracle.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const TRUNCATED_MARKER: &str = "\n[truncated]";

/// Drop denylisted subtrees and comments, then collapse the markup.
///
/// Lines are trimmed, empty lines dropped, repeated lines kept only on first
/// occurrence, and the survivors joined without separators.
pub fn clean_html(html: &str, denylist: &[&str]) -> String {
    let document = Html::parse_document(html);
    let mut markup = String::with_capacity(html.len());
    write_element(document.root_element(), denylist, &mut markup);
    collapse_lines(&markup)
}

/// Cut `text` to at most `budget` bytes on a char boundary.
pub fn truncate_to_budget(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let keep = budget.saturating_sub(TRUNCATED_MARKER.len());
    let mut end = keep;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = text[..end].to_string();
    out.push_str(TRUNCATED_MARKER);
    out
}

fn write_element(element: ElementRef<'_>, denylist: &[&str], out: &mut String) {
    let name = element.value().name();
    if denylist.contains(&name) {
        return;
    }
    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_element(child_element, denylist, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(&escape_text(text));
        }
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn collapse_lines(markup: &str) -> String {
    let mut seen = HashSet::new();
    markup
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .collect()
}
