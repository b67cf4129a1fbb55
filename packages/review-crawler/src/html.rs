//! Markup helpers: visible page text and review context search.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};

use crate::limits::{
    truncate_chars, MAX_REPAIR_CHARS, MAX_REPAIR_CONTEXTS, MAX_REPAIR_TOTAL_CHARS,
    REPAIR_CONTEXT_MIN_CHARS, REPAIR_SEARCH_DEPTH,
};

/// Elements dropped before extracting visible text.
const PAGE_NOISE: &[&str] = &[
    "script", "style", "header", "footer", "nav", "aside", "iframe", "svg",
];

/// Elements dropped before searching markup for a review.
const CONTEXT_NOISE: &[&str] = &["script", "style", "header", "footer", "nav"];

/// Visible text of a page: noise elements removed, one trimmed text run
/// per line.
pub fn page_text(markup: &str) -> String {
    let mut document = Html::parse_document(markup);
    remove_elements(&mut document, PAGE_NOISE);

    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_elements(document: &mut Html, tags: &[&str]) {
    let selector = match Selector::parse(&tags.join(", ")) {
        Ok(selector) => selector,
        Err(_) => return,
    };

    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Locates a review's text in raw markup and returns the surrounding
/// markup blocks.
///
/// Each text node containing the term (case-insensitive) yields one block:
/// its enclosing element, widened by up to `max_depth` ancestors until the
/// block holds at least `min_block_chars` characters of text. Blocks are
/// kept whole; the search stops at the first block that would push the
/// combined size past `max_total_chars`.
#[derive(Debug, Clone)]
pub struct ContextSearch {
    pub max_contexts: usize,
    pub max_depth: usize,
    pub min_block_chars: usize,
    pub max_block_chars: usize,
    pub max_total_chars: usize,
}

impl Default for ContextSearch {
    fn default() -> Self {
        Self {
            max_contexts: MAX_REPAIR_CONTEXTS,
            max_depth: REPAIR_SEARCH_DEPTH,
            min_block_chars: REPAIR_CONTEXT_MIN_CHARS,
            max_block_chars: MAX_REPAIR_CHARS,
            max_total_chars: MAX_REPAIR_TOTAL_CHARS,
        }
    }
}

impl ContextSearch {
    /// Markup blocks around occurrences of `term`, empty if there are none.
    pub fn find(&self, markup: &str, term: &str) -> Vec<String> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return vec![];
        }

        let mut document = Html::parse_document(markup);
        remove_elements(&mut document, CONTEXT_NOISE);

        let mut seen = HashSet::new();
        let mut blocks = Vec::new();
        let mut total = 0;

        for node in document.tree.root().descendants() {
            if blocks.len() >= self.max_contexts || total >= self.max_total_chars {
                break;
            }

            let Node::Text(text) = node.value() else {
                continue;
            };
            if !text.to_lowercase().contains(&needle) {
                continue;
            }

            let Some(block) = node.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            let block = self.widen(block);

            // Two matches inside the same block yield one context.
            if !seen.insert(block.id()) {
                continue;
            }

            let html = block.html();
            let html = truncate_chars(&html, self.max_block_chars).to_string();
            let len = html.chars().count();
            if total + len > self.max_total_chars {
                break;
            }
            total += len;
            blocks.push(html);
        }

        blocks
    }

    fn widen<'a>(&self, mut block: ElementRef<'a>) -> ElementRef<'a> {
        for _ in 0..self.max_depth {
            if text_len(block) >= self.min_block_chars {
                break;
            }
            match block.parent().and_then(ElementRef::wrap) {
                Some(parent) if parent.value().name() != "html" => block = parent,
                _ => break,
            }
        }
        block
    }
}

fn text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.chars().count()).sum()
}
