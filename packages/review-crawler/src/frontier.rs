//! Breadth-first frontier with a visited set.
//!
//! A URL is visited at most once and is never queued while it is already
//! queued or visited. URLs are normalized (parsed, fragment removed) before
//! any comparison so `https://a.com/r#top` and `https://a.com/r` are the
//! same page.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexSet;
use tracing::debug;
use url::Url;

/// Case-insensitive URL substring denylist.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenList {
    patterns: Vec<String>,
}

impl ForbiddenList {
    /// Build from configured substrings. Blank entries are ignored.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether `url` contains any forbidden substring.
    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.patterns.iter().any(|p| url.contains(p.as_str()))
    }
}

/// FIFO queue of URLs to process plus the set already processed.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: IndexSet<String>,
    forbidden: ForbiddenList,
}

impl Frontier {
    /// Create an empty frontier rejecting `forbidden` URLs.
    pub fn new(forbidden: ForbiddenList) -> Self {
        Self {
            forbidden,
            ..Default::default()
        }
    }

    /// Canonical form of an absolute http(s) URL, `None` for anything else.
    pub fn normalize(url: &str) -> Option<String> {
        let mut parsed = Url::parse(url.trim()).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        parsed.set_fragment(None);
        Some(parsed.into())
    }

    /// Resolve a possibly relative link against the page it was found on.
    pub fn resolve(base_url: &str, link: &str) -> Option<String> {
        let link = link.trim();
        if link.is_empty() {
            return None;
        }
        let base = Url::parse(base_url).ok()?;
        let joined = base.join(link).ok()?;
        Self::normalize(joined.as_str())
    }

    /// Remove and return the head of the queue.
    pub fn pop(&mut self) -> Option<String> {
        let url = self.queue.pop_front()?;
        self.queued.remove(&url);
        Some(url)
    }

    /// Record `url` as processed. Returns false if it was already visited.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        let key = Self::normalize(url).unwrap_or_else(|| url.to_string());
        self.visited.insert(key)
    }

    /// Queue `url` unless it is not absolute, forbidden, visited or queued.
    ///
    /// Returns the normalized URL when it was added.
    pub fn enqueue_if_new(&mut self, url: &str) -> Option<String> {
        let Some(normalized) = Self::normalize(url) else {
            debug!(url = %url, "Rejecting non-absolute URL");
            return None;
        };

        if self.forbidden.matches(&normalized) {
            debug!(url = %normalized, "Rejecting forbidden URL");
            return None;
        }

        if self.visited.contains(&normalized) || self.queued.contains(&normalized) {
            return None;
        }

        self.queued.insert(normalized.clone());
        self.queue.push_back(normalized.clone());
        Some(normalized)
    }

    /// Whether `url` is on the denylist.
    pub fn is_forbidden(&self, url: &str) -> bool {
        self.forbidden.matches(url)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        let key = Self::normalize(url).unwrap_or_else(|| url.to_string());
        self.visited.contains(&key)
    }

    pub fn is_queued(&self, url: &str) -> bool {
        Self::normalize(url).is_some_and(|key| self.queued.contains(&key))
    }

    /// Drop everything still queued.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Queued URLs in FIFO order.
    pub fn queued(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    /// Visited URLs in visit order.
    pub fn visited(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(String::as_str)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
