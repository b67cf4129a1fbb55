//! Fixed budgets for oracle context windows, repair search and networking.

use std::time::Duration;

// --- Character budgets for oracle prompts ---

/// Page text sample used to decide whether a page is relevant.
pub const MAX_FILTER_SNIPPET: usize = 30_000;
/// Page text handed to review extraction.
pub const MAX_EXTRACT_SNIPPET: usize = 40_000;
/// Page text handed to "more reviews" link discovery.
pub const MAX_DETECT_SNIPPET: usize = 30_000;
/// Page text handed to the repair completeness check.
pub const MAX_SNIPPET_LEN: usize = 15_000;

// --- Repair search ---

/// Search-then-reconstruct attempts per candidate.
pub const MAX_REPAIR_ATTEMPTS: usize = 5;
/// Markup matches turned into context blocks per attempt.
pub const MAX_REPAIR_CONTEXTS: usize = 5;
/// Cap on a single context block (raw markup chars).
pub const MAX_REPAIR_CHARS: usize = 5_000;
/// Cap on all context blocks of one attempt combined.
pub const MAX_REPAIR_TOTAL_CHARS: usize = 12_000;
/// Maximum ancestors climbed from a matching text node.
pub const REPAIR_SEARCH_DEPTH: usize = 3;
/// Climbing stops once the block's text reaches this size.
pub const REPAIR_CONTEXT_MIN_CHARS: usize = 2_500;
/// Heuristic completeness threshold used when the check call fails.
pub const MIN_REPAIR_LENGTH: usize = 150;

// --- Networking ---

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = "Mozilla/5.0";

/// Search results containing this domain are always dropped.
pub const DENYLISTED_DOMAIN: &str = "tripadvisor";

// --- Telemetry ---

pub const TELEMETRY_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
pub const TELEMETRY_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("", 3), "");
        // Multi-byte characters are never split
        assert_eq!(truncate_chars("größer", 3), "grö");
    }
}
