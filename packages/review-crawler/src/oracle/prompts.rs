//! Prompts for the review oracle.
//!
//! Every prompt ends with the JSON schema of the expected answer. Page
//! content is substituted last so text on a page can never inject into
//! another placeholder.

/// System message sent with every oracle call.
pub const SYSTEM_PROMPT: &str = "You are a careful assistant that analyses web pages for customer reviews. Reply with a single JSON object that matches the schema given in the request and nothing else.";

/// Prompt for rewriting a research topic into a search query.
pub const GENERATE_QUERY_PROMPT: &str = r#"You are a search expert. Turn the research topic below into one concise, keyword-based web search query that finds pages with customer reviews about the subject.

Rules:
- Use keywords, not a sentence.
- Keep names of places, businesses and products exactly as given.
- Do not wrap the query in quotes.

Research topic: {query}

Answer with JSON matching this schema:
{json_schema}"#;

/// Prompt for deciding whether a page holds review content.
pub const FILTER_PAGE_PROMPT: &str = r#"Decide whether the webpage below contains user-generated reviews (or links to reviews) specifically about this subject: {query}

A page is relevant if real customers describe their own experience with the subject. Pages that are only about a different business, generic listings, news articles or advertising are not relevant.

Page URL: {url}

Answer with JSON matching this schema:
{json_schema}

Page content:
{page_text}"#;

/// Prompt for extracting individual reviews.
pub const EXTRACT_REVIEWS_PROMPT: &str = r#"Extract every individual customer review about "{query}" from the page content below.

Rules:
- Copy the review text verbatim. Do not summarize, translate or correct it.
- One entry per review. Keep truncated reviews (ending in "..." or "Read more") as they are.
- Fill in the title and star rating only when the page shows them.
- Return an empty list if the page has no reviews.

Page URL: {url}

Answer with JSON matching this schema:
{json_schema}

Page content:
{page_text}"#;

/// Prompt for finding links to more reviews.
pub const DETECT_REVIEW_LINKS_PROMPT: &str = r#"Find links on the page below that lead to MORE reviews of the same subject: pagination ("next", "page 2"), "show all reviews" or "read more reviews" links.

Rules:
- Only return links that appear in the page content.
- Do not return links to other businesses, login pages, social media or advertising.
- Relative links are fine; they are resolved against the page URL.
- Return an empty list if there are none.

Page URL: {base_url}

Answer with JSON matching this schema:
{json_schema}

Page content:
{page_text}"#;

/// Prompt for deciding whether a review is a truncated snippet.
pub const REVIEW_COMPLETENESS_PROMPT: &str = r#"Decide whether the review below is incomplete: a truncated snippet (for example ending in "...", "…", "Read more", or cut off mid-sentence) whose full text should be recovered from the page.

Subject: {query}

Review:
{review_text}

Answer with JSON matching this schema:
{json_schema}

Page content for reference:
{page_text}"#;

/// Prompt for choosing a term to locate a review in the page markup.
pub const REPAIR_SEARCH_PROMPT: &str = r#"We need to find the review below in the raw HTML source of its page. Pick a short, distinctive substring of the review (3 to 8 words, copied exactly) that will locate it.

Rules:
- Do not include the truncation marker ("...", "…", "Read more").
- Avoid phrases that are likely to appear in other reviews.
- Do not repeat any of these terms, they were not found: {history}

Review:
{review_text}

Answer with JSON matching this schema:
{json_schema}"#;

/// Prompt for reconstructing a review from markup segments.
pub const REPAIR_REVIEW_PROMPT: &str = r#"The review below about "{query}" is truncated. Reconstruct its full original text from the HTML source segments of its page.

Rules:
- Copy the full text verbatim from the segments. Never invent or paraphrase text.
- Full texts are often hidden in attributes, collapsed elements or JSON data.
- Set is_complete to true only if the reconstructed text is the complete review.

Current review text:
{current_review_text}

Answer with JSON matching this schema:
{json_schema}

HTML source segments:
{html_segments}"#;

/// Prompt for verifying a review is authentic.
pub const VERIFY_REVIEW_PROMPT: &str = r#"Decide whether the text below is an authentic, individually-authored customer review about "{query}" that reflects a personal opinion or experience.

Reject spam, advertising, neutral business descriptions, owner replies, aggregated rating summaries and text about a different subject.

Text:
{review_text}

Answer with JSON matching this schema:
{json_schema}"#;

pub fn format_generate_query_prompt(topic: &str, schema: &str) -> String {
    GENERATE_QUERY_PROMPT
        .replace("{json_schema}", schema)
        .replace("{query}", topic)
}

pub fn format_filter_page_prompt(query: &str, url: &str, page_text: &str, schema: &str) -> String {
    FILTER_PAGE_PROMPT
        .replace("{json_schema}", schema)
        .replace("{query}", query)
        .replace("{url}", url)
        .replace("{page_text}", page_text)
}

pub fn format_extract_prompt(query: &str, url: &str, page_text: &str, schema: &str) -> String {
    EXTRACT_REVIEWS_PROMPT
        .replace("{json_schema}", schema)
        .replace("{query}", query)
        .replace("{url}", url)
        .replace("{page_text}", page_text)
}

pub fn format_detect_links_prompt(base_url: &str, page_text: &str, schema: &str) -> String {
    DETECT_REVIEW_LINKS_PROMPT
        .replace("{json_schema}", schema)
        .replace("{base_url}", base_url)
        .replace("{page_text}", page_text)
}

pub fn format_completeness_prompt(
    query: &str,
    page_text: &str,
    review_text: &str,
    schema: &str,
) -> String {
    REVIEW_COMPLETENESS_PROMPT
        .replace("{json_schema}", schema)
        .replace("{query}", query)
        .replace("{review_text}", review_text)
        .replace("{page_text}", page_text)
}

/// Earlier failed terms are listed quoted, or "None".
pub fn format_repair_search_prompt(review_text: &str, failed_terms: &[String], schema: &str) -> String {
    let history = if failed_terms.is_empty() {
        "None".to_string()
    } else {
        failed_terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(", ")
    };

    REPAIR_SEARCH_PROMPT
        .replace("{json_schema}", schema)
        .replace("{history}", &history)
        .replace("{review_text}", review_text)
}

/// Segments are numbered and separated by `---` lines.
pub fn format_repair_prompt(
    query: &str,
    html_segments: &[String],
    current_text: &str,
    schema: &str,
) -> String {
    let segments = html_segments
        .iter()
        .enumerate()
        .map(|(i, segment)| format!("Source Segment {}:\n{}", i + 1, segment))
        .collect::<Vec<_>>()
        .join("\n---\n");

    REPAIR_REVIEW_PROMPT
        .replace("{json_schema}", schema)
        .replace("{query}", query)
        .replace("{current_review_text}", current_text)
        .replace("{html_segments}", &segments)
}

pub fn format_verify_prompt(query: &str, review_text: &str, schema: &str) -> String {
    VERIFY_REVIEW_PROMPT
        .replace("{json_schema}", schema)
        .replace("{query}", query)
        .replace("{review_text}", review_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_filled() {
        let prompt = format_filter_page_prompt("pizza", "https://a.com", "page", "{}");
        assert!(prompt.contains("about this subject: pizza"));
        assert!(prompt.contains("Page URL: https://a.com"));
        assert!(!prompt.contains("{query}"));
        assert!(!prompt.contains("{json_schema}"));
        assert!(!prompt.contains("{page_text}"));
    }

    #[test]
    fn test_page_text_cannot_inject_placeholders() {
        let prompt = format_extract_prompt("pizza", "https://a.com", "literal {query} here", "{}");
        assert!(prompt.contains("literal {query} here"));
    }

    #[test]
    fn test_repair_search_history() {
        let prompt = format_repair_search_prompt("text", &[], "{}");
        assert!(prompt.contains("they were not found: None"));

        let failed = vec!["crispy crust".to_string(), "friendly staff".to_string()];
        let prompt = format_repair_search_prompt("text", &failed, "{}");
        assert!(prompt.contains(r#""crispy crust", "friendly staff""#));
    }

    #[test]
    fn test_repair_segments_are_numbered() {
        let segments = vec!["<p>a</p>".to_string(), "<p>b</p>".to_string()];
        let prompt = format_repair_prompt("pizza", &segments, "a...", "{}");
        assert!(prompt.contains("Source Segment 1:\n<p>a</p>\n---\nSource Segment 2:\n<p>b</p>"));
    }
}
