//! Structured answers requested from the oracle.
//!
//! Doc comments on the fields become the field descriptions of the JSON
//! schema the oracle is constrained by.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Query generation ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchQuery {
    /// A concise and highly effective keyword-based search query formulated to find relevant review pages for the given research topic.
    pub optimized_query: String,
}

// --- Extraction ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageRelevance {
    /// True if the webpage contains user-generated review content or links specifically about the subject, False if it is irrelevant.
    pub is_relevant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedReview {
    /// Title of the review
    #[serde(default)]
    pub review_title: Option<String>,

    /// Content of the review
    pub review_text: String,

    /// Star rating (usually 1-5)
    #[serde(default)]
    pub stars: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResult {
    /// List of extracted reviews from the current page content
    pub reviews: Vec<ExtractedReview>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReviewLinks {
    /// List of detected absolute or relative URLs that likely lead to more reviews (e.g. pagination or 'read more' links)
    pub urls: Vec<String>,
}

// --- Repair ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepairCheck {
    /// True if the review is truncated/a snippet and needs reconstruction/completion, False if it is complete.
    pub is_incomplete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepairSearch {
    /// A substring from the current review snippet to locate its position in the HTML source code.
    pub search_term: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepairResult {
    /// The reconstructed original full text (verbatim) from the webpage source.
    pub fixed_text: String,

    /// True if the text is successfully reconstructed and complete, False if it remains truncated.
    pub is_complete: bool,
}

// --- Verification ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReviewVerification {
    /// True if the text is an individually-authored customer review reflecting personal opinion/experience, False if it is spam, neutral description, or irrelevant.
    pub is_authentic: bool,
}
