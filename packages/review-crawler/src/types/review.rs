//! Review candidates.

use serde::{Deserialize, Serialize};

use crate::types::responses::ExtractedReview;

/// A review extracted from a page.
///
/// Created by extraction, its text may be rewritten by repair, and it is
/// either accepted or dropped by verification. Serialized with the field
/// names of the result artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCandidate {
    /// Review headline, if the page shows one
    pub review_title: Option<String>,

    /// Review body; the only field repair rewrites
    pub review_text: String,

    /// Star rating (usually 1-5)
    pub stars: Option<u32>,

    /// Page the review was extracted from
    #[serde(rename = "website_url")]
    pub origin_url: String,

    /// Cache identifier of that page's stored markup
    pub cache_id: String,

    /// True if the page was reached by following a discovered link
    #[serde(rename = "found_via_discovery")]
    pub discovered: bool,
}

impl ReviewCandidate {
    /// Create a candidate from an oracle extraction.
    pub fn from_extracted(
        review: ExtractedReview,
        origin_url: impl Into<String>,
        cache_id: impl Into<String>,
        discovered: bool,
    ) -> Self {
        Self {
            review_title: review.review_title,
            review_text: review.review_text,
            stars: review.stars,
            origin_url: origin_url.into(),
            cache_id: cache_id.into(),
            discovered,
        }
    }

    /// Short prefix of the text for log lines.
    pub fn preview(&self) -> &str {
        crate::limits::truncate_chars(&self.review_text, 40)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_artifact_field_names() {
        let candidate = ReviewCandidate::from_extracted(
            ExtractedReview {
                review_title: Some("Great pizza".into()),
                review_text: "Best crust in town.".into(),
                stars: Some(5),
            },
            "https://example.com/reviews",
            "cache_abc.html",
            true,
        );

        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["website_url"], "https://example.com/reviews");
        assert_eq!(json["found_via_discovery"], true);
        assert_eq!(json["cache_id"], "cache_abc.html");
        assert_eq!(json["stars"], 5);
    }
}
