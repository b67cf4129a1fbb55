//! Audit trail, per-stage metrics and run counters.

use serde::{Deserialize, Serialize};

/// Relevance verdict for one fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceRecord {
    pub url: String,
    pub is_relevant: bool,
    pub cache_id: String,

    /// Set when the relevance call failed and the page was kept by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_error: Option<String>,
}

impl RelevanceRecord {
    pub fn new(url: impl Into<String>, cache_id: impl Into<String>, is_relevant: bool) -> Self {
        Self {
            url: url.into(),
            is_relevant,
            cache_id: cache_id.into(),
            check_error: None,
        }
    }

    /// A page kept because the relevance call failed.
    pub fn failed_open(
        url: impl Into<String>,
        cache_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            check_error: Some(error.into()),
            ..Self::new(url, cache_id, true)
        }
    }
}

/// Duration and power draw of one stage execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetric {
    pub step: String,

    /// Wall time in seconds
    pub duration: f64,

    /// Mean of the power readings, 0.0 without readings
    pub avg_gpu_power_watts: f64,

    /// Number of power readings taken
    #[serde(default)]
    pub samples: usize,

    /// The power sampler had to be cancelled when the stage ended
    #[serde(default)]
    pub sampler_timed_out: bool,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub pages_fetched: usize,
    pub pages_skipped: usize,
    pub pages_irrelevant: usize,
    pub relevance_check_failures: usize,
    pub candidates_extracted: usize,
    pub candidates_repaired: usize,
    pub candidates_discarded: usize,
    pub candidates_rejected: usize,
    /// Verification calls that failed; the candidate was kept.
    #[serde(default)]
    pub verification_failures: usize,
    pub candidates_capped: usize,
    pub cap_events: usize,
}
