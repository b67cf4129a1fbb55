//! Result artifact.
//!
//! A run is persisted under `<results_dir>/results_<session_id>/` as
//! `reviews.json` (reviews, stage metrics, counters and a summary) and
//! `relevance_url.json` (the relevance audit log).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::pipeline::RunOutcome;
use crate::types::audit::{RelevanceRecord, RunStats, StepMetric};
use crate::types::review::ReviewCandidate;

pub const REVIEWS_FILE: &str = "reviews.json";
pub const RELEVANCE_FILE: &str = "relevance_url.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_reviews: usize,
    /// Sum of stage durations in seconds
    pub total_duration: f64,
    /// Mean of the per-stage power averages
    pub total_avg_wattage: f64,
}

impl RunSummary {
    pub fn from_metrics(total_reviews: usize, metrics: &[StepMetric]) -> Self {
        let total_duration = metrics.iter().map(|m| m.duration).sum();
        let total_avg_wattage = if metrics.is_empty() {
            0.0
        } else {
            metrics.iter().map(|m| m.avg_gpu_power_watts).sum::<f64>() / metrics.len() as f64
        };

        Self {
            total_reviews,
            total_duration,
            total_avg_wattage,
        }
    }
}

/// Contents of `reviews.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub query: String,
    pub generated_at: DateTime<Utc>,
    pub reviews: Vec<ReviewCandidate>,
    pub metrics: Vec<StepMetric>,
    pub stats: RunStats,
    pub summary: RunSummary,

    /// Written to its own file.
    #[serde(skip)]
    pub relevance: Vec<RelevanceRecord>,
}

impl RunReport {
    pub fn from_outcome(outcome: RunOutcome) -> Self {
        let summary = RunSummary::from_metrics(outcome.reviews.len(), &outcome.metrics);
        Self {
            query: outcome.query,
            generated_at: Utc::now(),
            reviews: outcome.reviews,
            metrics: outcome.metrics,
            stats: outcome.stats,
            summary,
            relevance: outcome.relevance_log,
        }
    }

    /// Folder receiving the files of `session_id`.
    pub fn folder(results_dir: &Path, session_id: &str) -> PathBuf {
        results_dir.join(format!("results_{session_id}"))
    }

    /// Write both files, returning the folder they were written to.
    pub async fn write(&self, results_dir: &Path, session_id: &str) -> Result<PathBuf> {
        let folder = Self::folder(results_dir, session_id);
        tokio::fs::create_dir_all(&folder).await?;

        write_json(&folder, REVIEWS_FILE, self).await?;
        write_json(&folder, RELEVANCE_FILE, &self.relevance).await?;

        info!(
            folder = %folder.display(),
            total_reviews = self.summary.total_reviews,
            "Results saved"
        );
        Ok(folder)
    }
}

async fn write_json<T: Serialize + ?Sized>(folder: &Path, name: &str, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = folder.join(format!(".{name}.tmp"));
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, folder.join(name)).await?;
    Ok(())
}
