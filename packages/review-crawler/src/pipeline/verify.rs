//! Verify stage: authenticity filter and quota merge.
//!
//! This is where the quota is enforced on accepted reviews. A verification
//! failure keeps the candidate.

use tracing::{info, warn};

use crate::pipeline::state::PipelineState;
use crate::traits::oracle::Oracle;
use crate::types::review::ReviewCandidate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyDelta {
    /// Candidates to append to the accepted reviews, already capped.
    pub accepted: Vec<ReviewCandidate>,
    pub rejected: usize,
    /// Authentic candidates dropped because the quota was full.
    pub capped: usize,
    pub verification_failures: usize,
}

pub async fn run<O: Oracle + ?Sized>(
    state: &PipelineState,
    batch: Vec<ReviewCandidate>,
    oracle: &O,
) -> VerifyDelta {
    let mut delta = VerifyDelta::default();
    let mut authentic = Vec::with_capacity(batch.len());

    for candidate in batch {
        match oracle
            .verify_authenticity(&state.query, &candidate.review_text)
            .await
        {
            Ok(verdict) if verdict.is_authentic => authentic.push(candidate),
            Ok(_) => {
                info!(review = %candidate.preview(), "Rejected non-review text");
                delta.rejected += 1;
            }
            Err(e) => {
                warn!(error = %e, review = %candidate.preview(), "Verification failed, keeping review");
                delta.verification_failures += 1;
                authentic.push(candidate);
            }
        }
    }

    let remaining = state.remaining_slots();
    if authentic.len() > remaining {
        delta.capped = authentic.len() - remaining;
        authentic.truncate(remaining);
        info!(
            remaining,
            dropped = delta.capped,
            quota = state.quota,
            "Capped additions to respect quota"
        );
    }
    delta.accepted = authentic;

    info!(
        accepted = delta.accepted.len(),
        rejected = delta.rejected,
        "Verification finished"
    );
    delta
}
