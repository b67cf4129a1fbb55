//! GenerateQuery stage: rewrite the topic into a search query once.

use tracing::{info, warn};

use crate::pipeline::state::PipelineState;
use crate::traits::oracle::Oracle;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDelta {
    pub query: String,
}

pub async fn run<O: Oracle + ?Sized>(state: &PipelineState, oracle: &O) -> QueryDelta {
    let topic = state.query.as_str();

    let query = match oracle.optimize_query(topic).await {
        Ok(answer) => {
            let cleaned = answer.optimized_query.replace(['"', '\''], "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                warn!(topic = %topic, "Oracle returned an empty query, keeping topic");
                topic.to_string()
            } else {
                cleaned.to_string()
            }
        }
        Err(e) => {
            warn!(topic = %topic, error = %e, "Query optimization failed, keeping topic");
            topic.to_string()
        }
    };

    info!(query = %query, "Search query");
    QueryDelta { query }
}
