//! Crawl pipeline: an explicit state machine over five stages.
//!
//! ```text
//! GenerateQuery → Retrieve → Extract ─┬─→ Repair ─→ Verify ─┬─→ Terminate
//!                               ↑     └──────────────↗      │
//!                               └────────────────────────────┘
//! ```
//!
//! Each stage reads a [`PipelineState`] and returns a delta; the
//! [`Pipeline`] runner merges deltas, records per-stage metrics and picks
//! the next stage. Exactly one frontier URL is processed per Extract.

pub mod extract;
pub mod query;
pub mod repair;
pub mod retrieve;
pub mod runner;
pub mod state;
pub mod verify;

pub use extract::{ExtractDelta, PageOutcome};
pub use repair::{repair_candidate, RepairAttempt, RepairDelta, RepairOutcome, RepairReport};
pub use retrieve::search_with_retry;
pub use runner::{Pipeline, RunOutcome};
pub use state::{PipelineState, Stage};
pub use verify::VerifyDelta;
