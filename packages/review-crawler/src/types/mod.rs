//! Data types flowing through the pipeline.

pub mod audit;
pub mod responses;
pub mod review;
