//! Core trait abstractions.
//!
//! These are the seams to the crawler's external collaborators: the
//! reasoning oracle, web search, page fetching and durable cache storage.

pub mod fetcher;
pub mod oracle;
pub mod searcher;
pub mod storage;
