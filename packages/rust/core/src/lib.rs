//! Collection pipeline for NoteScout.
//!
//! This crate ties the signed client and the field extractor together into
//! one sequential run: paginate the search endpoint, fetch each note's detail,
//! and accumulate records until the target count or the end of results.

pub mod collector;
pub mod detail;
pub mod pipeline;
pub mod search;

pub use collector::ResultSet;
pub use detail::DetailFetcher;
pub use pipeline::{CollectSummary, ProgressReporter, SilentProgress, collect};
pub use search::{SearchOutcome, SearchPaginator, SearchQuery, SearchState};
