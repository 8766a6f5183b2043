//! Signed HTTP access to the upstream search and detail APIs.
//!
//! This crate provides:
//! - [`RequestSender`]: one signed POST with bounded retry and fixed delay
//! - [`ApiResponse`] / [`ResponseFailure`]: the raw result and its operator-facing classification
//! - [`encode_body`]: the canonical request serialization that gets signed and sent

mod response;
mod sender;

pub use response::{ApiResponse, ResponseFailure};
pub use sender::{RequestSender, SenderOptions, encode_body, search_referer};

/// Path of the note search endpoint.
pub const SEARCH_URI: &str = "/api/sns/web/v1/search/notes";

/// Path of the note detail endpoint.
pub const DETAIL_URI: &str = "/api/sns/web/v1/feed";
