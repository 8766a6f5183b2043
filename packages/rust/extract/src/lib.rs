//! Field extraction from raw note payloads.
//!
//! Everything here is pure and total: absent keys, `null`s and wrong-typed
//! values at any depth produce empty/default output, never an error.
//!
//! - [`path`]: safe navigation through nested JSON
//! - [`text`]: whitespace and timestamp normalization
//! - [`media`]: image and video URL discovery
//! - [`build_record`]: one note card to one exported [`Record`](notescout_shared::Record)

pub mod media;
pub mod path;
mod record;
pub mod text;

pub use media::{extract_image_urls, extract_video_urls};
pub use record::{build_record, note_url, user_url};
pub use text::{clean_text, format_timestamp, join_urls};
