//! Core domain types for notescout collection runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a well-formed note identifier.
pub const NOTE_ID_LEN: usize = 24;

/// Separator used when joining multi-valued URL fields into one cell.
pub const URL_SEPARATOR: &str = " | ";

/// Export column order. This is a contract with downstream consumers.
pub const COLUMNS: [&str; 10] = [
    "Post URL",
    "Author Name",
    "Likes",
    "Comments",
    "Post Title",
    "Caption",
    "Date Published",
    "Video URL",
    "User URL",
    "Images URL",
];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one collection run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SortPolicy
// ---------------------------------------------------------------------------

/// Ordering requested from the search endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    /// Upstream relevance ranking.
    #[default]
    General,
    /// Newest first.
    TimeDescending,
    /// Most liked first.
    PopularityDescending,
}

impl SortPolicy {
    /// Wire value sent in the search request body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::TimeDescending => "time_descending",
            Self::PopularityDescending => "popularity_descending",
        }
    }
}

impl std::fmt::Display for SortPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "time_descending" | "latest" => Ok(Self::TimeDescending),
            "popularity_descending" | "popular" => Ok(Self::PopularityDescending),
            other => Err(format!(
                "unknown sort policy '{other}': expected general, time_descending, or popularity_descending"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// NoteRef
// ---------------------------------------------------------------------------

/// A search hit that can be resolved into a detail payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRef {
    /// Opaque 24-character note identifier.
    pub note_id: String,
    /// Per-result access token required by the detail endpoint.
    pub xsec_token: String,
}

impl NoteRef {
    /// Build a reference from one raw search item.
    ///
    /// Returns `None` when the id is absent, not a string, or not exactly
    /// [`NOTE_ID_LEN`] characters long. A missing token becomes an empty string.
    pub fn from_search_item(item: &serde_json::Value) -> Option<Self> {
        let note_id = item.get("id")?.as_str()?;
        if note_id.chars().count() != NOTE_ID_LEN {
            return None;
        }
        let xsec_token = item
            .get("xsec_token")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        Some(Self {
            note_id: note_id.to_string(),
            xsec_token: xsec_token.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The flattened, exported representation of one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub post_url: String,
    pub author_name: String,
    /// Rendered exactly as upstream reports it (may be abbreviated, e.g. "1.2万").
    pub likes: String,
    pub comments: String,
    pub title: String,
    pub caption: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`; empty when unknown.
    pub published_at: String,
    /// Deduplicated URLs joined with [`URL_SEPARATOR`].
    pub video_urls: String,
    pub user_url: String,
    /// Deduplicated URLs joined with [`URL_SEPARATOR`].
    pub image_urls: String,
}

impl Record {
    /// Field values in [`COLUMNS`] order.
    pub fn values(&self) -> [&str; 10] {
        [
            self.post_url.as_str(),
            self.author_name.as_str(),
            self.likes.as_str(),
            self.comments.as_str(),
            self.title.as_str(),
            self.caption.as_str(),
            self.published_at.as_str(),
            self.video_urls.as_str(),
            self.user_url.as_str(),
            self.image_urls.as_str(),
        ]
    }
}
