//! Per-note detail fetch.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use notescout_client::{DETAIL_URI, RequestSender, ResponseFailure};
use notescout_extract::build_record;
use notescout_extract::path::lookup;
use notescout_shared::{NoteRef, Record};

/// Image formats requested for both search and detail payloads.
pub(crate) const IMAGE_FORMATS: [&str; 3] = ["jpg", "webp", "avif"];

#[derive(Debug, Serialize)]
struct DetailRequest<'a> {
    source_note_id: &'a str,
    image_scenes: [&'static str; 3],
    extra: DetailExtra,
    xsec_token: &'a str,
    xsec_source: &'static str,
}

#[derive(Debug, Serialize)]
struct DetailExtra {
    need_body_topic: &'static str,
}

impl<'a> DetailRequest<'a> {
    fn new(note: &'a NoteRef) -> Self {
        Self {
            source_note_id: &note.note_id,
            image_scenes: IMAGE_FORMATS,
            extra: DetailExtra {
                need_body_topic: "1",
            },
            xsec_token: &note.xsec_token,
            xsec_source: "pc_search",
        }
    }
}

/// Fetches one note's detail and flattens it into a [`Record`].
pub struct DetailFetcher<'a> {
    sender: &'a RequestSender,
    endpoint: String,
    web_base: &'a str,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(sender: &'a RequestSender, api_base: &str, web_base: &'a str) -> Self {
        Self {
            sender,
            endpoint: format!("{}{DETAIL_URI}", api_base.trim_end_matches('/')),
            web_base,
        }
    }

    /// Fetch `note`. `None` means the note was skipped; that is an expected
    /// outcome (private, removed, or rejected) and never aborts a run.
    #[instrument(skip_all, fields(note_id = %note.note_id))]
    pub async fn fetch(&self, note: &NoteRef) -> Option<Record> {
        let response = self
            .sender
            .send(&self.endpoint, DETAIL_URI, &DetailRequest::new(note))
            .await;

        if let Some(failure) = ResponseFailure::classify(response.as_ref()) {
            warn!(note_id = %note.note_id, %failure, hint = failure.hint(), "note request failed");
            return None;
        }

        let Some(body) = response.as_ref().and_then(|r| r.json()) else {
            warn!(note_id = %note.note_id, "note response is not JSON");
            return None;
        };

        match note_card(&body) {
            Some(card) => {
                let record = build_record(card, note, self.web_base);
                debug!(note_id = %note.note_id, title = %record.title, "note collected");
                Some(record)
            }
            None => {
                warn!(note_id = %note.note_id, "note is not viewable or could not be parsed");
                None
            }
        }
    }
}

/// `data.items[0].note_card`, when it is an object.
fn note_card(body: &Value) -> Option<&Value> {
    lookup(body, &["data", "items"])?
        .as_array()?
        .first()?
        .get("note_card")
        .filter(|card| card.is_object())
}
