use serde_json::{Map, Value};
use url::Url;

use notescout_shared::{NoteRef, Record};

use crate::media::{extract_image_urls, extract_video_urls};
use crate::text::{clean_text, display_count, format_timestamp, join_urls};

/// Flatten one detail-response note card into a [`Record`].
///
/// `note` supplies the identity used for the post link; the card itself is
/// never trusted for it.
pub fn build_record(note_card: &Value, note: &NoteRef, web_base: &str) -> Record {
    let empty = Map::new();
    let user = object_or(note_card.get("user"), &empty);
    let interact = object_or(note_card.get("interact_info"), &empty);

    let user_id = clean_text(user.get("user_id"));
    let user_url = if user_id.is_empty() {
        String::new()
    } else {
        self::user_url(web_base, &user_id)
    };

    Record {
        post_url: note_url(web_base, &note.note_id, &note.xsec_token),
        author_name: clean_text(user.get("nickname")),
        likes: display_count(interact.get("liked_count")),
        comments: display_count(interact.get("comment_count")),
        title: clean_text(note_card.get("title")),
        caption: clean_text(note_card.get("desc")),
        published_at: format_timestamp(note_card.get("time")),
        video_urls: join_urls(&extract_video_urls(note_card)),
        user_url,
        image_urls: join_urls(&extract_image_urls(note_card)),
    }
}

fn object_or<'a>(value: Option<&'a Value>, fallback: &'a Map<String, Value>) -> &'a Map<String, Value> {
    value.and_then(Value::as_object).unwrap_or(fallback)
}

/// Public link to a note, carrying the token that grants access to it.
pub fn note_url(web_base: &str, note_id: &str, xsec_token: &str) -> String {
    match Url::parse(web_base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(["explore", note_id]);
            }
            url.query_pairs_mut()
                .append_pair("xsec_token", xsec_token)
                .append_pair("xsec_source", "pc_search");
            url.into()
        }
        _ => format!(
            "{}/explore/{note_id}?xsec_token={xsec_token}&xsec_source=pc_search",
            web_base.trim_end_matches('/')
        ),
    }
}

/// Public profile link for an author.
pub fn user_url(web_base: &str, user_id: &str) -> String {
    format!("{}/user/profile/{user_id}", web_base.trim_end_matches('/'))
}
