//! Image and video URL discovery.
//!
//! Media shapes vary between note types and client versions, so each
//! extractor probes a fixed set of known locations and merges what it finds.

use serde_json::Value;

use crate::path::{dedup_preserving_order, first_list, first_str, first_truthy, lists_at};

const IMAGE_KEYS: &[&str] = &["url", "img_url", "image_url"];
const IMAGE_LIST_PATHS: &[&[&str]] = &[&["urls"], &["url_list"]];
const COVER_KEYS: &[&str] = &["url", "image_url"];

const VIDEO_CONTAINERS: &[&str] = &["video", "note_video"];
const VIDEO_DIRECT_KEYS: &[&str] = &["url", "play_url", "master_url"];
const VIDEO_LIST_PATHS: &[&[&str]] = &[
    &["url_list"],
    &["h264", "url_list"],
    &["play_addr", "url_list"],
    &["media", "dash", "play_addr", "url_list"],
    &["media", "stream", "h264", "url_list"],
    &["media", "stream", "url_list"],
];

/// Image URLs of a note card, in gallery order.
///
/// Falls back to the cover image only when the gallery yields nothing.
pub fn extract_image_urls(note_card: &Value) -> Vec<String> {
    let gallery = note_card
        .get("image_list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut urls: Vec<&str> = gallery.iter().filter_map(image_url).collect();

    if urls.is_empty() {
        if let Some(cover) = note_card.get("cover").filter(|c| c.is_object()) {
            urls.extend(first_str(cover, COVER_KEYS));
        }
    }

    dedup_preserving_order(urls)
}

fn image_url(image: &Value) -> Option<&str> {
    first_str(image, IMAGE_KEYS).or_else(|| {
        first_list(image, IMAGE_LIST_PATHS)?
            .first()?
            .as_str()
            .filter(|s| !s.is_empty())
    })
}

/// Video URLs of a note card: the direct URL first, then every known list.
pub fn extract_video_urls(note_card: &Value) -> Vec<String> {
    let Some(video) = first_truthy(note_card, VIDEO_CONTAINERS).filter(|v| v.is_object()) else {
        return Vec::new();
    };

    let direct = first_str(video, VIDEO_DIRECT_KEYS);
    let listed = lists_at(video, VIDEO_LIST_PATHS).filter_map(Value::as_str);

    dedup_preserving_order(direct.into_iter().chain(listed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn images_probe_keys_then_lists() {
        let card = json!({
            "image_list": [
                { "url": "https://img/1.jpg" },
                { "img_url": "", "image_url": "https://img/2.jpg" },
                { "urls": [], "url_list": ["https://img/3.jpg", "https://img/3b.jpg"] },
                { "url_list": [7] },
                "not-an-object",
                { "url": "https://img/1.jpg" }
            ],
            "cover": { "url": "https://img/cover.jpg" }
        });
        assert_eq!(
            extract_image_urls(&card),
            vec!["https://img/1.jpg", "https://img/2.jpg", "https://img/3.jpg"]
        );
    }

    #[test]
    fn images_fall_back_to_cover() {
        let card = json!({ "image_list": [{ "url": "" }], "cover": { "image_url": "https://img/c.jpg" } });
        assert_eq!(extract_image_urls(&card), vec!["https://img/c.jpg"]);

        let card = json!({ "image_list": null, "cover": "https://img/c.jpg" });
        assert!(extract_image_urls(&card).is_empty());

        assert!(extract_image_urls(&json!({})).is_empty());
        assert!(extract_image_urls(&json!(null)).is_empty());
    }

    #[test]
    fn videos_merge_direct_and_nested_lists() {
        let card = json!({
            "video": {
                "url": "https://v/direct.mp4",
                "url_list": ["https://v/a.mp4", ""],
                "h264": { "url_list": ["https://v/a.mp4", "https://v/b.mp4"] },
                "media": {
                    "dash": { "play_addr": { "url_list": "not-a-list" } },
                    "stream": { "h264": { "url_list": ["https://v/c.mp4"] }, "url_list": [null, "https://v/d.mp4"] }
                }
            }
        });
        assert_eq!(
            extract_video_urls(&card),
            vec![
                "https://v/direct.mp4",
                "https://v/a.mp4",
                "https://v/b.mp4",
                "https://v/c.mp4",
                "https://v/d.mp4",
            ]
        );
    }

    #[test]
    fn empty_video_falls_through_to_note_video() {
        let card = json!({ "video": {}, "note_video": { "play_url": "https://v/p.mp4" } });
        assert_eq!(extract_video_urls(&card), vec!["https://v/p.mp4"]);
    }

    #[test]
    fn non_object_video_yields_nothing() {
        assert!(extract_video_urls(&json!({ "video": "https://v/x.mp4" })).is_empty());
        assert!(extract_video_urls(&json!({ "video": null })).is_empty());
        assert!(extract_video_urls(&json!({})).is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let card = json!({
            "image_list": [{ "url": "https://img/1.jpg" }, { "url": "https://img/2.jpg" }],
            "video": { "master_url": "https://v/m.mp4" }
        });
        assert_eq!(extract_image_urls(&card), extract_image_urls(&card));
        assert_eq!(extract_video_urls(&card), extract_video_urls(&card));
    }
}
