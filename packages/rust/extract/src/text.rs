//! Text and timestamp normalization.

use chrono::{DateTime, Local};
use serde_json::Value;

use notescout_shared::URL_SEPARATOR;

/// Output format for publication timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Flatten line breaks to single spaces and trim. Non-strings yield `""`.
pub fn clean_text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(clean_str)
        .unwrap_or_default()
}

/// [`clean_text`] for a plain string.
pub fn clean_str(s: &str) -> String {
    s.replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

/// Render a millisecond epoch as local time, truncated to whole seconds.
///
/// Accepts integers, finite floats and integer strings. Anything else,
/// including values outside the representable date range, yields `""`.
pub fn format_timestamp(value: Option<&Value>) -> String {
    value
        .and_then(epoch_millis)
        .and_then(|ms| DateTime::from_timestamp(ms.div_euclid(1000), 0))
        .map(|utc| utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

fn epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Join non-empty URLs with [`URL_SEPARATOR`].
pub fn join_urls<S: AsRef<str>>(urls: &[S]) -> String {
    urls.iter()
        .map(AsRef::as_ref)
        .filter(|u| !u.is_empty())
        .collect::<Vec<_>>()
        .join(URL_SEPARATOR)
}

/// Render a scalar count as upstream reports it; non-scalars yield `""`.
pub(crate) fn display_count(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => clean_str(s),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
