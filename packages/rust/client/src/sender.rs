//! Resilient request sender: sign once, transmit the signed bytes, retry transport failures.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use notescout_shared::{CollectConfig, NoteScoutError, Result};
use notescout_signer::Signer;

use crate::response::ApiResponse;

/// Browser-like headers sent with every request.
const BASE_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("content-type", "application/json;charset=UTF-8"),
    ("dnt", "1"),
    ("pragma", "no-cache"),
    ("priority", "u=1, i"),
    (
        "sec-ch-ua",
        "\"Chromium\";v=\"128\", \"Not;A=Brand\";v=\"24\", \"Google Chrome\";v=\"128\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-site"),
    ("xsecappid", "xhs-pc-web"),
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    ),
];

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Retry and transport settings for [`RequestSender`].
#[derive(Debug, Clone)]
pub struct SenderOptions {
    /// Total attempts per request on transport failure.
    pub max_retries: u32,
    /// Constant pause between attempts.
    pub retry_delay: Duration,
    /// Per-attempt socket timeout.
    pub timeout: Duration,
    /// Public web origin, used for the `origin` and default `referer` headers.
    pub web_base: String,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            web_base: "https://www.xiaohongshu.com".into(),
        }
    }
}

impl From<&CollectConfig> for SenderOptions {
    fn from(config: &CollectConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            timeout: config.timeout,
            web_base: config.web_base.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical body encoding
// ---------------------------------------------------------------------------

/// Serialize a request body canonically: keys sorted at every level, compact,
/// non-ASCII left unescaped. The signature is computed over exactly this text.
pub fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<String> {
    let value = serde_json::to_value(body)
        .map_err(|e| NoteScoutError::parse(format!("request body is not JSON-serializable: {e}")))?;
    serde_json::to_string(&sorted(&value))
        .map_err(|e| NoteScoutError::parse(format!("failed to encode request body: {e}")))
}

/// Rebuild objects with keys in lexicographic order, whatever map backend serde_json uses.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Referer of the search-result page for `keyword`.
pub fn search_referer(web_base: &str, keyword: &str) -> Result<String> {
    let mut url = Url::parse(&format!("{}/search_result", web_base.trim_end_matches('/')))
        .map_err(|e| NoteScoutError::validation(format!("web_base '{web_base}': {e}")))?;
    url.query_pairs_mut().append_pair("keyword", keyword);
    Ok(url.to_string())
}

// ---------------------------------------------------------------------------
// RequestSender
// ---------------------------------------------------------------------------

/// Sends signed POST requests with bounded retry.
pub struct RequestSender {
    client: Client,
    signer: Arc<dyn Signer>,
    cookie: String,
    base_headers: HeaderMap,
    options: SenderOptions,
}

impl RequestSender {
    /// Create a sender for one session cookie.
    pub fn new(
        signer: Arc<dyn Signer>,
        cookie: impl Into<String>,
        options: SenderOptions,
    ) -> Result<Self> {
        let cookie = cookie.into();

        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| NoteScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        let mut base_headers = HeaderMap::new();
        for &(name, value) in BASE_HEADERS {
            base_headers.insert(name, HeaderValue::from_static(value));
        }

        let web_base = options.web_base.trim_end_matches('/');
        base_headers.insert("origin", header_value("origin", web_base)?);
        base_headers.insert("referer", header_value("referer", &format!("{web_base}/"))?);
        base_headers.insert("cookie", header_value("cookie", &cookie)?);

        Ok(Self {
            client,
            signer,
            cookie,
            base_headers,
            options,
        })
    }

    /// Replace the `referer` header used by subsequent requests.
    pub fn set_referer(&mut self, referer: &str) -> Result<()> {
        self.base_headers
            .insert("referer", header_value("referer", referer)?);
        Ok(())
    }

    /// Access to the signer, e.g. for search-session ids.
    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    /// POST `body` to `url`, signed for `uri`.
    ///
    /// Returns `None` when the request could not be signed or no response
    /// arrived within the retry budget. Every HTTP status, including non-200,
    /// is returned as-is and never retried here.
    #[instrument(skip_all, fields(uri = %uri))]
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        url: &str,
        uri: &str,
        body: &B,
    ) -> Option<ApiResponse> {
        let payload = match encode_body(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "request body could not be encoded");
                return None;
            }
        };

        let headers = match self.signed_headers(uri, &payload) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "request signing failed");
                return None;
            }
        };

        let max_retries = self.options.max_retries.max(1);
        for attempt in 1..=max_retries {
            let result = self
                .client
                .post(url)
                .headers(headers.clone())
                .body(payload.clone())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    match response.text().await {
                        Ok(body) => {
                            debug!(%status, attempt, bytes = body.len(), "response received");
                            return Some(ApiResponse { status, body });
                        }
                        Err(e) => warn!(%status, attempt, error = %e, "failed to read response body"),
                    }
                }
                Err(e) => warn!(attempt, error = %e, "request error"),
            }

            if attempt < max_retries {
                debug!(
                    attempt,
                    delay_ms = self.options.retry_delay.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }

        warn!(
            attempts = max_retries,
            "request failed. Refresh the cookie or try another account"
        );
        None
    }

    /// Base headers with the signer's headers merged on top.
    fn signed_headers(&self, uri: &str, payload: &str) -> Result<HeaderMap> {
        let signature = self.signer.sign(uri, payload, &self.cookie)?;

        let mut headers = self.base_headers.clone();
        for (name, value) in signature.iter() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                NoteScoutError::signer(format!("malformed signature header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                NoteScoutError::signer(format!("malformed value for signature header {name}: {e}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| NoteScoutError::config(format!("invalid {name} header value: {e}")))
}
