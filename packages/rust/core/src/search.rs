//! Search pagination: the state machine that drives a collection run.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use notescout_client::{ApiResponse, RequestSender, ResponseFailure, SEARCH_URI};
use notescout_extract::path::lookup;
use notescout_shared::{CollectConfig, DelayRange, NoteRef, SortPolicy};

use crate::collector::ResultSet;
use crate::detail::{DetailFetcher, IMAGE_FORMATS};
use crate::pipeline::ProgressReporter;

/// Paginator state. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Running,
    /// The search endpoint returned an empty page, or a page with no unseen note.
    Exhausted,
    /// The result set reached its target count.
    Capped,
    /// The search endpoint failed; collected records are kept.
    Failed,
}

impl SearchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Exhausted => "exhausted",
            Self::Capped => "capped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of one search page request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery<'a> {
    pub ext_flags: Vec<String>,
    pub image_formats: [&'static str; 3],
    pub keyword: &'a str,
    pub note_type: u32,
    pub page: u32,
    pub page_size: u32,
    pub search_id: &'a str,
    pub sort: SortPolicy,
}

impl<'a> SearchQuery<'a> {
    pub fn new(config: &'a CollectConfig, page: u32, search_id: &'a str) -> Self {
        Self {
            ext_flags: Vec::new(),
            image_formats: IMAGE_FORMATS,
            keyword: &config.keyword,
            note_type: config.note_type,
            page,
            page_size: config.page_size,
            search_id,
            sort: config.sort,
        }
    }
}

/// Counters and final state of one paginator run.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub state: SearchState,
    /// Search requests issued.
    pub pages_requested: u32,
    /// Detail requests issued.
    pub detail_attempts: usize,
    /// Search items without a well-formed note reference.
    pub malformed: usize,
    /// Search items whose note was already seen this run.
    pub duplicates: usize,
    /// Detail fetches that yielded no record.
    pub skipped: usize,
}

/// Walks search pages in order and feeds each note through the detail fetcher.
pub struct SearchPaginator<'a> {
    sender: &'a RequestSender,
    details: DetailFetcher<'a>,
    config: &'a CollectConfig,
    endpoint: String,
}

impl<'a> SearchPaginator<'a> {
    pub fn new(sender: &'a RequestSender, config: &'a CollectConfig) -> Self {
        Self {
            sender,
            details: DetailFetcher::new(sender, &config.api_base, &config.web_base),
            config,
            endpoint: format!("{}{SEARCH_URI}", config.api_base.trim_end_matches('/')),
        }
    }

    /// Run until a terminal state, appending records to `results`.
    #[instrument(skip_all, fields(keyword = %self.config.keyword, target = results.target()))]
    pub async fn run(
        &self,
        results: &mut ResultSet,
        progress: &dyn ProgressReporter,
    ) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();

        let search_id = match self.sender.signer().new_search_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "could not obtain a search id");
                outcome.state = SearchState::Failed;
                return outcome;
            }
        };
        debug!(%search_id, "search session started");

        let mut seen = HashSet::new();
        let mut page: u32 = 1;

        while outcome.state == SearchState::Running {
            if results.is_full() {
                outcome.state = SearchState::Capped;
                break;
            }

            let query = SearchQuery::new(self.config, page, &search_id);
            outcome.pages_requested += 1;
            let response = self.sender.send(&self.endpoint, SEARCH_URI, &query).await;

            let Some(body) = page_body(response.as_ref(), page) else {
                outcome.state = SearchState::Failed;
                break;
            };
            let items = lookup(&body, &["data", "items"])
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            info!(page, items = items.len(), "search page received");
            progress.page_fetched(page, items.len());

            if items.is_empty() {
                outcome.state = SearchState::Exhausted;
                break;
            }

            let fresh = self
                .collect_page(items, &mut seen, results, &mut outcome, progress)
                .await;

            // A page of repeats would otherwise be requested forever.
            if outcome.state == SearchState::Running && fresh == 0 {
                info!(page, "search page held no unseen notes");
                outcome.state = SearchState::Exhausted;
            }

            if outcome.state == SearchState::Running {
                page += 1;
                pause(self.config.page_delay).await;
            }
        }

        info!(
            state = %outcome.state,
            pages = outcome.pages_requested,
            collected = results.len(),
            "search finished"
        );
        outcome
    }

    /// Process one page of items and return how many unseen notes it held.
    /// Sets `Capped` when the target is reached.
    async fn collect_page(
        &self,
        items: &[Value],
        seen: &mut HashSet<String>,
        results: &mut ResultSet,
        outcome: &mut SearchOutcome,
        progress: &dyn ProgressReporter,
    ) -> usize {
        let mut fresh = 0;
        for item in items {
            if results.is_full() {
                outcome.state = SearchState::Capped;
                return fresh;
            }

            let Some(note) = NoteRef::from_search_item(item) else {
                outcome.malformed += 1;
                debug!(id = ?item.get("id"), "skipping malformed search item");
                continue;
            };
            if !seen.insert(note.note_id.clone()) {
                outcome.duplicates += 1;
                debug!(note_id = %note.note_id, "skipping duplicate note");
                continue;
            }
            fresh += 1;

            outcome.detail_attempts += 1;
            match self.details.fetch(&note).await {
                Some(record) => {
                    results.push(record);
                    if let Some(record) = results.records().last() {
                        progress.record_collected(record, results.len(), results.target());
                    }
                }
                None => {
                    outcome.skipped += 1;
                    progress.note_skipped(&note.note_id);
                }
            }

            if results.is_full() {
                outcome.state = SearchState::Capped;
                return fresh;
            }
            pause(self.config.note_delay).await;
        }
        fresh
    }
}

/// Parsed body of a successful search page, or `None` when the run must stop.
fn page_body(response: Option<&ApiResponse>, page: u32) -> Option<Value> {
    if let Some(failure) = ResponseFailure::classify(response) {
        warn!(page, %failure, hint = failure.hint(), "search request failed, stopping");
        return None;
    }
    let body = response?.json();
    if body.is_none() {
        warn!(page, "search response is not JSON, stopping");
    }
    body
}

/// Random duration within `range`; `None` for a zero range.
fn jitter(range: DelayRange) -> Option<Duration> {
    if range.is_zero() {
        return None;
    }
    let min = range.min_ms.min(range.max_ms);
    let ms = rand::rng().random_range(min..=range.max_ms);
    Some(Duration::from_millis(ms))
}

async fn pause(range: DelayRange) {
    if let Some(delay) = jitter(range) {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use notescout_client::{DETAIL_URI, SenderOptions};
    use notescout_signer::{SignatureHeaders, Signer, StaticSigner};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::pipeline::SilentProgress;

    fn note_id(n: usize) -> String {
        format!("{n:024x}")
    }

    fn config(server: &MockServer, target_count: usize) -> CollectConfig {
        CollectConfig {
            keyword: "NIO ES8".into(),
            target_count,
            page_size: 20,
            sort: SortPolicy::General,
            note_type: 0,
            max_retries: 1,
            retry_delay: Duration::ZERO,
            timeout: Duration::from_secs(2),
            note_delay: DelayRange::ZERO,
            page_delay: DelayRange::ZERO,
            api_base: server.uri(),
            web_base: "https://www.example.com".into(),
        }
    }

    fn sender(config: &CollectConfig) -> RequestSender {
        RequestSender::new(
            Arc::new(StaticSigner::default()),
            "a1=abc",
            SenderOptions::from(config),
        )
        .unwrap()
    }

    fn search_page(ids: impl IntoIterator<Item = String>) -> ResponseTemplate {
        let items: Vec<_> = ids
            .into_iter()
            .map(|id| json!({ "id": id, "xsec_token": "tok", "model_type": "note" }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": items } }))
    }

    async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(SEARCH_URI))
            .and(body_partial_json(json!({ "page": page })))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    fn detail_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "data": { "items": [{ "note_card": { "title": "note", "user": { "nickname": "n" } } }] }
        }))
    }

    #[test]
    fn query_serializes_expected_fields() {
        let config = CollectConfig {
            keyword: "NIO".into(),
            target_count: 1,
            page_size: 20,
            sort: SortPolicy::TimeDescending,
            note_type: 0,
            max_retries: 1,
            retry_delay: Duration::ZERO,
            timeout: Duration::from_secs(1),
            note_delay: DelayRange::ZERO,
            page_delay: DelayRange::ZERO,
            api_base: "https://api.example.com".into(),
            web_base: "https://www.example.com".into(),
        };
        let body = serde_json::to_value(SearchQuery::new(&config, 3, "sid")).unwrap();
        assert_eq!(
            body,
            json!({
                "ext_flags": [],
                "image_formats": ["jpg", "webp", "avif"],
                "keyword": "NIO",
                "note_type": 0,
                "page": 3,
                "page_size": 20,
                "search_id": "sid",
                "sort": "time_descending"
            })
        );
    }

    #[test]
    fn jitter_stays_in_range() {
        assert!(jitter(DelayRange::ZERO).is_none());
        for _ in 0..50 {
            let delay = jitter(DelayRange::new(5, 9)).unwrap();
            assert!((5..=9).contains(&delay.as_millis()));
        }
        assert_eq!(jitter(DelayRange::new(7, 7)), Some(Duration::from_millis(7)));
    }

    #[tokio::test]
    async fn stops_at_target_after_three_pages() {
        let server = MockServer::start().await;
        for page in 1..=3u32 {
            let base = (page as usize - 1) * 20;
            mount_page(&server, page, search_page((base..base + 20).map(note_id))).await;
        }
        // Never requested: the target is reached on page 3.
        Mock::given(method("POST"))
            .and(path(SEARCH_URI))
            .and(body_partial_json(json!({ "page": 4 })))
            .respond_with(search_page([]))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(50)
            .mount(&server)
            .await;

        let config = config(&server, 50);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Capped);
        assert_eq!(outcome.pages_requested, 3);
        assert_eq!(outcome.detail_attempts, 50);
        assert_eq!(results.len(), 50);
        // Excess notes on the last page are never fetched.
        assert!(results.records().iter().all(|r| !r.post_url.contains(&note_id(50))));
    }

    #[tokio::test]
    async fn empty_page_ends_with_exhausted() {
        let server = MockServer::start().await;
        for page in 1..=3u32 {
            let base = (page as usize - 1) * 20;
            mount_page(&server, page, search_page((base..base + 20).map(note_id))).await;
        }
        mount_page(&server, 4, search_page([])).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(60)
            .mount(&server)
            .await;

        let config = config(&server, 100);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Exhausted);
        assert_eq!(outcome.pages_requested, 4);
        assert_eq!(outcome.detail_attempts, 60);
        assert_eq!(results.len(), 60);
    }

    #[tokio::test]
    async fn malformed_refs_are_never_fetched() {
        let server = MockServer::start().await;
        let response = ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": [
            { "id": "short", "xsec_token": "t" },
            { "xsec_token": "t" },
            { "id": 123456789, "xsec_token": "t" },
            { "id": format!("{}x", note_id(1)), "xsec_token": "t" },
            { "id": note_id(2), "xsec_token": "t" }
        ] } }));
        mount_page(&server, 1, response).await;
        mount_page(&server, 2, search_page([])).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .and(body_partial_json(json!({ "source_note_id": note_id(2) })))
            .respond_with(detail_ok())
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Exhausted);
        assert_eq!(outcome.malformed, 4);
        assert_eq!(outcome.detail_attempts, 1);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn search_failure_on_first_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, ResponseTemplate::new(500)).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(0)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Failed);
        assert_eq!(outcome.pages_requested, 1);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn later_failure_keeps_collected_records() {
        let server = MockServer::start().await;
        mount_page(&server, 1, search_page((0..3).map(note_id))).await;
        mount_page(&server, 2, ResponseTemplate::new(200).set_body_string("not json")).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(3)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Failed);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn unviewable_note_is_skipped_and_page_continues() {
        let server = MockServer::start().await;
        mount_page(&server, 1, search_page((0..3).map(note_id))).await;
        mount_page(&server, 2, search_page([])).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .and(body_partial_json(json!({ "source_note_id": note_id(1) })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(2)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Exhausted);
        assert_eq!(outcome.detail_attempts, 3);
        assert_eq!(outcome.skipped, 1);
        let urls: Vec<_> = results.records().iter().map(|r| r.post_url.as_str()).collect();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains(&note_id(0)));
        assert!(urls[1].contains(&note_id(2)));
    }

    #[tokio::test]
    async fn duplicates_across_pages_are_fetched_once() {
        let server = MockServer::start().await;
        mount_page(&server, 1, search_page((0..3).map(note_id))).await;
        mount_page(&server, 2, search_page((2..5).map(note_id))).await;
        mount_page(&server, 3, search_page([])).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(5)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.detail_attempts, 5);
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn repeated_page_ends_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_URI))
            .respond_with(search_page((0..3).map(note_id)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .expect(3)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            SearchPaginator::new(&sender, &config).run(&mut results, &SilentProgress),
        )
        .await
        .expect("run terminates");

        assert_eq!(outcome.state, SearchState::Exhausted);
        assert_eq!(outcome.pages_requested, 2);
        assert_eq!(outcome.duplicates, 3);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn malformed_only_page_ends_the_run() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            1,
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": [
                { "id": "short", "xsec_token": "t" },
                { "xsec_token": "t" }
            ] } })),
        )
        .await;

        let config = config(&server, 10);
        let sender = sender(&config);
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Exhausted);
        assert_eq!(outcome.pages_requested, 1);
        assert_eq!(outcome.malformed, 2);
    }

    /// Hands out one search id, then records every id it was asked to sign with.
    struct CountingSigner {
        search_ids: Mutex<u32>,
        bodies: Mutex<Vec<String>>,
    }

    impl Signer for CountingSigner {
        fn sign(&self, _uri: &str, body: &str, _cookie: &str) -> notescout_shared::Result<SignatureHeaders> {
            self.bodies.lock().unwrap().push(body.to_string());
            StaticSigner::default().sign("", "", "")
        }

        fn new_search_id(&self) -> notescout_shared::Result<String> {
            let mut count = self.search_ids.lock().unwrap();
            *count += 1;
            Ok(format!("sid-{count}"))
        }
    }

    #[tokio::test]
    async fn search_id_is_reused_and_pages_increase() {
        let server = MockServer::start().await;
        mount_page(&server, 1, search_page([note_id(0)])).await;
        mount_page(&server, 2, search_page([note_id(1)])).await;
        mount_page(&server, 3, search_page([])).await;
        Mock::given(method("POST"))
            .and(path(DETAIL_URI))
            .respond_with(detail_ok())
            .mount(&server)
            .await;

        let signer = Arc::new(CountingSigner {
            search_ids: Mutex::new(0),
            bodies: Mutex::new(Vec::new()),
        });
        let config = config(&server, 10);
        let sender =
            RequestSender::new(signer.clone(), "a1=abc", SenderOptions::from(&config)).unwrap();
        let mut results = ResultSet::new(config.target_count);
        SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(*signer.search_ids.lock().unwrap(), 1);
        let pages: Vec<u64> = signer
            .bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| serde_json::from_str::<Value>(b).unwrap())
            .filter(|b| b.get("search_id").is_some())
            .inspect(|b| assert_eq!(b["search_id"], "sid-1"))
            .map(|b| b["page"].as_u64().unwrap())
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn signer_failure_fails_before_any_request() {
        struct NoSearchId;
        impl Signer for NoSearchId {
            fn sign(&self, _: &str, _: &str, _: &str) -> notescout_shared::Result<SignatureHeaders> {
                StaticSigner::default().sign("", "", "")
            }
            fn new_search_id(&self) -> notescout_shared::Result<String> {
                Err(notescout_shared::NoteScoutError::signer("bridge is no longer available"))
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(search_page([]))
            .expect(0)
            .mount(&server)
            .await;

        let config = config(&server, 10);
        let sender =
            RequestSender::new(Arc::new(NoSearchId), "a1=abc", SenderOptions::from(&config)).unwrap();
        let mut results = ResultSet::new(config.target_count);
        let outcome = SearchPaginator::new(&sender, &config)
            .run(&mut results, &SilentProgress)
            .await;

        assert_eq!(outcome.state, SearchState::Failed);
        assert_eq!(outcome.pages_requested, 0);
    }
}
