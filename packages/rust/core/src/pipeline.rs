//! End-to-end `collect` pipeline: keyword → search pages → note details → records.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use notescout_client::{RequestSender, SenderOptions, search_referer};
use notescout_shared::{CollectConfig, Record, Result, RunId};
use notescout_signer::Signer;

use crate::collector::ResultSet;
use crate::search::{SearchPaginator, SearchState};

/// Result of one `collect` run. Records are kept whatever the final state.
#[derive(Debug)]
pub struct CollectSummary {
    /// Run identifier for log correlation.
    pub run_id: RunId,
    /// Terminal paginator state.
    pub state: SearchState,
    /// Collected records, in arrival order.
    pub records: Vec<Record>,
    /// Search pages requested.
    pub pages: u32,
    /// Detail fetches attempted.
    pub detail_attempts: usize,
    /// Search items dropped for a malformed note reference.
    pub malformed: usize,
    /// Search items dropped as already seen.
    pub duplicates: usize,
    /// Detail fetches that produced no record.
    pub skipped: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called after each search page is received.
    fn page_fetched(&self, page: u32, items: usize);
    /// Called when a record is added to the result set.
    fn record_collected(&self, record: &Record, collected: usize, target: usize);
    /// Called when a note's detail yields no record.
    fn note_skipped(&self, note_id: &str);
    /// Called when the pipeline completes.
    fn done(&self, summary: &CollectSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn page_fetched(&self, _page: u32, _items: usize) {}
    fn record_collected(&self, _record: &Record, _collected: usize, _target: usize) {}
    fn note_skipped(&self, _note_id: &str) {}
    fn done(&self, _summary: &CollectSummary) {}
}

/// Run a full collection for `config.keyword`.
///
/// Only setup problems (invalid config, unusable cookie) are errors. Search
/// failure, exhaustion and reaching the target all end the run normally with
/// whatever was collected.
#[instrument(skip_all, fields(keyword = %config.keyword, target = config.target_count))]
pub async fn collect(
    config: &CollectConfig,
    signer: Arc<dyn Signer>,
    cookie: &str,
    progress: &dyn ProgressReporter,
) -> Result<CollectSummary> {
    config.validate()?;

    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, sort = %config.sort, "starting collect pipeline");

    let mut sender = RequestSender::new(signer, cookie, SenderOptions::from(config))?;
    sender.set_referer(&search_referer(&config.web_base, &config.keyword)?)?;

    let mut results = ResultSet::new(config.target_count);
    let outcome = SearchPaginator::new(&sender, config)
        .run(&mut results, progress)
        .await;

    let summary = CollectSummary {
        run_id,
        state: outcome.state,
        records: results.into_records(),
        pages: outcome.pages_requested,
        detail_attempts: outcome.detail_attempts,
        malformed: outcome.malformed,
        duplicates: outcome.duplicates,
        skipped: outcome.skipped,
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %summary.run_id,
        state = %summary.state,
        records = summary.records.len(),
        pages = summary.pages,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "collect pipeline complete"
    );
    progress.done(&summary);

    Ok(summary)
}
