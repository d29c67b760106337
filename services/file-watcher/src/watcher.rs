//! Poll loop: scan the bucket, drop files already ingested, and submit an
//! ingest job for every remaining file the gateway understands.
//!
//! Files are handled one at a time in listing order. A file is recorded only
//! after the gateway accepted it, so rejected or unreachable submissions are
//! naturally retried on the next cycle. Unrecognized files are never
//! recorded and are re-classified every cycle.

use crate::classifier::classify;
use crate::config::WatcherConfig;
use crate::gateway::{JobSubmitter, SubmissionResult};
use crate::ingested_store::{IngestedStore, PersistenceError};
use crate::payload::JobPayloadBuilder;
use crate::scanner::BucketLister;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Errors that stop the watcher
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Ingested set is unusable: {0}")]
    Persistence(#[from] PersistenceError),
}

/// What happened during one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Listing failed; nothing else ran
    pub scan_failed: bool,
    pub listed: usize,
    pub already_ingested: usize,
    pub unrecognized: usize,
    /// Keys that cannot be stored line-delimited
    pub unrepresentable: usize,
    pub submitted: usize,
    pub ingested: usize,
    pub rejected: usize,
    pub transport_errors: usize,
    /// Shutdown was requested before every file was handled
    pub interrupted: bool,
}

/// Totals across all cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub cycles: u64,
    pub scan_failures: u64,
    pub submitted: u64,
    pub ingested: u64,
    pub rejected: u64,
    pub transport_errors: u64,
}

impl WatcherStats {
    fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.scan_failed {
            self.scan_failures += 1;
        }
        self.submitted += report.submitted as u64;
        self.ingested += report.ingested as u64;
        self.rejected += report.rejected as u64;
        self.transport_errors += report.transport_errors as u64;
    }
}

/// Watches a bucket and submits ingest jobs for new files
pub struct FileWatcher<L, S> {
    lister: L,
    submitter: S,
    payload_builder: JobPayloadBuilder,
    store: IngestedStore,
    poll_interval: Duration,
    stats: WatcherStats,
}

impl<L, S> FileWatcher<L, S>
where
    L: BucketLister,
    S: JobSubmitter,
{
    pub fn new(config: &WatcherConfig, lister: L, submitter: S, store: IngestedStore) -> Self {
        Self {
            lister,
            submitter,
            payload_builder: JobPayloadBuilder::new(config),
            store,
            poll_interval: config.poll_interval(),
            stats: WatcherStats::default(),
        }
    }

    /// Poll until shutdown is signalled. Cycles never overlap; shutdown is
    /// observed between cycles and between files, so an in-flight
    /// submission always completes.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<WatcherStats, WatcherError> {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            known_files = self.store.len(),
            "Listening for new files"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle(&shutdown).await?;
            if report.interrupted {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can stop us any more
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Watcher stopped");
        Ok(self.stats.clone())
    }

    /// Run a single scan / filter / submit cycle
    pub async fn poll_once(&mut self) -> Result<CycleReport, WatcherError> {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle(&rx).await
    }

    async fn run_cycle(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, WatcherError> {
        let span = info_span!("poll_cycle", cycle_id = %Uuid::new_v4());
        let report = self.scan_and_submit(shutdown).instrument(span).await?;
        self.stats.absorb(&report);
        Ok(report)
    }

    async fn scan_and_submit(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, WatcherError> {
        let mut report = CycleReport::default();
        metrics::counter!("watcher.cycles").increment(1);

        let candidates = match self.lister.list_current_files().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Bucket scan failed, skipping cycle");
                metrics::counter!("watcher.scan.failures").increment(1);
                report.scan_failed = true;
                return Ok(report);
            }
        };
        report.listed = candidates.len();

        for candidate in candidates {
            if *shutdown.borrow() {
                info!("Shutdown requested, leaving cycle early");
                report.interrupted = true;
                break;
            }

            let file_name = candidate.key;
            if self.store.contains(&file_name) {
                report.already_ingested += 1;
                continue;
            }

            let data_type = classify(&file_name);
            let Some(request) = self.payload_builder.build(&file_name, data_type) else {
                debug!(file_name = %file_name, "Skipping file with unrecognized type");
                report.unrecognized += 1;
                continue;
            };

            if !IngestedStore::is_recordable(&file_name) {
                warn!(file_name = ?file_name, "Skipping file whose name cannot be recorded");
                report.unrepresentable += 1;
                continue;
            }

            report.submitted += 1;
            metrics::counter!("watcher.files.submitted").increment(1);

            let started = Instant::now();
            let result = self.submitter.submit(&request).await;
            metrics::histogram!("watcher.submit.duration_seconds")
                .record(started.elapsed().as_secs_f64());

            match result {
                SubmissionResult::Success { job_id } => {
                    self.store.record(&file_name)?;
                    report.ingested += 1;
                    metrics::counter!("watcher.files.ingested").increment(1);
                    info!(
                        file_name = %file_name,
                        data_type = %data_type,
                        job_id = job_id.as_deref().unwrap_or("-"),
                        size_bytes = candidate.size_bytes,
                        last_modified = ?candidate.last_modified,
                        "Successful ingest"
                    );
                }
                SubmissionResult::Rejected { status, body } => {
                    report.rejected += 1;
                    metrics::counter!("watcher.files.rejected").increment(1);
                    warn!(
                        file_name = %file_name,
                        status = status,
                        details = %body,
                        "Ingest rejected by gateway, will retry next cycle"
                    );
                }
                SubmissionResult::TransportError(message) => {
                    report.transport_errors += 1;
                    metrics::counter!("watcher.files.transport_errors").increment(1);
                    warn!(
                        file_name = %file_name,
                        error = %message,
                        "Ingest request failed, will retry next cycle"
                    );
                }
            }
        }

        debug!(
            listed = report.listed,
            already_ingested = report.already_ingested,
            unrecognized = report.unrecognized,
            submitted = report.submitted,
            ingested = report.ingested,
            "Poll cycle complete"
        );

        Ok(report)
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    pub fn store(&self) -> &IngestedStore {
        &self.store
    }
}
