//! Bounded-concurrency driving of many assets.
//!
//! A fixed number of workers share one atomic cursor into the job list. Each
//! worker claims the next index until the list is exhausted, so every asset
//! is fetched exactly once and a slow asset only ever occupies one worker.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mediasync_content::ResolvedAsset;
use mediasync_manifest::{CacheEntry, Entries};
use tokio::task::JoinSet;

use crate::data::DownloadOutcome;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::http::HttpClient;

/// An asset that could not be localized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedAsset {
    pub cache_key: String,
    pub url:       String,
    pub attempts:  u32,
    pub error:     String,
}

/// Aggregated outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub downloaded: usize,
    pub skipped:    usize,
    pub failed:     usize,
    /// Manifest entries to write, one per non-failed asset.
    pub upserts:    Entries,
    /// Manifest keys to drop, one per failed asset.
    pub removals:   BTreeSet<String>,
    pub failures:   Vec<FailedAsset>,
}

impl BatchReport {
    pub fn total(&self) -> usize { self.downloaded + self.skipped + self.failed }

    pub fn is_clean(&self) -> bool { self.failed == 0 }

    fn record(&mut self, asset: &ResolvedAsset, outcome: DownloadOutcome) {
        let key = asset.cache_key.clone();
        match outcome {
            DownloadOutcome::Downloaded(entry) => {
                self.downloaded += 1;
                self.upserts.insert(key, entry);
            }
            DownloadOutcome::Skipped(entry) => {
                self.skipped += 1;
                self.upserts.insert(key, entry);
            }
            DownloadOutcome::Failed { error, attempts } => {
                self.failed += 1;
                self.failures.push(FailedAsset {
                    cache_key: key.clone(),
                    url: asset.download_url.clone(),
                    attempts,
                    error: error.to_string(),
                });
                self.removals.insert(key);
            }
        }
    }
}

/// Drives assets through a shared [`Fetcher`] with at most `concurrency`
/// requests in flight.
pub struct BatchFetcher<C: HttpClient> {
    fetcher:     Arc<Fetcher<C>>,
    concurrency: usize,
}

impl<C: HttpClient + 'static> BatchFetcher<C> {
    /// `concurrency` below one is treated as one.
    pub fn new(fetcher: Fetcher<C>, concurrency: usize) -> Self {
        Self {
            fetcher:     Arc::new(fetcher),
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize { self.concurrency }

    pub fn fetcher(&self) -> &Fetcher<C> { &self.fetcher }

    /// Number of workers spawned for `jobs` assets.
    pub fn workers_for(&self, jobs: usize) -> usize { self.concurrency.min(jobs) }

    /// Fetch every asset, consulting `entries` for cached validators.
    ///
    /// Individual download failures are reported in the [`BatchReport`]; an
    /// `Err` means a worker itself died.
    pub async fn run(&self, assets: Vec<ResolvedAsset>, entries: &Entries) -> Result<BatchReport> {
        let jobs: Arc<[(ResolvedAsset, Option<CacheEntry>)]> = assets
            .into_iter()
            .map(|asset| {
                let cached = entries.get(&asset.cache_key).cloned();
                (asset, cached)
            })
            .collect();
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.workers_for(jobs.len());

        tracing::debug!(assets = jobs.len(), workers, "Starting media downloads");

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let fetcher = Arc::clone(&self.fetcher);
            let jobs = Arc::clone(&jobs);
            let cursor = Arc::clone(&cursor);

            set.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some((asset, cached)) = jobs.get(index) else {
                        break;
                    };
                    let outcome = fetcher.fetch(asset, cached.as_ref()).await;
                    done.push((index, outcome));
                }
                tracing::trace!(worker, processed = done.len(), "Download worker drained queue");
                done
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = set.join_next().await {
            let done = joined.map_err(|e| Error::Worker(e.to_string()))?;
            for (index, outcome) in done {
                report.record(&jobs[index].0, outcome);
            }
        }

        Ok(report)
    }
}
