//! The build-time pipeline: scan content, download media, rewrite references.

use std::fmt;

use mediasync_content::{RewriteReport, rewrite, scan};
use mediasync_fetch::{BatchFetcher, BatchReport, FailedAsset, Fetcher, HttpClient};
use mediasync_manifest::ManifestStore;

use crate::config::Settings;
use crate::error::Result;
use crate::policy::ErrorPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    ResolvingCache,
    Downloading,
    Rewriting,
    Aborted,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::ResolvingCache => "resolving-cache",
            Self::Downloading => "downloading",
            Self::Rewriting => "rewriting",
            Self::Aborted => "aborted",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Counters for a run that reached the download phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub assets:         usize,
    pub downloaded:     usize,
    pub skipped:        usize,
    pub failed:         usize,
    pub failures:       Vec<FailedAsset>,
    /// Whether the manifest file changed.
    pub manifest_saved: bool,
    /// `None` when content was not rewritten.
    pub rewrite:        Option<RewriteReport>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Syncing is switched off or no origin is configured.
    Disabled,
    /// No content, or content without remote media.
    NothingToDo,
    /// Some downloads failed; content was left untouched.
    Aborted(SyncSummary),
    Completed(SyncSummary),
    /// The run failed and the lenient policy swallowed the error.
    Degraded { error: String },
}

/// Ties scanning, fetching, the manifest and rewriting together.
pub struct MediaSync<C: HttpClient, S: ManifestStore> {
    settings: Settings,
    batch:    BatchFetcher<C>,
    store:    S,
    phase:    Phase,
}

impl<C: HttpClient + 'static, S: ManifestStore> MediaSync<C, S> {
    pub fn new(settings: Settings, client: C, store: S) -> Self {
        let fetcher = Fetcher::new(client).with_options(settings.fetch.clone());
        let batch = BatchFetcher::new(fetcher, settings.concurrency);
        Self {
            settings,
            batch,
            store,
            phase: Phase::Idle,
        }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn client(&self) -> &C { self.batch.fetcher().client() }

    pub fn store(&self) -> &S { &self.store }

    /// Current phase; [`Phase::Done`] once a run has returned.
    pub fn phase(&self) -> Phase { self.phase }

    /// Run once. Failed downloads are an outcome, not an error; `Err` means
    /// the run could not proceed at all.
    pub async fn run(&mut self) -> Result<SyncOutcome> {
        self.enter(Phase::Idle);
        let outcome = self.execute().await;
        self.enter(Phase::Done);
        outcome
    }

    /// [`run`](Self::run), with failures absorbed under [`ErrorPolicy::Lenient`].
    pub async fn run_with_policy(&mut self, policy: ErrorPolicy) -> Result<SyncOutcome> {
        match self.run().await {
            Err(error) if policy == ErrorPolicy::Lenient => {
                tracing::warn!(%error, "Media sync failed; continuing with remote URLs");
                Ok(SyncOutcome::Degraded {
                    error: error.to_string(),
                })
            }
            result => result,
        }
    }

    async fn execute(&mut self) -> Result<SyncOutcome> {
        let Some(resolver) = self.settings.resolver() else {
            tracing::info!("Media sync disabled");
            return Ok(SyncOutcome::Disabled);
        };

        self.enter(Phase::Scanning);
        let content_dir = &self.settings.content_dir;
        if !content_dir.is_dir() {
            tracing::info!(path = %content_dir.display(), "No content directory; nothing to sync");
            return Ok(SyncOutcome::NothingToDo);
        }
        let mut report = scan(content_dir, &resolver)?;
        if !report.references_media() {
            tracing::info!(files = report.files_seen, "No remote media referenced; nothing to sync");
            return Ok(SyncOutcome::NothingToDo);
        }
        tracing::info!(
            assets = report.assets.len(),
            documents = report.matching_documents,
            "Found remote media"
        );

        self.enter(Phase::ResolvingCache);
        let entries = self.store.load().clone();

        self.enter(Phase::Downloading);
        let assets: Vec<_> = std::mem::take(&mut report.assets).into_values().collect();
        let BatchReport {
            downloaded,
            skipped,
            failed,
            upserts,
            removals,
            failures,
        } = self.batch.run(assets, &entries).await?;

        let mut summary = SyncSummary {
            assets: downloaded + skipped + failed,
            downloaded,
            skipped,
            failed,
            failures,
            manifest_saved: self.store.save(upserts, &removals)?,
            rewrite: None,
        };

        if summary.failed > 0 {
            self.enter(Phase::Aborted);
            tracing::warn!(
                failed = summary.failed,
                assets = summary.assets,
                "Media downloads failed; content left untouched"
            );
            return Ok(SyncOutcome::Aborted(summary));
        }

        if self.settings.rewrite_content {
            self.enter(Phase::Rewriting);
            summary.rewrite = Some(rewrite(&mut report.documents, &resolver)?);
        }

        tracing::info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            rewritten = summary.rewrite.map_or(0, |r| r.documents_written),
            "Media sync complete"
        );
        Ok(SyncOutcome::Completed(summary))
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = %self.phase, to = %phase, "Media sync phase");
        self.phase = phase;
    }
}
