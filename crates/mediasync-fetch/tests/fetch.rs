//! Fetcher and batch behaviour against a scripted HTTP client.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use mediasync_content::{MediaResolver, ResolvedAsset};
use mediasync_fetch::{
    BatchFetcher, DownloadOutcome, FetchError, FetchOptions, Fetcher, HttpClient, HttpResponse, NetworkError,
};
use mediasync_manifest::{CacheEntry, Entries};
use tempfile::TempDir;

#[derive(Clone)]
enum Step {
    Respond {
        status: u16,
        body:   &'static [u8],
        etag:   Option<&'static str>,
    },
    Fail(NetworkError),
    Hang,
}

fn ok(body: &'static [u8], etag: &'static str) -> Step {
    Step::Respond {
        status: 200,
        body,
        etag: Some(etag),
    }
}

fn status(status: u16) -> Step {
    Step::Respond {
        status,
        body: b"",
        etag: None,
    }
}

/// Replays a per-URL script; unscripted URLs answer `200 "default"`.
#[derive(Default)]
struct ScriptedClient {
    scripts:       Mutex<HashMap<String, VecDeque<Step>>>,
    calls:         Mutex<Vec<(String, Vec<(String, String)>)>>,
    latency:       Duration,
    in_flight:     AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    fn new() -> Self { Self::default() }

    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn script(self, url: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(url.to_owned(), steps.into());
        self
    }

    fn calls_for(&self, url: &str) -> Vec<Vec<(String, String)>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
            .collect()
    }
}

impl HttpClient for ScriptedClient {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, NetworkError> {
        self.calls.lock().unwrap().push((url.to_owned(), headers.to_vec()));
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Respond {
                status: 200,
                body:   b"default",
                etag:   None,
            });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            Step::Respond { status, body, etag } => Ok(HttpResponse {
                status,
                etag: etag.map(str::to_owned),
                last_modified: None,
                retry_after: None,
                body: Box::pin(futures_util::stream::once(async move { Ok(Bytes::from_static(body)) })),
            }),
            Step::Fail(error) => Err(error),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(NetworkError::Reset("hung request finished".into()))
            }
        }
    }
}

fn resolver(dir: &TempDir) -> MediaResolver {
    MediaResolver::new("https://cms.example/media/", "media", dir.path().join("public"))
}

fn asset(dir: &TempDir, path: &str) -> ResolvedAsset {
    resolver(dir)
        .resolve(&format!("https://cms.example/media/{path}"))
        .unwrap()
}

fn fast_options() -> FetchOptions {
    FetchOptions::default()
        .base_delay(Duration::from_millis(20))
        .timeout(Duration::from_secs(5))
}

fn cached(etag: &str) -> CacheEntry { CacheEntry::downloaded(Some(etag.into()), None, 3, Utc::now()) }

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn read(path: &Path) -> Vec<u8> { std::fs::read(path).unwrap() }

#[tokio::test]
async fn test_download_writes_file_and_captures_validators() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "pages/home/hero.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![ok(b"jpeg-bytes", "\"v1\"")]);
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, None).await;

    let DownloadOutcome::Downloaded(entry) = outcome else {
        panic!("expected download, got {outcome:?}");
    };
    assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
    assert_eq!(entry.size, 10);
    assert_eq!(read(&asset.local_path), b"jpeg-bytes");
}

#[tokio::test]
async fn test_server_errors_are_retried_with_growing_delay() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "a.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![status(503), status(503), ok(b"abc", "\"e\"")]);
    let fetcher = Fetcher::new(client).with_options(fast_options().max_retries(3));

    let start = Instant::now();
    let outcome = fetcher.fetch(&asset, None).await;
    let elapsed = start.elapsed();

    assert!(matches!(outcome, DownloadOutcome::Downloaded(_)), "{outcome:?}");
    assert_eq!(fetcher.client().calls_for(&asset.download_url).len(), 3);
    // Two sleeps: 20ms after attempt 1, 40ms after attempt 2.
    assert!(elapsed >= Duration::from_millis(60), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(60 + 2_000), "{elapsed:?}");
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "gone.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![status(404)]);
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, None).await;

    match outcome {
        DownloadOutcome::Failed {
            error: FetchError::Status { status: 404, .. },
            attempts: 1,
        } => {}
        other => panic!("expected terminal 404, got {other:?}"),
    }
    assert!(!asset.local_path.exists());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "flaky.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![status(500), status(502), status(503), status(504)]);
    let fetcher = Fetcher::new(client).with_options(fast_options().max_retries(2));

    let outcome = fetcher.fetch(&asset, None).await;

    assert!(matches!(outcome, DownloadOutcome::Failed { attempts: 3, .. }), "{outcome:?}");
}

#[tokio::test]
async fn test_throttling_is_retried() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "busy.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![status(429), ok(b"ok", "\"t\"")]);
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, None).await;

    assert!(matches!(outcome, DownloadOutcome::Downloaded(_)), "{outcome:?}");
}

#[tokio::test]
async fn test_transient_network_errors_are_retried() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "reset.jpg");
    let client = ScriptedClient::new().script(
        &asset.download_url,
        vec![
            Step::Fail(NetworkError::Reset("connection reset by peer".into())),
            Step::Fail(NetworkError::Connect("connection refused".into())),
            ok(b"ok", "\"r\""),
        ],
    );
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, None).await;

    assert!(matches!(outcome, DownloadOutcome::Downloaded(_)), "{outcome:?}");
}

#[tokio::test]
async fn test_invalid_request_is_terminal() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "bad.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![Step::Fail(NetworkError::Invalid("bad uri".into()))]);
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, None).await;

    assert!(matches!(outcome, DownloadOutcome::Failed { attempts: 1, .. }), "{outcome:?}");
}

#[tokio::test]
async fn test_timeout_aborts_hung_attempt() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "slow.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![Step::Hang, ok(b"late", "\"s\"")]);
    let fetcher = Fetcher::new(client).with_options(fast_options().timeout(Duration::from_millis(50)));

    let start = Instant::now();
    let outcome = fetcher.fetch(&asset, None).await;

    assert!(matches!(outcome, DownloadOutcome::Downloaded(_)), "{outcome:?}");
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_timeouts_exhaust_into_failure() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "never.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![Step::Hang, Step::Hang]);
    let fetcher = Fetcher::new(client).with_options(fast_options().max_retries(1).timeout(Duration::from_millis(30)));

    let outcome = fetcher.fetch(&asset, None).await;

    match outcome {
        DownloadOutcome::Failed {
            error: FetchError::Timeout { .. },
            attempts: 2,
        } => {}
        other => panic!("expected timeout failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_conditional_request_skips_unchanged() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "same.jpg");
    std::fs::create_dir_all(asset.local_path.parent().unwrap()).unwrap();
    std::fs::write(&asset.local_path, b"old").unwrap();

    let client = ScriptedClient::new().script(&asset.download_url, vec![status(304)]);
    let fetcher = Fetcher::new(client).with_options(fast_options());
    let entry = cached("\"abc\"");

    let outcome = fetcher.fetch(&asset, Some(&entry)).await;

    let DownloadOutcome::Skipped(revalidated) = outcome else {
        panic!("expected skip, got {outcome:?}");
    };
    assert!(revalidated.same_content(&entry));
    assert!(revalidated.checked_at >= entry.checked_at);
    assert_eq!(read(&asset.local_path), b"old");
}

#[tokio::test]
async fn test_conditional_request_sends_validators() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "same.jpg");
    std::fs::create_dir_all(asset.local_path.parent().unwrap()).unwrap();
    std::fs::write(&asset.local_path, b"old").unwrap();

    let client = ScriptedClient::new().script(&asset.download_url, vec![status(304)]);
    let fetcher = Fetcher::new(client).with_options(fast_options());
    let entry = CacheEntry {
        last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".into()),
        ..cached("\"abc\"")
    };

    fetcher.fetch(&asset, Some(&entry)).await;

    let calls = fetcher.client().calls_for(&asset.download_url);
    assert_eq!(calls.len(), 1);
    assert_eq!(header(&calls[0], "If-None-Match"), Some("\"abc\""));
    assert_eq!(header(&calls[0], "If-Modified-Since"), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
}

#[tokio::test]
async fn test_missing_local_file_forces_full_download() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "deleted.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![ok(b"fresh", "\"new\"")]);
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, Some(&cached("\"old\""))).await;

    assert!(matches!(outcome, DownloadOutcome::Downloaded(_)), "{outcome:?}");
    let calls = fetcher.client().calls_for(&asset.download_url);
    assert!(header(&calls[0], "If-None-Match").is_none());
    assert_eq!(read(&asset.local_path), b"fresh");
}

#[tokio::test]
async fn test_skip_unchanged_disabled_sends_no_validators() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "always.jpg");
    std::fs::create_dir_all(asset.local_path.parent().unwrap()).unwrap();
    std::fs::write(&asset.local_path, b"old").unwrap();

    let client = ScriptedClient::new().script(&asset.download_url, vec![ok(b"new", "\"n\"")]);
    let fetcher = Fetcher::new(client).with_options(fast_options().skip_unchanged(false));

    let outcome = fetcher.fetch(&asset, Some(&cached("\"abc\""))).await;

    assert!(matches!(outcome, DownloadOutcome::Downloaded(_)), "{outcome:?}");
    assert!(fetcher.client().calls_for(&asset.download_url)[0].is_empty());
    assert_eq!(read(&asset.local_path), b"new");
}

#[tokio::test]
async fn test_unsolicited_not_modified_fails() {
    let dir = TempDir::new().unwrap();
    let asset = asset(&dir, "odd.jpg");
    let client = ScriptedClient::new().script(&asset.download_url, vec![status(304)]);
    let fetcher = Fetcher::new(client).with_options(fast_options());

    let outcome = fetcher.fetch(&asset, None).await;

    assert!(matches!(outcome, DownloadOutcome::Failed { attempts: 1, .. }), "{outcome:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_respects_concurrency_bound() {
    let dir = TempDir::new().unwrap();
    let assets: Vec<_> = (0..10).map(|i| asset(&dir, &format!("img/{i}.jpg"))).collect();
    let latency = Duration::from_millis(100);
    let fetcher = Fetcher::new(ScriptedClient::with_latency(latency)).with_options(fast_options());
    let batch = BatchFetcher::new(fetcher, 2);

    let start = Instant::now();
    let report = batch.run(assets, &Entries::new()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.downloaded, 10);
    assert_eq!(batch.workers_for(10), 2);
    assert_eq!(batch.fetcher().client().max_in_flight.load(Ordering::SeqCst), 2);
    // ceil(10 / 2) * latency, far from both 1x and 10x.
    assert!(elapsed >= latency * 5, "{elapsed:?}");
    assert!(elapsed < latency * 9, "{elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_processes_each_asset_once() {
    let dir = TempDir::new().unwrap();
    let assets: Vec<_> = (0..25).map(|i| asset(&dir, &format!("many/{i}.png"))).collect();
    let urls: Vec<_> = assets.iter().map(|a| a.download_url.clone()).collect();
    let batch = BatchFetcher::new(Fetcher::new(ScriptedClient::new()).with_options(fast_options()), 4);

    let report = batch.run(assets, &Entries::new()).await.unwrap();

    assert_eq!(report.total(), 25);
    assert_eq!(report.upserts.len(), 25);
    for url in urls {
        assert_eq!(batch.fetcher().client().calls_for(&url).len(), 1, "{url}");
    }
}

#[tokio::test]
async fn test_batch_collects_failures_for_removal() {
    let dir = TempDir::new().unwrap();
    let good = asset(&dir, "good.jpg");
    let bad = asset(&dir, "bad.jpg");
    let same = asset(&dir, "same.jpg");
    std::fs::create_dir_all(same.local_path.parent().unwrap()).unwrap();
    std::fs::write(&same.local_path, b"cached").unwrap();

    let client = ScriptedClient::new()
        .script(&good.download_url, vec![ok(b"g", "\"g\"")])
        .script(&bad.download_url, vec![status(403)])
        .script(&same.download_url, vec![status(304)]);
    let entries: Entries = [
        (bad.cache_key.clone(), cached("\"stale\"")),
        (same.cache_key.clone(), cached("\"same\"")),
    ]
    .into_iter()
    .collect();
    let batch = BatchFetcher::new(Fetcher::new(client).with_options(fast_options()), 8);

    let report = batch.run(vec![good.clone(), bad.clone(), same.clone()], &entries).await.unwrap();

    assert_eq!((report.downloaded, report.skipped, report.failed), (1, 1, 1));
    assert!(report.removals.contains(&bad.cache_key));
    assert!(report.upserts.contains_key(&good.cache_key));
    assert!(report.upserts.contains_key(&same.cache_key));
    assert!(!report.upserts.contains_key(&bad.cache_key));
    assert_eq!(report.failures[0].url, bad.download_url);
}

#[tokio::test]
async fn test_batch_with_no_assets() {
    let batch = BatchFetcher::new(Fetcher::new(ScriptedClient::new()), 0);

    let report = batch.run(Vec::new(), &Entries::new()).await.unwrap();

    assert_eq!(batch.concurrency(), 1);
    assert_eq!(report.total(), 0);
    assert!(report.is_clean());
}
