use std::path::Path;

use chrono::Utc;
use futures_util::StreamExt;
use mediasync_content::ResolvedAsset;
use mediasync_fs::{AtomicWriteOptions, atomic_write};
use mediasync_manifest::CacheEntry;

use crate::data::{DownloadOutcome, FetchOptions};
use crate::error::FetchError;
use crate::http::{HttpClient, HttpResponse};

/// What a single attempt produced.
enum Attempt {
    NotModified,
    Body(Body),
}

struct Body {
    bytes:         Vec<u8>,
    etag:          Option<String>,
    last_modified: Option<String>,
}

/// Downloads one asset at a time, with conditional requests and retries.
pub struct Fetcher<C: HttpClient> {
    client:  C,
    options: FetchOptions,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: FetchOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FetchOptions { &self.options }

    pub fn client(&self) -> &C { &self.client }

    /// Bring `asset` up to date on disk.
    ///
    /// `cached` is the manifest entry from a previous build, if any. It is only
    /// used for validators when the local file still exists.
    pub async fn fetch(&self, asset: &ResolvedAsset, cached: Option<&CacheEntry>) -> DownloadOutcome {
        let conditional = match cached {
            Some(entry) if self.options.skip_unchanged && entry.has_validators() => {
                is_file(&asset.local_path).await.then_some(entry)
            }
            _ => None,
        };
        let headers = conditional.map(conditional_headers).unwrap_or_default();

        let mut attempt = 1;
        loop {
            let error = match self.attempt(asset, &headers).await {
                Ok(Attempt::NotModified) => match conditional {
                    Some(entry) => {
                        tracing::debug!(url = %asset.download_url, "Media unchanged");
                        return DownloadOutcome::Skipped(entry.revalidated(Utc::now()));
                    }
                    None => FetchError::Status {
                        url:         asset.download_url.clone(),
                        status:      304,
                        retry_after: None,
                    },
                },
                Ok(Attempt::Body(body)) => match self.store(asset, body).await {
                    Ok(entry) => {
                        tracing::debug!(url = %asset.download_url, bytes = entry.size, "Media downloaded");
                        return DownloadOutcome::Downloaded(entry);
                    }
                    Err(error) => error,
                },
                Err(error) => error,
            };

            if error.is_retriable() && attempt <= self.options.max_retries {
                let delay = self.options.retry_delay(attempt, &error);
                tracing::warn!(
                    url = %asset.download_url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "Media download attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            tracing::error!(url = %asset.download_url, attempts = attempt, %error, "Media download failed");
            return DownloadOutcome::Failed {
                error,
                attempts: attempt,
            };
        }
    }

    /// One request, bounded by the per-attempt timeout.
    async fn attempt(&self, asset: &ResolvedAsset, headers: &[(String, String)]) -> Result<Attempt, FetchError> {
        let url = asset.download_url.as_str();
        let request = async {
            let response = self
                .client
                .get(url, headers)
                .await
                .map_err(|source| FetchError::Network {
                    url: url.to_owned(),
                    source,
                })?;

            match response.status {
                304 => Ok(Attempt::NotModified),
                200..=299 => read_body(url, response).await.map(Attempt::Body),
                status => Err(FetchError::Status {
                    url: url.to_owned(),
                    status,
                    retry_after: response.retry_after,
                }),
            }
        };

        match tokio::time::timeout(self.options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url:   url.to_owned(),
                after: self.options.timeout,
            }),
        }
    }

    async fn store(&self, asset: &ResolvedAsset, body: Body) -> Result<CacheEntry, FetchError> {
        let Body {
            bytes,
            etag,
            last_modified,
        } = body;
        let size = bytes.len() as u64;
        let path = asset.local_path.clone();

        tokio::task::spawn_blocking(move || atomic_write(&path, &bytes, AtomicWriteOptions::new()))
            .await
            .map_err(|e| FetchError::Task {
                url:     asset.download_url.clone(),
                message: e.to_string(),
            })?
            .map_err(|source| FetchError::Store {
                url: asset.download_url.clone(),
                source,
            })?;

        Ok(CacheEntry::downloaded(etag, last_modified, size, Utc::now()))
    }
}

async fn read_body(url: &str, response: HttpResponse) -> Result<Body, FetchError> {
    let HttpResponse {
        etag,
        last_modified,
        mut body,
        ..
    } = response;

    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|source| FetchError::Network {
            url: url.to_owned(),
            source,
        })?;
        bytes.extend_from_slice(&chunk);
    }

    Ok(Body {
        bytes,
        etag,
        last_modified,
    })
}

fn conditional_headers(entry: &CacheEntry) -> Vec<(String, String)> {
    let mut headers = Vec::with_capacity(2);
    if let Some(etag) = &entry.etag {
        headers.push(("If-None-Match".to_owned(), etag.clone()));
    }
    if let Some(last_modified) = &entry.last_modified {
        headers.push(("If-Modified-Since".to_owned(), last_modified.clone()));
    }
    headers
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
