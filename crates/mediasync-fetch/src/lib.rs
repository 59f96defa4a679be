//! Media downloading with conditional requests, retry and bounded concurrency.
//!
//! # Architecture
//!
//! - [`policy`] - Pure retry classification and backoff arithmetic
//! - [`data`] - Options and per-asset outcomes
//! - [`http`] - The `HttpClient` seam and its reqwest implementation
//! - [`fetcher`] - One asset: conditional request, timeout, retry loop, placement
//! - [`batch`] - Many assets through a fixed pool of workers
//!
//! Expected failures are values: a download that cannot be completed yields
//! [`DownloadOutcome::Failed`], never an `Err` or a panic.

pub mod batch;
pub mod data;
mod error;
pub mod fetcher;
pub mod http;
pub mod policy;

pub use batch::{BatchFetcher, BatchReport, FailedAsset};
pub use data::{DownloadOutcome, FetchOptions};
pub use error::{Error, FetchError, NetworkError, Result};
pub use fetcher::Fetcher;
pub use http::{BoxStream, HttpClient, HttpResponse};
pub use policy::{Backoff, is_retriable_status};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
