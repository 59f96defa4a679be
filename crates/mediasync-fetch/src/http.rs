use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;

use crate::error::NetworkError;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status, validators and body of one response.
pub struct HttpResponse {
    pub status:        u16,
    pub etag:          Option<String>,
    pub last_modified: Option<String>,
    /// `Retry-After` given in seconds. HTTP-date values are ignored.
    pub retry_after:   Option<Duration>,
    pub body:          BoxStream<'static, Result<Bytes, NetworkError>>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .field("retry_after", &self.retry_after)
            .field("body", &"{ ... }")
            .finish()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// Implementations follow redirects themselves and return every final
/// response, whatever its status; only transport failures are errors.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Scripted clients in tests
pub trait HttpClient: Send + Sync {
    /// Issue a `GET` for `url` with the extra `headers`.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse, NetworkError>> + Send;
}

/// Parse a delta-seconds `Retry-After` value.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use futures_util::TryStreamExt;
    use reqwest::header::{ETAG, HeaderName, LAST_MODIFIED, RETRY_AFTER};

    use super::*;

    /// Production HTTP client implementation using reqwest.
    #[derive(Clone, Debug)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self, NetworkError> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("mediasync/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(map_error)?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
    }

    impl HttpClient for ReqwestClient {
        async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, NetworkError> {
            let mut request = self.client.get(url);
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }

            let response = request.send().await.map_err(map_error)?;
            let header = |name: HeaderName| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            let etag = header(ETAG);
            let last_modified = header(LAST_MODIFIED);
            let retry_after = header(RETRY_AFTER).as_deref().and_then(parse_retry_after);
            let status = response.status().as_u16();

            let body = response.bytes_stream().map_err(map_error);
            Ok(HttpResponse {
                status,
                etag,
                last_modified,
                retry_after,
                body: Box::pin(body),
            })
        }
    }

    fn map_error(e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout
        } else if e.is_connect() {
            NetworkError::Connect(e.to_string())
        } else if e.is_builder() {
            NetworkError::Invalid(e.to_string())
        } else {
            NetworkError::Reset(e.to_string())
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;
