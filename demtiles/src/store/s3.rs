//! Anonymous HTTPS access to the public GLO-30 bucket.
//!
//! The bucket allows unsigned requests, so plain HTTP HEAD and GET against
//! the virtual-hosted endpoint are all that is needed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::debug;

use super::{ObjectStream, StoreConnector, StoreError, StoreResult, TileStore};

/// Virtual-hosted endpoint of the public Copernicus DEM GLO-30 bucket.
pub const DEFAULT_BUCKET_ENDPOINT: &str = "https://copernicus-dem-30m.s3.amazonaws.com";

/// Default timeout for a whole request in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default timeout for establishing a connection in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the bucket.
///
/// The endpoint is fixed configuration; it is only overridden
/// programmatically, e.g. to point at a mirror.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Base URL of the bucket, without a trailing slash.
    pub endpoint: String,

    /// Timeout for a whole request, body included.
    pub timeout: Duration,

    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_BUCKET_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: format!("demtiles/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl S3Config {
    /// Set the bucket endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// URL of an object in the bucket.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, key)
    }
}

impl StoreConnector for S3Config {
    fn connect(&self) -> StoreResult<Arc<dyn TileStore>> {
        Ok(Arc::new(S3TileStore::new(self.clone())?))
    }
}

/// Blocking HTTP client for the bucket.
#[derive(Debug)]
pub struct S3TileStore {
    client: Client,
    config: S3Config,
}

impl S3TileStore {
    /// Create a store client.
    pub fn new(config: S3Config) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    fn request_error(&self, key: &str, error: reqwest::Error) -> StoreError {
        if error.is_timeout() {
            StoreError::Timeout {
                key: key.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            }
        } else {
            StoreError::Request {
                key: key.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

/// Map a response status to a store error, passing successes through.
fn check_status(key: &str, response: Response) -> StoreResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        // The bucket denies listing, so a missing key answers 403 rather than 404.
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Err(StoreError::NotFound {
            key: key.to_string(),
        }),
        status => Err(StoreError::Status {
            key: key.to_string(),
            status: status.as_u16(),
        }),
    }
}

/// Read `Content-Length` from the headers.
///
/// `Response::content_length` reports the body size hint, which is zero for
/// HEAD responses, so the header is parsed directly.
fn header_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

impl TileStore for S3TileStore {
    fn object_size(&self, key: &str) -> StoreResult<u64> {
        let url = self.config.object_url(key);
        debug!(url = %url, "HEAD");

        let response = self
            .client
            .head(&url)
            .send()
            .map_err(|e| self.request_error(key, e))?;
        let response = check_status(key, response)?;

        header_content_length(&response).ok_or_else(|| StoreError::MissingLength {
            key: key.to_string(),
        })
    }

    fn open_object(&self, key: &str) -> StoreResult<ObjectStream> {
        let url = self.config.object_url(key);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.request_error(key, e))?;
        let response = check_status(key, response)?;

        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = S3Config::default();
        assert_eq!(config.endpoint, DEFAULT_BUCKET_ENDPOINT);
        assert_eq!(config.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.connect_timeout.as_secs(), DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(config.user_agent.starts_with("demtiles/"));
    }

    #[test]
    fn test_object_url() {
        let config = S3Config::default();
        assert_eq!(
            config.object_url("A/A.tif"),
            "https://copernicus-dem-30m.s3.amazonaws.com/A/A.tif"
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let config = S3Config::default().with_endpoint("http://127.0.0.1:9000/mirror/");
        assert_eq!(
            config.object_url("k.tif"),
            "http://127.0.0.1:9000/mirror/k.tif"
        );
    }

    #[test]
    fn test_builder_pattern() {
        let config = S3Config::default()
            .with_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(5));

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_store_new() {
        let store = S3TileStore::new(S3Config::default()).unwrap();
        assert_eq!(store.config().endpoint, DEFAULT_BUCKET_ENDPOINT);
    }

    #[test]
    fn test_connector_builds_store() {
        let config = S3Config::default();
        assert!(config.connect().is_ok());
    }
}
