//! Providers Module - External Data Sources
//!
//! HTTP clients for the block explorer, the package registry and the raw
//! source-control host, plus the [`DependencySource`] seam the resolver is
//! written against.

pub mod explorer;
pub mod raw_content;
pub mod registry;

pub use explorer::*;
pub use raw_content::*;
pub use registry::*;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::DependencySpec;
use crate::utils::constants::{
    EXPLORER_BASE_RETRY_MS, EXPLORER_MAX_RETRIES, EXPLORER_MAX_RETRY_MS, RETRY_JITTER_PERCENT,
    USER_AGENT as USER_AGENT_CONST,
};

/// Result of trying to fetch one dependency file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// File content
    Fetched(String),
    /// Every location was tried and none had the file
    NotFound,
    /// The only remaining strategy is not available
    NotSupported(String),
}

/// Where the resolver gets package metadata and file contents from.
///
/// The network implementation is [`RegistryDependencySource`]; tests plug in
/// in-memory sources.
#[allow(async_fn_in_trait)]
pub trait DependencySource {
    /// Registry metadata for `package`, `None` when the registry does not know it
    async fn package_metadata(&self, package: &str) -> AppResult<Option<DependencySpec>>;

    /// Fetch a file of `spec`, trying each repository-relative path in order
    async fn fetch_file(&self, spec: &DependencySpec, candidates: &[String])
        -> AppResult<FetchOutcome>;
}

impl<T: DependencySource> DependencySource for &T {
    async fn package_metadata(&self, package: &str) -> AppResult<Option<DependencySpec>> {
        (**self).package_metadata(package).await
    }

    async fn fetch_file(
        &self,
        spec: &DependencySpec,
        candidates: &[String],
    ) -> AppResult<FetchOutcome> {
        (**self).fetch_file(spec, candidates).await
    }
}

/// Build HTTP client with default headers and gzip
pub fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| AppError::config_invalid(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success HTTP status onto an error code
pub(crate) fn status_error(status: StatusCode, what: &str) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AppError::fetch_unavailable(format!("{} returned HTTP {}", what, status))
    } else {
        AppError::fetch_failed(format!("{} returned HTTP {}", what, status))
    }
}

/// Delay before retry `attempt` (1-based): exponential, capped, with jitter
pub(crate) fn retry_delay(attempt: u32) -> Duration {
    let base_delay =
        EXPLORER_BASE_RETRY_MS.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
    let capped_delay = base_delay.min(EXPLORER_MAX_RETRY_MS);
    let jitter_range = (capped_delay * RETRY_JITTER_PERCENT) / 100;
    let jitter: i64 =
        rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
    Duration::from_millis((capped_delay as i64 + jitter).max(100) as u64)
}

async fn get_text_once(client: &reqwest::Client, url: &str, what: &str) -> AppResult<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(status, what));
    }
    Ok(response.text().await?)
}

/// GET `url` and return the body, retrying transient failures
pub(crate) async fn get_text_with_retry(
    client: &reqwest::Client,
    url: &str,
    what: &str,
) -> AppResult<String> {
    let mut last_error = None;

    for attempt in 0..EXPLORER_MAX_RETRIES {
        if attempt > 0 {
            let delay = retry_delay(attempt);
            debug!(
                "⏳ Retry {}/{} for {} after {}ms",
                attempt + 1,
                EXPLORER_MAX_RETRIES,
                what,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        match get_text_once(client, url, what).await {
            Ok(body) => return Ok(body),
            Err(e) if e.code.is_retryable() => {
                warn!("⚠️ {} (attempt {}/{})", e, attempt + 1, EXPLORER_MAX_RETRIES);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        AppError::fetch_failed(format!("{} failed after {} attempts", what, EXPLORER_MAX_RETRIES))
    }))
}
