//! Upstream tag index client
//!
//! Bulk fetch interface used only on cache miss: up to 100 tag names per
//! request against a Gelbooru-style tag-index endpoint, with a bounded retry
//! loop and exponential backoff with jitter between attempts.

use crate::normalize;
use crate::record::TagRecord;
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on tag names per bulk request.
pub const MAX_BULK_TOKENS: usize = 100;

const DEFAULT_BASE_URL: &str = "https://gelbooru.com/index.php?page=dapi&s=tag&q=index&json=1";
const USER_AGENT: &str = concat!("booru-tags/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tag source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Response arrived but carried no result list
    #[error("Response missing tag results")]
    MissingResults,

    /// No response accepted within the retry bound
    #[error("No usable response after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Bounded-retry schedule for bulk lookups.
///
/// Delay grows as `base_delay * 2^(attempt-1)` capped at `max_delay`, then
/// scaled by a random factor in [0.5, 1.0]. A zero base delay disables
/// pacing entirely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1).min(16);
        let exp = self.base_delay.saturating_mul(1u32 << shift);
        let capped = exp.min(self.max_delay);
        capped.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
    }
}

/// Bulk lookup against an external tag index.
///
/// At most [`MAX_BULK_TOKENS`] tokens per call. The token→record mapping of
/// the result is carried by each record's `name`. A successful return may
/// omit tokens the source does not know; those stay unresolved for the call.
#[async_trait]
pub trait TagSource: Send + Sync {
    async fn fetch_bulk(&self, tokens: &[String]) -> Result<Vec<TagRecord>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct TagIndexResponse {
    #[serde(default)]
    tag: Option<Vec<TagRecord>>,
}

/// Gelbooru-style tag index client
pub struct GelbooruClient {
    http_client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GelbooruClient {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_config(DEFAULT_BASE_URL, RetryPolicy::default(), DEFAULT_TIMEOUT)
    }

    pub fn with_config(
        base_url: impl Into<String>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            retry,
        })
    }

    /// Build the request URL for one token chunk: HTML-unescape the joined
    /// set, remap apostrophes to their named entity, percent-encode.
    pub fn bulk_query_url(&self, tokens: &[String]) -> String {
        let joined = tokens.join(" ");
        let query = normalize::escape_apostrophe(&normalize::html_unescape(&joined));
        format!("{}&names={}", self.base_url, urlencoding::encode(&query))
    }

    async fn attempt(&self, url: &str) -> Result<Vec<TagRecord>, SourceError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(status.as_u16(), error_text));
        }

        let body: TagIndexResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        // a present list is accepted as is, even when it does not cover
        // every requested token; an absent list is a failed attempt
        body.tag.ok_or(SourceError::MissingResults)
    }
}

#[async_trait]
impl TagSource for GelbooruClient {
    async fn fetch_bulk(&self, tokens: &[String]) -> Result<Vec<TagRecord>, SourceError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        debug_assert!(tokens.len() <= MAX_BULK_TOKENS);

        let url = self.bulk_query_url(tokens);
        for attempt in 1..=self.retry.max_attempts {
            match self.attempt(&url).await {
                Ok(records) => {
                    tracing::debug!(
                        requested = tokens.len(),
                        resolved = records.len(),
                        attempt,
                        "bulk tag lookup accepted"
                    );
                    return Ok(records);
                }
                // every per-attempt failure is treated as transient and
                // retried until the bound
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "bulk tag lookup attempt failed"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(SourceError::Exhausted {
            attempts: self.retry.max_attempts,
        })
    }
}
