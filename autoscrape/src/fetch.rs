//! HTTP retrieval with bounded retries.
//!
//! Attempt `i` (1-indexed) that fails is followed by a pause of
//! `base_delay * 2^(i-1)` plus a random jitter in `[0, max_jitter]`, except the
//! last one which gives up with a [`FetchError`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use rand::Rng;
use reqwest::Client;
use tracing::{error, trace, warn};

use crate::error::FetchError;

pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; AutoScrapeAlerts/",
    env!("CARGO_PKG_VERSION"),
    "; +https://example.com)"
);

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Total number of attempts, including the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Exponential backoff with additive jitter, capped by a number of attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_jitter: Duration,
    attempt: u32,
}

impl RetryPolicy {
    pub fn new(opts: &FetchOptions) -> Self {
        Self {
            max_retries: opts.max_retries.max(1),
            base_delay: opts.base_delay,
            max_jitter: opts.max_jitter,
            attempt: 0,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            let secs = rand::rng().random_range(0.0..=self.max_jitter.as_secs_f64());
            Duration::from_secs_f64(secs)
        };
        self.base_delay.saturating_mul(factor) + jitter
    }
}

impl Backoff for RetryPolicy {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_retries {
            return None;
        }
        Some(self.delay_after(self.attempt))
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    opts: FetchOptions,
}

impl Fetcher {
    pub fn new(opts: FetchOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(opts.timeout)
            .build()?;
        Ok(Self { client, opts })
    }

    /// GET `url` and return the body, retrying transport errors and non-2xx answers.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let attempts = AtomicU32::new(0);
        let max = self.opts.max_retries.max(1);

        let res = retry_notify(
            RetryPolicy::new(&self.opts),
            || {
                let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                async move {
                    trace!("GET {url} (attempt {n}/{max})");
                    self.get(url).await.map_err(backoff::Error::transient)
                }
            },
            |e: reqwest::Error, wait: Duration| {
                let n = attempts.load(Ordering::Relaxed);
                warn!("Retry {n}/{max} for {url} in {wait:?}: {e}");
            },
        )
        .await;

        res.map_err(|source| {
            let attempts = attempts.load(Ordering::Relaxed);
            error!("Failed to fetch {url} after {attempts} attempt(s): {source}");
            FetchError {
                url: url.to_string(),
                attempts,
                source,
            }
        })
    }

    async fn get(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
