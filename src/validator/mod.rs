//! Bounded-concurrency URL validation
//!
//! Fans a batch of `{url, ...metadata}` records out over a fixed number
//! of in-flight HTTP checks. Each item is independent: one URL timing
//! out, erroring, or panicking its task never disturbs the rest of the
//! batch. Per-item failures come back as data (`is_valid = false` plus a
//! message), never as errors.

pub mod backoff;
mod types;

pub use backoff::RetryPolicy;
pub use types::{ValidatedItem, ValidationItem};

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use url::Url;

use crate::config::ValidatorConfig;

/// Batch URL validator with a shared HTTP client
#[derive(Debug, Clone)]
pub struct UrlValidator {
    client: reqwest::Client,
    config: ValidatorConfig,
}

impl UrlValidator {
    /// Build a validator and its HTTP client.
    ///
    /// The client follows redirects and applies the configured
    /// per-request timeout; connections are reused across the batch.
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Validate every item in the batch.
    ///
    /// One task per item, gated by a counting semaphore so at most
    /// `max_concurrent` checks touch the network at once. Output has one
    /// record per input; only a panicked task can drop its item, and
    /// that is logged, never silent. Result order follows task
    /// completion, not submission - match on the original metadata if
    /// input order matters.
    pub async fn validate_batch(&self, items: Vec<ValidationItem>) -> Vec<ValidatedItem> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = Vec::with_capacity(items.len());

        for item in items {
            let validator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.push(tokio::spawn(async move {
                // The semaphore lives as long as every task, so acquire
                // only fails if it were closed, which never happens.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("validator semaphore closed");
                validator.verify_item(item).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(validated) => results.push(validated),
                Err(e) => error!("Validation task fault, item dropped from batch: {e}"),
            }
        }
        results
    }

    /// Validate a batch and keep only the items that passed.
    ///
    /// Convenience for feed-filtering flows that only want the surviving
    /// records, metadata intact.
    pub async fn filter_valid(&self, items: Vec<ValidationItem>) -> Vec<ValidationItem> {
        self.validate_batch(items)
            .await
            .into_iter()
            .filter(|validated| validated.is_valid)
            .map(|validated| validated.original)
            .collect()
    }

    /// Check a single item.
    ///
    /// Structurally invalid or missing URLs are rejected without any
    /// network traffic. Otherwise the URL gets up to `max_retries` GET
    /// attempts with exponential backoff between them: any status below
    /// 400 is success, statuses of 400 and up and connection-level
    /// errors are retried, and unclassified failures abort immediately.
    pub async fn verify_item(&self, item: ValidationItem) -> ValidatedItem {
        let url = match item.get(&self.config.url_field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_owned(),
            _ => {
                warn!(
                    "URL field '{}' missing, empty, or not a string",
                    self.config.url_field
                );
                return ValidatedItem::rejected(
                    item,
                    format!(
                        "URL field '{}' missing, empty, or not a string",
                        self.config.url_field
                    ),
                );
            }
        };

        match Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                warn!("Invalid URL format: {url}");
                return ValidatedItem::rejected(item, format!("Invalid URL format: {url}"));
            }
        }

        if let Some(delay) = self.politeness_delay() {
            tokio::time::sleep(delay).await;
        }

        let max_retries = self.config.max_retries.max(1);
        let mut last_error = String::from("Unknown error");

        for attempt in 0..max_retries {
            match self.client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let final_url = response.url().to_string();
                    if status < 400 {
                        info!("URL {url} -> {final_url} is valid (status {status})");
                        return ValidatedItem {
                            original: item,
                            is_valid: true,
                            status_code: Some(status),
                            error_message: None,
                            final_url: Some(final_url),
                        };
                    }
                    last_error = format!("HTTP status {status}");
                    warn!(
                        "URL {url} -> {final_url} failed (status {status}) - attempt {}/{max_retries}",
                        attempt + 1
                    );
                    if attempt + 1 == max_retries {
                        return ValidatedItem {
                            original: item,
                            is_valid: false,
                            status_code: Some(status),
                            error_message: Some(last_error),
                            final_url: Some(final_url),
                        };
                    }
                }
                Err(e) if e.is_timeout() => {
                    last_error = String::from("Request timed out");
                    warn!("URL {url} failed (timeout) - attempt {}/{max_retries}", attempt + 1);
                }
                Err(e) if e.is_connect() => {
                    last_error = format!("Connection error: {e}");
                    warn!(
                        "URL {url} failed ({last_error}) - attempt {}/{max_retries}",
                        attempt + 1
                    );
                }
                Err(e) if e.is_request() || e.is_redirect() || e.is_body() || e.is_decode() => {
                    last_error = format!("Client error: {e}");
                    warn!(
                        "URL {url} failed ({last_error}) - attempt {}/{max_retries}",
                        attempt + 1
                    );
                }
                Err(e) => {
                    // Unclassified failure: retrying is unlikely to help,
                    // so fail fast instead of burning attempts.
                    error!("URL {url} failed with unexpected error: {e}");
                    return ValidatedItem::rejected(item, format!("Unexpected error: {e}"));
                }
            }

            if attempt + 1 < max_retries {
                let jitter: f64 = rand::rng().random_range(0.0..1.0);
                tokio::time::sleep(self.config.retry.delay(attempt, jitter)).await;
            }
        }

        error!("URL {url} failed after {max_retries} attempts. Last error: {last_error}");
        ValidatedItem::rejected(
            item,
            format!("Failed after {max_retries} attempts. Last error: {last_error}"),
        )
    }

    fn politeness_delay(&self) -> Option<Duration> {
        let (min, max) = self.config.politeness_delay?;
        if max > min {
            let spread = (max - min).as_secs_f64();
            Some(min + Duration::from_secs_f64(rand::rng().random_range(0.0..spread)))
        } else {
            Some(min)
        }
    }
}
