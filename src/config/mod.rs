//! Configuration surface consumed by the pool and validator
//!
//! These structs are plain data with sensible defaults; loading them from
//! the environment or a config file is the caller's concern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::validator::RetryPolicy;

/// Browser launch configuration.
///
/// This is the pool key: two `BrowserSettings` that serialize to the same
/// JSON object map to the same pooled browser (see [`crate::signature`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run Chrome headless (default: true)
    pub headless: bool,
    /// Apply anti-automation-detection launch arguments (default: true)
    pub stealth: bool,
    /// Override the browser user agent
    pub user_agent: Option<String>,
    /// Window size as (width, height)
    pub viewport: (u32, u32),
    /// Extra Chrome command-line arguments, passed through verbatim
    pub extra_args: Vec<String>,
    /// Explicit Chrome/Chromium executable path.
    ///
    /// When `None`, chromiumoxide falls back to its own executable
    /// detection.
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            stealth: true,
            user_agent: None,
            viewport: (1920, 1080),
            extra_args: Vec::new(),
            executable: None,
        }
    }
}

/// Configuration for the crawler pool and its background reaper
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Refuse new browsers at or above this memory utilization (default: 95.0)
    pub memory_threshold_percent: f32,
    /// Close pooled browsers unused for longer than this (default: 30 minutes)
    pub idle_ttl: Duration,
    /// Interval between reaper scans (default: 60s)
    pub reap_interval: Duration,
    /// Process memory ceiling in bytes for constrained deployments.
    ///
    /// When set, admission compares the process RSS against this ceiling
    /// instead of reading whole-system memory. Intended for container
    /// platforms where host metrics are meaningless (the dyno case).
    pub memory_ceiling_bytes: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            memory_threshold_percent: 95.0,
            idle_ttl: Duration::from_secs(1800),
            reap_interval: Duration::from_secs(60),
            memory_ceiling_bytes: None,
        }
    }
}

/// Configuration for the bounded URL validator
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum number of URL checks in flight at once (default: 20)
    pub max_concurrent: usize,
    /// Maximum HTTP attempts per URL (default: 3)
    pub max_retries: u32,
    /// Per-request timeout (default: 10s)
    pub request_timeout: Duration,
    /// User agent sent with every check
    pub user_agent: String,
    /// Key in each item's metadata that holds the URL string (default: "url")
    pub url_field: String,
    /// Optional random delay range applied before each item's first
    /// request, to avoid hammering a single origin. Off by default.
    pub politeness_delay: Option<(Duration, Duration)>,
    /// Backoff schedule between retry attempts
    pub retry: RetryPolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            max_retries: 3,
            request_timeout: Duration::from_secs(10),
            user_agent: "URLValidatorService/1.0 (crawlpool)".to_string(),
            url_field: "url".to_string(),
            politeness_delay: None,
            retry: RetryPolicy::default(),
        }
    }
}
