//! crawlpool: keyed headless-browser pooling and bounded URL validation
//!
//! Two cooperating engines for scraping services:
//!
//! - [`CrawlerPool`]: caches expensive browser instances behind a
//!   configuration signature, gates new launches on memory pressure, and
//!   reaps idle instances in the background.
//! - [`UrlValidator`]: fans thousands of independent URL checks out under
//!   a concurrency ceiling, with per-item retry/backoff and failure
//!   isolation.

pub mod browser;
pub mod config;
pub mod pool;
pub mod signature;
pub mod validator;

pub use browser::{ChromeCrawler, ChromeLauncher};
pub use config::{BrowserSettings, PoolConfig, ValidatorConfig};
pub use pool::admission::{Admission, AdmissionController, MemoryProbe};
pub use pool::{CrawlerHandle, CrawlerLauncher, CrawlerPool, PoolError};
pub use signature::{SignatureError, signature_of};
pub use validator::{RetryPolicy, UrlValidator, ValidatedItem, ValidationItem};
