//! Keyed crawler pool with admission control and idle reaping
//!
//! Browsers are expensive to start, so live instances are cached behind a
//! configuration signature and reused by every caller that asks for the
//! same settings. Creation of a new instance is gated by the
//! [`AdmissionController`]; a background reaper closes instances that sit
//! unused past their TTL.
//!
//! Key invariants:
//! - At most one entry per signature, even under racing `acquire` calls
//! - A failed launch never leaves a partial entry behind
//! - Handles are closed only by the pool (reaper or `close_all`), never
//!   by callers holding a borrowed handle

pub mod admission;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{BrowserSettings, PoolConfig};
use crate::signature::{SignatureError, signature_of};
use admission::{Admission, AdmissionController};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by [`CrawlerPool::acquire`]
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Admission denied under memory pressure. Recoverable: retry later.
    #[error("new browser denied: {reason}")]
    ResourceExhausted { reason: String },

    /// The underlying browser failed to initialize. The pool holds no
    /// entry for the signature afterwards; the caller may retry.
    #[error("failed to start browser: {0}")]
    StartFailed(#[source] anyhow::Error),

    /// The settings object could not be fingerprinted
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

// =============================================================================
// Resource traits
// =============================================================================

/// A pooled browser handle.
///
/// Handles are shared out of the pool as `Arc`s; `close` is invoked only
/// by the pool itself, which is what keeps use-after-close races out of
/// caller code.
pub trait CrawlerHandle: Send + Sync + 'static {
    /// Shut the underlying resource down
    fn close(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Launches a browser for a given configuration
pub trait CrawlerLauncher: Send + Sync + 'static {
    type Handle: CrawlerHandle;

    /// Start a new instance configured by `settings`
    fn launch(
        &self,
        settings: &BrowserSettings,
    ) -> impl Future<Output = anyhow::Result<Self::Handle>> + Send;
}

// =============================================================================
// Pool
// =============================================================================

struct PoolEntry<H> {
    handle: Arc<H>,
    created_at: Instant,
    last_used: Instant,
}

/// Keyed pool of live crawler instances
pub struct CrawlerPool<L: CrawlerLauncher> {
    launcher: L,
    config: PoolConfig,
    admission: AdmissionController,
    /// Signature → entry. One mutex serializes the whole
    /// check-then-create-or-reuse sequence, including the launch call:
    /// duplicate concurrent cold starts for the same signature would be
    /// pure waste, so serializing them is the intended behavior.
    entries: Mutex<HashMap<String, PoolEntry<L::Handle>>>,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl<L: CrawlerLauncher> CrawlerPool<L> {
    /// Create a pool. Background tasks are not started; see [`Self::start`].
    pub fn new(launcher: L, config: PoolConfig) -> Arc<Self> {
        let admission = AdmissionController::from_config(&config);
        Self::with_admission(launcher, config, admission)
    }

    /// Create a pool with an explicit admission controller
    pub fn with_admission(
        launcher: L,
        config: PoolConfig,
        admission: AdmissionController,
    ) -> Arc<Self> {
        Arc::new(Self {
            launcher,
            config,
            admission,
            entries: Mutex::new(HashMap::new()),
            reaper_handle: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Start the background idle reaper
    pub async fn start(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        let reaper = tokio::spawn(async move {
            reaper_loop(pool).await;
        });
        *self.reaper_handle.lock().await = Some(reaper);
        info!(
            "Crawler pool started (idle_ttl={:?}, reap_interval={:?})",
            self.config.idle_ttl, self.config.reap_interval
        );
    }

    /// Get the pooled browser for `settings`, launching one if needed.
    ///
    /// A cache hit refreshes the entry's last-used time and returns the
    /// existing handle. A miss consults admission control and, if
    /// allowed, launches and registers a new instance. On launch failure
    /// no entry is inserted, so the signature's entry count stays zero.
    pub async fn acquire(&self, settings: &BrowserSettings) -> Result<Arc<L::Handle>, PoolError> {
        let sig = signature_of(settings)?;
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(&sig) {
            entry.last_used = Instant::now();
            debug!("Reusing pooled browser for signature {sig}");
            return Ok(Arc::clone(&entry.handle));
        }

        if let Admission::Denied { reason } = self.admission.may_admit() {
            warn!("Browser launch denied for signature {sig}: {reason}");
            return Err(PoolError::ResourceExhausted { reason });
        }

        // Lock stays held across the launch: cold starts for the same
        // signature are serialized by design (spec trade-off).
        let handle = self
            .launcher
            .launch(settings)
            .await
            .map_err(PoolError::StartFailed)?;
        let handle = Arc::new(handle);

        let now = Instant::now();
        entries.insert(
            sig.clone(),
            PoolEntry {
                handle: Arc::clone(&handle),
                created_at: now,
                last_used: now,
            },
        );
        info!("Started new pooled browser for signature {sig}");
        Ok(handle)
    }

    /// Close every pooled browser and clear the pool.
    ///
    /// Closes run concurrently; individual failures are logged and
    /// suppressed. Also stops the reaper. Safe to call more than once.
    pub async fn close_all(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reaper_handle.lock().await.take() {
            handle.abort();
        }

        let drained: Vec<(String, PoolEntry<L::Handle>)> =
            self.entries.lock().await.drain().collect();
        if drained.is_empty() {
            return;
        }

        info!("Closing {} pooled browsers", drained.len());
        let closes = drained
            .iter()
            .map(|(sig, entry)| async move { (sig, entry.handle.close().await) });
        for (sig, result) in futures::future::join_all(closes).await {
            if let Err(e) = result {
                warn!("Failed to close pooled browser {sig}: {e:#}");
            }
        }
    }

    /// Close and remove entries idle past the configured TTL.
    ///
    /// Normally driven by the background reaper; exposed so the scan can
    /// be triggered deterministically. Close failures never stop the
    /// scan.
    pub async fn reap_idle(&self) {
        let ttl = self.config.idle_ttl;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_used) > ttl)
            .map(|(sig, _)| sig.clone())
            .collect();

        for sig in expired {
            if let Some(entry) = entries.remove(&sig) {
                debug!(
                    "Reaping idle browser {sig} (idle {:?}, alive {:?})",
                    now.duration_since(entry.last_used),
                    now.duration_since(entry.created_at)
                );
                if let Err(e) = entry.handle.close().await {
                    warn!("Failed to close idle browser {sig}: {e:#}");
                }
            }
        }
    }

    /// Number of live pool entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the pool currently holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Whether an entry exists for `settings`
    pub async fn contains(&self, settings: &BrowserSettings) -> Result<bool, SignatureError> {
        let sig = signature_of(settings)?;
        Ok(self.entries.lock().await.contains_key(&sig))
    }
}

// =============================================================================
// Background reaper
// =============================================================================

async fn reaper_loop<L: CrawlerLauncher>(pool: Arc<CrawlerPool<L>>) {
    let mut interval = tokio::time::interval(pool.config.reap_interval);
    // First tick completes immediately; consume it so the first scan
    // happens one full interval after start.
    interval.tick().await;

    while !pool.shutdown.load(Ordering::Relaxed) {
        interval.tick().await;
        pool.reap_idle().await;
    }

    debug!("Reaper loop exiting");
}
