//! Concrete chromiumoxide launcher and handle for the crawler pool
//!
//! [`ChromeLauncher`] turns a [`BrowserSettings`] into a running Chrome
//! instance; [`ChromeCrawler`] is the pooled handle, exposing page
//! rendering to callers while leaving shutdown to the pool.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::pool::{CrawlerHandle, CrawlerLauncher};

/// Launch arguments that hide the usual automation fingerprints.
///
/// Subset of the hardening set used by stealth crawlers; enabled via
/// `BrowserSettings::stealth`.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-notifications",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-hang-monitor",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Launches Chrome instances for the pool
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CrawlerLauncher for ChromeLauncher {
    type Handle = ChromeCrawler;

    async fn launch(&self, settings: &BrowserSettings) -> Result<ChromeCrawler> {
        // Unique profile dir per instance avoids SingletonLock conflicts
        // between pooled browsers.
        let profile_dir = tempfile::Builder::new()
            .prefix("crawlpool_chrome_")
            .tempdir()
            .context("Failed to create browser profile directory")?
            .into_path();

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(settings.viewport.0, settings.viewport.1)
            .user_data_dir(&profile_dir);

        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path.clone());
        }
        builder = if settings.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }
        if settings.stealth {
            for arg in STEALTH_ARGS {
                builder = builder.arg(*arg);
            }
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        info!("Launching Chrome (headless={})", settings.headless);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        // Drive the CDP event stream until the browser goes away. Errors
        // here are connection noise once shutdown begins, so they are
        // logged at debug only.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP event handler error: {e}");
                }
            }
        });

        Ok(ChromeCrawler {
            browser: Mutex::new(browser),
            handler: Mutex::new(Some(handler_task)),
            profile_dir,
        })
    }
}

/// A pooled Chrome instance.
///
/// `render` may be called concurrently by whoever holds the `Arc`;
/// closing is reserved for the pool.
#[derive(Debug)]
pub struct ChromeCrawler {
    browser: Mutex<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    profile_dir: PathBuf,
}

impl ChromeCrawler {
    /// Navigate to `url` in a fresh page and return the rendered HTML.
    ///
    /// The page is closed before returning on the success path; on error
    /// Chrome reclaims it when the browser shuts down.
    pub async fn render(&self, url: &str) -> Result<String> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page(url)
            .await
            .with_context(|| format!("Failed to open page for {url}"))?;
        page.wait_for_navigation()
            .await
            .with_context(|| format!("Failed to load {url}"))?;
        let html = page
            .content()
            .await
            .with_context(|| format!("Failed to read content of {url}"))?;
        if let Err(e) = page.close().await {
            warn!("Failed to close page for {url}: {e}");
        }
        Ok(html)
    }
}

impl CrawlerHandle for ChromeCrawler {
    async fn close(&self) -> Result<()> {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {e}");
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {e}");
            }
        }

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }

        if self.profile_dir.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.profile_dir)
        {
            warn!(
                "Failed to remove profile directory {}: {e}",
                self.profile_dir.display()
            );
        }
        Ok(())
    }
}
