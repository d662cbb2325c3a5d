// =============================================================================
// browser.rs - FOR SITES THAT WON'T TALK TO A PLAIN HTTP CLIENT
// =============================================================================
//
// The Texas case search is an ASP.NET form: checkboxes, a date picker, a
// submit button and a grid that pages through postbacks. None of it works
// without JavaScript, so we drive a real headless Chromium.
//
// Scrapers never see chromiumoxide directly. They talk to `BrowserSession`,
// which is just the handful of things a person does with a search form:
// go to a page, click, type, read the page. That keeps the pagination logic
// testable with a fake browser that serves canned HTML.
// =============================================================================

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ScrapeError;

/// The capabilities a scraper needs from a browser.
#[async_trait(?Send)]
pub trait BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Click the first element matching a CSS selector.
    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// Type `text` into the first element matching a CSS selector.
    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), ScrapeError>;

    /// Block until an element matching a CSS selector exists, or give up.
    async fn wait_for(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// The current DOM, serialized as HTML.
    async fn page_source(&mut self) -> Result<String, ScrapeError>;

    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// Starts browser sessions. One session per scrape.
#[async_trait(?Send)]
pub trait BrowserLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}

/// Launches a local Chrome/Chromium binary through chromiumoxide.
pub struct ChromiumLauncher {
    executable: PathBuf,
    headless: bool,
    element_wait: Duration,
}

impl ChromiumLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            executable: config.chromium_path.clone(),
            headless: config.browser_headless,
            element_wait: config.browser_element_wait,
        }
    }

    async fn start(&self) -> anyhow::Result<ChromiumSession> {
        info!(
            executable = %self.executable.display(),
            headless = self.headless,
            "Launching Chromium"
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.executable)
            .window_size(1920, 1080)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions");
        if !self.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch Chromium")?;

        // The CDP handler must be polled for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open a blank page")?;

        Ok(ChromiumSession {
            browser,
            page,
            handler: handler_task,
            element_wait: self.element_wait,
            closed: false,
        })
    }
}

#[async_trait(?Send)]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        let session = self
            .start()
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        Ok(Box::new(session))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    element_wait: Duration,
    closed: bool,
}

impl ChromiumSession {
    /// Poll for an element until it shows up or `element_wait` runs out.
    /// ASP.NET postbacks re-render the form, so elements come and go.
    async fn find(&self, selector: &str) -> Result<Element, ScrapeError> {
        let start = Instant::now();
        let mut poll = Duration::from_millis(100);
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if start.elapsed() >= self.element_wait {
                return Err(ScrapeError::Browser(format!(
                    "element '{selector}' not found after {}ms",
                    self.element_wait.as_millis()
                )));
            }
            tokio::time::sleep(poll).await;
            poll = (poll * 2).min(Duration::from_secs(1));
        }
    }
}

fn cdp_error(action: &str, e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(format!("{action}: {e}"))
}

#[async_trait(?Send)]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        debug!(url, "Browser navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| cdp_error("navigate", e))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| cdp_error("wait for navigation", e))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        debug!(selector, "Browser click");
        let element = self.find(selector).await?;
        element.click().await.map_err(|e| cdp_error("click", e))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        debug!(selector, text, "Browser fill");
        let element = self.find(selector).await?;
        element.click().await.map_err(|e| cdp_error("focus", e))?;
        element.type_str(text).await.map_err(|e| cdp_error("type", e))?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str) -> Result<(), ScrapeError> {
        debug!(selector, "Browser waiting for element");
        self.find(selector).await.map(|_| ())
    }

    async fn page_source(&mut self) -> Result<String, ScrapeError> {
        self.page.content().await.map_err(|e| cdp_error("read page", e))
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Closing Chromium");
        let result = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        result.map(|_| ()).map_err(|e| cdp_error("close", e))
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("ChromiumSession dropped without close(); aborting handler");
        }
        self.handler.abort();
    }
}
