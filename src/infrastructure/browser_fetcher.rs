//! [`PageFetcher`] backed by headless Chrome.
//!
//! One fetch = navigate to `<root>?start=<index>`, wait for the page to
//! settle, read the transaction table markup (`#dvTable`, else the
//! `iframe#fm` document) and parse its rows. An empty table gets one click on
//! the generate button before giving up. A tab that saw a transport error, or
//! whose fetch was abandoned by the controller, is closed and replaced on the
//! next fetch. Every tab dismisses JavaScript dialogs through DevTools as soon
//! as it is opened, so a popup raised while the page loads cannot block it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, Tab};
use tracing::{debug, info, warn};
use url::Url;

use crate::crawling::PageFetcher;
use crate::domain::constants::site;
use crate::domain::{PageFetchOutcome, classify_rows};

use super::config::AppConfig;
use super::row_extraction::RowExtractor;

const TABLE_MARKUP_JS: &str = r#"(function () {
    var table = document.getElementById('__TABLE__');
    if (table && table.querySelectorAll('tr').length > 0) { return table.outerHTML; }
    var frame = document.querySelector('__FRAME__');
    if (frame) {
        var doc = frame.contentDocument || (frame.contentWindow && frame.contentWindow.document);
        if (doc && doc.body) { return doc.body.innerHTML; }
    }
    return '';
})()"#;

const CLICK_GENERATE_JS: &str = r#"(function () {
    var button = document.querySelector('__BUTTON__');
    if (button) { button.click(); return true; }
    return false;
})()"#;

/// Browser-side snippets with the site selectors filled in.
#[derive(Debug)]
struct PageScripts {
    table_markup: String,
    click_generate: String,
}

impl PageScripts {
    fn new() -> Self {
        let fill = |js: &str| {
            js.replace("__FRAME__", site::FRAME_SELECTOR)
                .replace("__TABLE__", site::TABLE_CONTAINER_ID)
                .replace("__BUTTON__", site::GENERATE_BUTTON_SELECTOR)
        };
        Self {
            table_markup: fill(TABLE_MARKUP_JS),
            click_generate: fill(CLICK_GENERATE_JS),
        }
    }
}

/// `root` with its `start` parameter set to `index`; other query pairs survive.
pub fn page_url(root: &Url, index: i64) -> Url {
    let kept: Vec<(String, String)> = root
        .query_pairs()
        .filter(|(key, _)| key != site::START_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = root.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(site::START_PARAM, &index.to_string());
    url
}

pub struct BrowserPageFetcher {
    browser: Arc<Browser>,
    tab: Option<Arc<Tab>>,
    root_url: Url,
    extractor: Arc<RowExtractor>,
    scripts: Arc<PageScripts>,
    settle: Duration,
    navigation_timeout: Duration,
}

impl BrowserPageFetcher {
    pub fn new(browser: Browser, config: &AppConfig) -> Result<Self> {
        let root_url = Url::parse(&config.scraper.root_url)
            .with_context(|| format!("Invalid root URL '{}'", config.scraper.root_url))?;

        Ok(Self {
            browser: Arc::new(browser),
            tab: None,
            root_url,
            extractor: Arc::new(RowExtractor::new()?),
            scripts: Arc::new(PageScripts::new()),
            settle: Duration::from_millis(config.browser.settle_ms),
            navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
        })
    }

    async fn acquire_tab(&mut self) -> Result<Arc<Tab>> {
        if let Some(tab) = self.tab.take() {
            return Ok(tab);
        }

        let browser = Arc::clone(&self.browser);
        let timeout = self.navigation_timeout;
        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>> {
            let tab = browser
                .new_tab()
                .map_err(|e| anyhow!("Failed to create tab: {}", e))?;
            tab.set_default_timeout(timeout);
            dismiss_dialogs(&tab)?;
            Ok(tab)
        })
        .await
        .map_err(|e| anyhow!("Blocking task panicked: {}", e))??;

        info!("🆕 Opened a fresh browser tab");
        Ok(tab)
    }
}

#[async_trait]
impl PageFetcher for BrowserPageFetcher {
    async fn fetch(&mut self, index: i64) -> PageFetchOutcome {
        let url = page_url(&self.root_url, index);

        let tab = match self.acquire_tab().await {
            Ok(tab) => tab,
            Err(e) => return PageFetchOutcome::fetch_error(format!("{e:#}")),
        };

        // Dropped without `release` (error, timeout, cancellation) => tab is discarded
        let lease = TabLease::new(Arc::clone(&tab));
        let job = PageJob {
            tab,
            url: url.to_string(),
            extractor: Arc::clone(&self.extractor),
            scripts: Arc::clone(&self.scripts),
            settle: self.settle,
        };

        let result = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| anyhow!("Blocking task panicked: {}", e))
            .and_then(|loaded| loaded);

        match result {
            Ok(rows) => {
                self.tab = lease.release();
                debug!("{} -> {} table rows", url, rows.len());
                classify_rows(&rows)
            }
            Err(e) => {
                warn!("🔌 {} failed, tab will be recreated: {:#}", url, e);
                drop(lease);
                PageFetchOutcome::fetch_error(format!("{e:#}"))
            }
        }
    }

    fn describe(&self, index: i64) -> String {
        page_url(&self.root_url, index).to_string()
    }
}

/// Dismiss every `alert`/`confirm`/`prompt` the tab raises, including those
/// fired during page load. Register before the first navigation.
pub fn dismiss_dialogs(tab: &Arc<Tab>) -> Result<()> {
    let dialog = Arc::new(tab.get_dialog());
    tab.add_event_listener(Arc::new(move |event: &Event| {
        if let Event::PageJavascriptDialogOpening(_) = event {
            debug!("Dismissing JavaScript dialog");
            // the listener runs on the tab's event thread; answer from another one
            let dialog = Arc::clone(&dialog);
            std::thread::spawn(move || {
                if let Err(e) = dialog.dismiss() {
                    warn!("Could not dismiss dialog: {}", e);
                }
            });
        }
    }))
    .map_err(|e| anyhow!("Failed to register dialog handler: {}", e))?;
    Ok(())
}

/// Everything one blocking page load needs.
struct PageJob {
    tab: Arc<Tab>,
    url: String,
    extractor: Arc<RowExtractor>,
    scripts: Arc<PageScripts>,
    settle: Duration,
}

impl PageJob {
    fn run(self) -> Result<Vec<Vec<String>>> {
        self.tab
            .navigate_to(&self.url)
            .with_context(|| format!("navigation to {} failed", self.url))?;
        self.tab.wait_until_navigated().context("page load failed")?;

        std::thread::sleep(self.settle);

        let rows = self.read_rows()?;
        if !rows.is_empty() {
            return Ok(rows);
        }

        if !self.click_generate()? {
            return Ok(rows);
        }
        debug!("Clicked generate on {}", self.url);
        std::thread::sleep(self.settle);
        self.read_rows()
    }

    fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        let markup = self
            .tab
            .evaluate(&self.scripts.table_markup, false)
            .context("reading the transaction table failed")?
            .value
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default();
        Ok(self.extractor.extract_rows(&markup))
    }

    fn click_generate(&self) -> Result<bool> {
        let clicked = self
            .tab
            .evaluate(&self.scripts.click_generate, false)
            .context("clicking the generate button failed")?
            .value
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        Ok(clicked)
    }
}

/// Holds a tab for the duration of one fetch; closes it unless released.
struct TabLease {
    tab: Option<Arc<Tab>>,
}

impl TabLease {
    fn new(tab: Arc<Tab>) -> Self {
        Self { tab: Some(tab) }
    }

    fn release(mut self) -> Option<Arc<Tab>> {
        self.tab.take()
    }
}

impl Drop for TabLease {
    fn drop(&mut self) {
        let Some(tab) = self.tab.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    if let Err(e) = tab.close(false) {
                        debug!("Closing discarded tab failed: {}", e);
                    }
                });
            }
            Err(_) => debug!("No runtime to close a discarded tab on"),
        }
    }
}
