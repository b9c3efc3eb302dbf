//! Headless Chrome launch.
//!
//! `headless_chrome` is a blocking API; call [`launch_browser`] from
//! `spawn_blocking` when inside the runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use headless_chrome::{Browser, LaunchOptions};
use tracing::{debug, info};

use super::config::BrowserConfig;

/// Chrome closes its DevTools connection after this much silence; a slow
/// retry loop must not trip it.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// Inside Docker (or when told so) Chrome cannot use its sandbox.
pub fn running_in_container() -> bool {
    std::env::var("LEDGER_CRAWLER_CONTAINER").is_ok() || Path::new("/.dockerenv").exists()
}

/// Configured binary, else `CHROME_PATH`, else whatever `headless_chrome` finds.
pub fn resolve_chrome_path(config: &BrowserConfig) -> Option<PathBuf> {
    config
        .chrome_path
        .clone()
        .or_else(|| std::env::var("CHROME_PATH").ok().map(PathBuf::from))
}

pub fn launch_browser(config: &BrowserConfig) -> Result<Browser> {
    let sandbox = config.sandbox.unwrap_or_else(|| !running_in_container());
    let chrome_path = resolve_chrome_path(config);

    debug!(
        "Launching Chrome (headless: {}, sandbox: {}, path: {:?})",
        config.headless, sandbox, chrome_path
    );

    let options = LaunchOptions::default_builder()
        .headless(config.headless)
        .sandbox(sandbox)
        .path(chrome_path)
        .window_size(Some((config.window_width, config.window_height)))
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;

    let browser = Browser::new(options).map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?;
    info!("🌐 Chrome launched (headless: {})", config.headless);
    Ok(browser)
}
