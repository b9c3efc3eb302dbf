//! Infrastructure layer: configuration, logging, headless Chrome access,
//! HTML row extraction and result persistence.

pub mod browser;
pub mod browser_fetcher;
pub mod config; // Layered settings (file / env / CLI)
pub mod logging;
pub mod result_sink;
pub mod row_extraction;

// Re-export commonly used items
pub use browser::launch_browser;
pub use browser_fetcher::{BrowserPageFetcher, dismiss_dialogs, page_url};
pub use config::{AppConfig, ConfigError, ConfigOverrides};
pub use logging::init_logging_with_config;
pub use result_sink::{JsonFileSink, ResultSink, WrittenFiles};
pub use row_extraction::RowExtractor;
