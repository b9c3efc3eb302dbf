//! Ledger Crawler - paginated transaction table scraper
//!
//! Walks `<root>?start=<index>` pages in a headless browser, recovers from
//! flaky page boundaries (bounded backstep or skip-list strategy), removes
//! duplicates and writes the transactions as JSON.

// Module declarations
pub mod application;
pub mod crawling;
pub mod domain;
pub mod infrastructure;
pub mod test_utils;

// Re-export the session entry points
pub use application::{ScrapeService, SessionReport};
pub use crawling::{PageFetcher, PaginationController, StrategyKind};
pub use domain::{PageFetchOutcome, TransactionRecord};
