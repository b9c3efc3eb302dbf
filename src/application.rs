//! Application layer
//!
//! Wires configuration, the pagination controller and persistence into one
//! scrape session and summarizes it.

pub mod report;
pub mod scrape_service;

pub use report::{ReportStatus, SessionReport, exit_code};
pub use scrape_service::ScrapeService;
