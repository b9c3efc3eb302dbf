//! Domain module - scrape session core types
//!
//! Transaction records, fetch outcomes, duplicate policies, the owned session
//! state and the failure taxonomy. Nothing here touches the browser.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod constants;
pub mod dedup;
pub mod errors;
pub mod outcome;
pub mod session;
pub mod transaction;

// Re-export commonly used items for convenience
pub use dedup::{DedupOutcome, DuplicatePolicy, dedup_pass, find_overlap};
pub use errors::{FailureKind, ScrapeError, TerminationReason};
pub use outcome::{PageFetchOutcome, classify_rows};
pub use session::{Phase, SessionCounters, SessionState};
pub use transaction::TransactionRecord;
