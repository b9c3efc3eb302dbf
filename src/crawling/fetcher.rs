//! Page fetcher seam between the recovery loop and the browser.

use async_trait::async_trait;

use crate::domain::PageFetchOutcome;

/// Fetches one pagination index and classifies what came back.
///
/// Implementations never return an error: transport problems are folded into
/// [`PageFetchOutcome::FetchError`] so the recovery strategy decides what to do.
/// The controller may drop a pending `fetch` future (timeout, cancellation);
/// implementations must cope with the next call after such an abandonment.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch(&mut self, index: i64) -> PageFetchOutcome;

    /// Human readable target for logs (usually the page URL)
    fn describe(&self, index: i64) -> String {
        format!("index {index}")
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    async fn fetch(&mut self, index: i64) -> PageFetchOutcome {
        (**self).fetch(index).await
    }

    fn describe(&self, index: i64) -> String {
        (**self).describe(index)
    }
}
