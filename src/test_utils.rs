//! Test utilities for ledger-crawler
//!
//! Scripted page fetchers and record builders so the recovery loop can be
//! exercised without a browser. Used by unit tests and by `tests/`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::crawling::PageFetcher;
use crate::domain::{PageFetchOutcome, TransactionRecord};

/// `count` records keyed `Transaction <start>` .. `Transaction <start+count-1>`.
pub fn records(start: i64, count: usize) -> Vec<TransactionRecord> {
    (start..start + count as i64)
        .map(|i| TransactionRecord::new("Checking", format!("Transaction {i}"), i as f64, "€"))
        .collect()
}

/// Fetcher replaying a script of outcomes per index.
///
/// Each index has a queue; the last queued outcome repeats forever. Indices
/// without a script return the fallback outcome.
pub struct ScriptedFetcher {
    scripts: HashMap<i64, VecDeque<PageFetchOutcome>>,
    delays: HashMap<i64, Duration>,
    fallback: PageFetchOutcome,
    calls: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delays: HashMap::new(),
            fallback: PageFetchOutcome::fetch_error("no script for index"),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `pages` pages of `per_page` rows at offsets `0, per_page, ..`, then the
    /// last-page sentinel.
    pub fn paged(pages: usize, per_page: usize) -> Self {
        let mut fetcher = Self::new();
        for page in 0..pages {
            let offset = (page * per_page) as i64;
            fetcher = fetcher.then(offset, PageFetchOutcome::Success(records(offset, per_page)));
        }
        fetcher.then((pages * per_page) as i64, PageFetchOutcome::LastPage)
    }

    /// Every index answers with `outcome`.
    pub fn always(outcome: PageFetchOutcome) -> Self {
        Self {
            fallback: outcome,
            ..Self::new()
        }
    }

    /// Queue `outcome` after whatever is already scripted for `index`.
    #[must_use]
    pub fn then(mut self, index: i64, outcome: PageFetchOutcome) -> Self {
        self.scripts.entry(index).or_default().push_back(outcome);
        self
    }

    /// Put `times` copies of `outcome` in front of the script for `index`.
    #[must_use]
    pub fn fail_first(mut self, index: i64, times: usize, outcome: PageFetchOutcome) -> Self {
        let queue = self.scripts.entry(index).or_default();
        for _ in 0..times {
            queue.push_front(outcome.clone());
        }
        self
    }

    /// Make every fetch of `index` take at least `delay`.
    #[must_use]
    pub fn delay(mut self, index: i64, delay: Duration) -> Self {
        self.delays.insert(index, delay);
        self
    }

    /// Shared log of fetched indices, readable after the fetcher is moved.
    pub fn call_log(&self) -> Arc<Mutex<Vec<i64>>> {
        Arc::clone(&self.calls)
    }

    fn next_outcome(&mut self, index: i64) -> PageFetchOutcome {
        match self.scripts.get_mut(&index) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| self.fallback.clone()),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&mut self, index: i64) -> PageFetchOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(index);
        }
        if let Some(delay) = self.delays.get(&index).copied() {
            tokio::time::sleep(delay).await;
        }
        self.next_outcome(index)
    }

    fn describe(&self, index: i64) -> String {
        format!("scripted?start={index}")
    }
}
