//! # Pagination Recovery Controller
//!
//! Sequential loop: fetch `current_index`, hand the outcome to the recovery
//! strategy, repeat until the strategy (or the skip-list retry budget, or cancellation)
//! ends the session. Exactly one fetch is in flight at a time.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{PageFetchOutcome, Phase, SessionCounters, SessionState, TerminationReason, TransactionRecord};

use super::fetcher::PageFetcher;
use super::strategy::{RecoveryStrategy, Step, StrategyKind};

/// Loop-level settings independent of the recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub start_index: i64,
    /// A fetch running longer than this counts as a `FetchError`
    pub fetch_timeout: Duration,
    /// Pause between two fetches
    pub request_delay: Duration,
    /// Session-wide cap on failed fetches for the skip-list strategy, whose
    /// round-robin has no bound of its own. Backstep sessions ignore it.
    pub max_total_retries: Option<u32>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            start_index: 0,
            fetch_timeout: Duration::from_secs(60),
            request_delay: Duration::ZERO,
            max_total_retries: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Completed(Vec<TransactionRecord>),
    Failed(Vec<TransactionRecord>, TerminationReason),
}

/// Everything a finished session hands to the sink and the report.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub session_id: String,
    pub strategy: StrategyKind,
    pub outcome: ScrapeOutcome,
    pub counters: SessionCounters,
    pub last_index: i64,
    /// Skipped indices never recovered (skip-list strategy only)
    pub pending_skips: Vec<i64>,
    pub elapsed: Duration,
}

impl SessionResult {
    pub fn records(&self) -> &[TransactionRecord] {
        match &self.outcome {
            ScrapeOutcome::Completed(records) | ScrapeOutcome::Failed(records, _) => records,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, ScrapeOutcome::Completed(_))
    }

    pub fn failure_reason(&self) -> Option<&TerminationReason> {
        match &self.outcome {
            ScrapeOutcome::Completed(_) => None,
            ScrapeOutcome::Failed(_, reason) => Some(reason),
        }
    }
}

pub struct PaginationController<F: PageFetcher> {
    fetcher: F,
    strategy: Box<dyn RecoveryStrategy>,
    settings: ControllerSettings,
    cancel: CancellationToken,
}

impl<F: PageFetcher> PaginationController<F> {
    pub fn new(fetcher: F, strategy: Box<dyn RecoveryStrategy>, settings: ControllerSettings) -> Self {
        Self {
            fetcher,
            strategy,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. wired to Ctrl-C).
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the session to termination. Partial data is always returned.
    pub async fn run(mut self) -> SessionResult {
        let started = Instant::now();
        let mut state = SessionState::new(self.settings.start_index);
        let strategy = self.strategy.kind();

        info!(
            "🚀 Scrape session {} starting at index {} ({} strategy)",
            state.session_id, state.current_index, strategy
        );

        let termination = loop {
            if self.cancel.is_cancelled() {
                break Some(TerminationReason::Cancelled);
            }

            let index = state.current_index;
            debug!(
                "---- {} | collected {} | try {} | backstep {}",
                self.fetcher.describe(index),
                state.collected.len(),
                state.retry_count + 1,
                state.backstep_count
            );

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Some(TerminationReason::Cancelled),
                result = tokio::time::timeout(self.settings.fetch_timeout, self.fetcher.fetch(index)) => {
                    result.unwrap_or_else(|_| {
                        PageFetchOutcome::fetch_error(format!(
                            "fetch timed out after {}s",
                            self.settings.fetch_timeout.as_secs()
                        ))
                    })
                }
            };
            state.record_iteration();
            debug!("Index {} -> {}", index, outcome);

            match self.strategy.on_outcome(&mut state, outcome) {
                Step::Continue => {}
                Step::Completed => break None,
                Step::Failed(reason) => break Some(reason),
            }

            // backstep 전략은 max_back_step 으로 이미 종료가 보장됨
            if let Some(budget) = self.settings.max_total_retries.filter(|_| strategy == StrategyKind::SkipList) {
                if state.counters.total_failures() >= u64::from(budget) {
                    break Some(TerminationReason::RetryBudgetExhausted { budget });
                }
            }

            if !self.settings.request_delay.is_zero() {
                tokio::select! {
                    () = self.cancel.cancelled() => break Some(TerminationReason::Cancelled),
                    () = tokio::time::sleep(self.settings.request_delay) => {}
                }
            }
        };

        let elapsed = started.elapsed();
        match &termination {
            None => info!(
                "🎉 Session {} completed: {} records in {} fetches",
                state.session_id,
                state.collected.len(),
                state.counters.iterations
            ),
            Some(reason) => warn!(
                "🛑 Session {} stopped: {} ({} records kept)",
                state.session_id,
                reason,
                state.collected.len()
            ),
        }

        let SessionState {
            session_id,
            current_index,
            skip_list,
            phase,
            collected,
            counters,
            ..
        } = state;

        // 드레인 중 중단되면 현재 재시도 중이던 인덱스도 미복구 목록에 포함
        let mut pending_skips: Vec<i64> = skip_list.into_iter().collect();
        if phase == Phase::DrainingSkipList && termination.is_some() {
            pending_skips.insert(0, current_index);
        }

        SessionResult {
            session_id,
            strategy,
            outcome: match termination {
                None => ScrapeOutcome::Completed(collected),
                Some(reason) => ScrapeOutcome::Failed(collected, reason),
            },
            counters,
            last_index: current_index,
            pending_skips,
            elapsed,
        }
    }
}
