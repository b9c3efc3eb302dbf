//! Pagination controller behaviour against scripted fetchers.
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ledger_crawler::crawling::{
    ControllerSettings, PageFetcher, PaginationController, RecoverySettings, ScrapeOutcome, SessionResult,
    StrategyKind, build_strategy,
};
use ledger_crawler::domain::{DuplicatePolicy, PageFetchOutcome, TerminationReason};
use ledger_crawler::test_utils::{ScriptedFetcher, records};
use proptest::prelude::*;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn recovery(max_nb_try: u32, max_back_step: u32, index_step: i64) -> RecoverySettings {
    RecoverySettings {
        max_nb_try,
        max_back_step,
        index_step,
        overlap_policy: DuplicatePolicy::KeyOnly,
    }
}

async fn run_session<F: PageFetcher>(
    fetcher: F,
    kind: StrategyKind,
    recovery: RecoverySettings,
    settings: ControllerSettings,
) -> SessionResult {
    PaginationController::new(fetcher, build_strategy(kind, recovery), settings)
        .run()
        .await
}

#[rstest]
#[case::backstep(StrategyKind::Backstep)]
#[case::skip_list(StrategyKind::SkipList)]
#[tokio::test]
async fn n_pages_of_k_rows_are_all_collected(#[case] kind: StrategyKind) {
    let (pages, per_page) = (6, 7);
    let result = run_session(
        ScriptedFetcher::paged(pages, per_page),
        kind,
        RecoverySettings::default(),
        ControllerSettings::default(),
    )
    .await;

    assert!(result.is_completed(), "{:?}", result.failure_reason());
    assert_eq!(result.records().len(), pages * per_page);
    assert_eq!(result.records(), records(0, pages * per_page).as_slice());
    assert_eq!(result.counters.iterations, pages as u64 + 1);
    assert_eq!(result.counters.total_failures(), 0);
}

#[tokio::test]
async fn always_failing_fetcher_exhausts_backstep_budget() {
    let (max_nb_try, max_back_step) = (5, 5);
    let result = run_session(
        ScriptedFetcher::always(PageFetchOutcome::fetch_error("net::ERR_CONNECTION_RESET")),
        StrategyKind::Backstep,
        recovery(max_nb_try, max_back_step, 50),
        ControllerSettings {
            start_index: 100,
            ..ControllerSettings::default()
        },
    )
    .await;

    assert!(result.records().is_empty());
    assert!(result.counters.iterations <= u64::from(max_nb_try * max_back_step));
    assert_eq!(result.counters.errored, result.counters.iterations);
    assert_eq!(
        result.failure_reason(),
        Some(&TerminationReason::BackstepBudgetExhausted { backsteps: 5, index: 95 })
    );
}

#[tokio::test]
async fn always_failing_fetcher_at_start_goes_negative() {
    let result = run_session(
        ScriptedFetcher::always(PageFetchOutcome::EmptyNoContent),
        StrategyKind::Backstep,
        recovery(5, 5, 50),
        ControllerSettings::default(),
    )
    .await;

    assert_eq!(result.counters.iterations, 5);
    assert_eq!(result.failure_reason(), Some(&TerminationReason::NegativeIndex { index: -1 }));
}

#[tokio::test]
async fn index_failing_below_retry_budget_is_retried_in_place() {
    let max_nb_try = 5;
    let fetcher = ScriptedFetcher::paged(3, 5).fail_first(5, (max_nb_try - 1) as usize, PageFetchOutcome::EmptyNoContent);
    let calls = fetcher.call_log();

    let result = run_session(
        fetcher,
        StrategyKind::Backstep,
        recovery(max_nb_try, 5, 50),
        ControllerSettings::default(),
    )
    .await;

    assert!(result.is_completed());
    assert_eq!(result.records().len(), 15);
    assert_eq!(result.counters.failures_at(5), max_nb_try - 1);
    assert_eq!(result.counters.backsteps, 0);
    assert_eq!(*calls.lock().unwrap(), vec![0, 5, 5, 5, 5, 5, 10, 15]);
}

#[tokio::test]
async fn backstep_recovers_the_lost_boundary() {
    // index 4 never loads; one step back the page starts with an already collected row
    let fetcher = ScriptedFetcher::new()
        .then(0, PageFetchOutcome::Success(records(0, 4)))
        .then(4, PageFetchOutcome::EmptyNoContent)
        .then(3, PageFetchOutcome::Success(records(3, 5)))
        .then(8, PageFetchOutcome::LastPage);

    let result = run_session(fetcher, StrategyKind::Backstep, recovery(2, 3, 50), ControllerSettings::default()).await;

    assert!(result.is_completed());
    assert_eq!(result.records(), records(0, 8).as_slice());
    assert_eq!(result.counters.backsteps, 1);
    assert_eq!(result.counters.failures_at(4), 2);
}

#[tokio::test]
async fn overlapping_page_is_rejected_until_it_moves() {
    let fetcher = ScriptedFetcher::new()
        .then(0, PageFetchOutcome::Success(records(0, 3)))
        .then(3, PageFetchOutcome::Success(records(1, 3)))
        .then(3, PageFetchOutcome::Success(records(2, 3)))
        .then(3, PageFetchOutcome::Success(records(3, 3)))
        .then(6, PageFetchOutcome::LastPage);

    let result = run_session(fetcher, StrategyKind::Backstep, recovery(5, 5, 50), ControllerSettings::default()).await;

    assert!(result.is_completed());
    assert_eq!(result.records(), records(0, 6).as_slice());
    assert_eq!(result.counters.overlaps, 2);
    assert_eq!(result.counters.failed, 2);
}

#[tokio::test]
async fn skip_list_revisits_skipped_index_after_last_page() {
    let fetcher = ScriptedFetcher::new()
        .then(0, PageFetchOutcome::Success(records(0, 5)))
        .then(5, PageFetchOutcome::Success(records(5, 5)))
        .fail_first(5, 3, PageFetchOutcome::fetch_error("timeout"))
        .then(55, PageFetchOutcome::LastPage);
    let calls = fetcher.call_log();

    let result = run_session(fetcher, StrategyKind::SkipList, recovery(3, 5, 50), ControllerSettings::default()).await;

    assert!(result.is_completed(), "{:?}", result.failure_reason());
    assert_eq!(result.records().len(), 10);
    assert_eq!(result.counters.skipped, 1);
    assert_eq!(result.counters.errored, 3);
    assert!(result.pending_skips.is_empty());
    assert_eq!(*calls.lock().unwrap(), vec![0, 5, 5, 5, 55, 5]);
}

#[tokio::test]
async fn skip_list_with_one_dead_index_stalls() {
    let fetcher = ScriptedFetcher::new()
        .then(0, PageFetchOutcome::EmptyNoContent)
        .then(50, PageFetchOutcome::LastPage);

    let result = run_session(fetcher, StrategyKind::SkipList, recovery(2, 5, 50), ControllerSettings::default()).await;

    assert_eq!(
        result.failure_reason(),
        Some(&TerminationReason::SkipListStalled { index: 0, remaining: 1 })
    );
    assert_eq!(result.counters.iterations, 5);
    assert_eq!(result.pending_skips, vec![0]);
}

#[tokio::test]
async fn round_robin_without_progress_hits_retry_budget() {
    let fetcher = ScriptedFetcher::new()
        .then(0, PageFetchOutcome::EmptyNoContent)
        .then(10, PageFetchOutcome::EmptyNoContent)
        .then(20, PageFetchOutcome::LastPage);

    let result = run_session(
        fetcher,
        StrategyKind::SkipList,
        recovery(2, 5, 10),
        ControllerSettings {
            max_total_retries: Some(20),
            ..ControllerSettings::default()
        },
    )
    .await;

    assert_eq!(
        result.failure_reason(),
        Some(&TerminationReason::RetryBudgetExhausted { budget: 20 })
    );
    assert_eq!(result.counters.total_failures(), 20);
    assert!(result.records().is_empty());
    let mut pending = result.pending_skips.clone();
    pending.sort_unstable();
    assert_eq!(pending, vec![0, 10]);
}

#[tokio::test]
async fn backstep_session_ignores_the_skip_list_retry_budget() {
    // every page fails once: 30 transient failures against a budget of 10
    let pages = 30;
    let mut fetcher = ScriptedFetcher::paged(pages, 2);
    for page in 0..pages {
        fetcher = fetcher.fail_first((page * 2) as i64, 1, PageFetchOutcome::fetch_error("net::ERR_TIMED_OUT"));
    }

    let result = run_session(
        fetcher,
        StrategyKind::Backstep,
        RecoverySettings::default(),
        ControllerSettings {
            max_total_retries: Some(10),
            ..ControllerSettings::default()
        },
    )
    .await;

    assert!(result.is_completed(), "{:?}", result.failure_reason());
    assert_eq!(result.records().len(), pages * 2);
    assert_eq!(result.counters.errored, pages as u64);
    assert_eq!(result.counters.backsteps, 0);
}

#[tokio::test]
async fn slow_fetch_counts_as_transport_failure() {
    let fetcher = ScriptedFetcher::paged(1, 3).delay(0, Duration::from_secs(30));

    let result = run_session(
        fetcher,
        StrategyKind::Backstep,
        recovery(2, 1, 50),
        ControllerSettings {
            fetch_timeout: Duration::from_millis(20),
            ..ControllerSettings::default()
        },
    )
    .await;

    assert_eq!(result.counters.errored, 2);
    assert!(matches!(
        result.failure_reason(),
        Some(TerminationReason::BackstepBudgetExhausted { .. })
    ));
    assert!(result.elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_abandons_the_fetch_and_keeps_partial_data() {
    let fetcher = ScriptedFetcher::paged(4, 5).delay(10, Duration::from_secs(30));
    let cancel = CancellationToken::new();
    let controller = PaginationController::new(
        fetcher,
        build_strategy(StrategyKind::Backstep, RecoverySettings::default()),
        ControllerSettings::default(),
    )
    .with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });
    let result = controller.run().await;
    trigger.await.unwrap();

    match result.outcome {
        ScrapeOutcome::Failed(records, TerminationReason::Cancelled) => assert_eq!(records.len(), 10),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(result.last_index, 10);
}

/// Answers calls in order regardless of index, then reports the last page.
struct SequenceFetcher {
    outcomes: std::vec::IntoIter<PageFetchOutcome>,
}

#[async_trait]
impl PageFetcher for SequenceFetcher {
    async fn fetch(&mut self, _index: i64) -> PageFetchOutcome {
        self.outcomes.next().unwrap_or(PageFetchOutcome::LastPage)
    }
}

fn outcome_strategy() -> impl Strategy<Value = PageFetchOutcome> {
    prop_oneof![
        6 => (0i64..40, 0usize..8).prop_map(|(start, len)| PageFetchOutcome::Success(records(start, len))),
        2 => Just(PageFetchOutcome::EmptyNoContent),
        2 => Just(PageFetchOutcome::fetch_error("flaky")),
        1 => Just(PageFetchOutcome::LastPage),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn collected_keys_stay_unique(
        outcomes in prop::collection::vec(outcome_strategy(), 0..60),
        skip_list in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        let kind = if skip_list { StrategyKind::SkipList } else { StrategyKind::Backstep };
        let fetcher = SequenceFetcher { outcomes: outcomes.into_iter() };

        let result = runtime.block_on(run_session(
            fetcher,
            kind,
            recovery(3, 3, 10),
            ControllerSettings {
                start_index: 20,
                max_total_retries: Some(200),
                ..ControllerSettings::default()
            },
        ));

        let mut seen = HashSet::new();
        for record in result.records() {
            prop_assert!(seen.insert(record.transaction.clone()), "duplicate key {}", record.transaction);
        }
    }
}
