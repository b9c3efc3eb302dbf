//! Bounded backstep 전략
//!
//! 같은 인덱스를 `max_nb_try`번까지 재시도하고, 그래도 실패하면 오프셋을 1 뒤로
//! 물려 잃어버렸을 수 있는 경계를 다시 덮습니다. 후퇴한 만큼 앞쪽 행은 이미
//! 수집된 행이므로 `rows[backstep_count..]`만 새 데이터로 취급합니다.
//! `max_back_step`이 종료를 보장합니다.

use tracing::{info, warn};

use crate::domain::{PageFetchOutcome, ScrapeError, SessionState, TerminationReason};

use super::strategy::{RecoverySettings, RecoveryStrategy, Step, StrategyKind, check_overlap, failure_for};

#[derive(Debug, Clone)]
pub struct BackstepStrategy {
    settings: RecoverySettings,
}

impl BackstepStrategy {
    pub fn new(settings: RecoverySettings) -> Self {
        Self { settings }
    }

    fn fail(&self, state: &mut SessionState, error: &ScrapeError) -> Step {
        warn!("❌ [FAILED] {} (try {}/{})", error, state.retry_count + 1, self.settings.max_nb_try);
        state.record_failure(error);

        if state.retry_count < self.settings.max_nb_try {
            return Step::Continue;
        }

        // 재시도 소진 -> 한 칸 뒤로
        state.retry_count = 0;
        state.backstep_count += 1;
        state.counters.backsteps += 1;
        state.current_index -= 1;
        info!(
            "↩️ Stepping back to index {} (backstep {}/{})",
            state.current_index, state.backstep_count, self.settings.max_back_step
        );

        if state.backstep_count >= self.settings.max_back_step {
            return Step::Failed(TerminationReason::BackstepBudgetExhausted {
                backsteps: state.backstep_count,
                index: state.current_index,
            });
        }
        if state.current_index < 0 {
            return Step::Failed(TerminationReason::NegativeIndex {
                index: state.current_index,
            });
        }
        Step::Continue
    }
}

impl RecoveryStrategy for BackstepStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Backstep
    }

    fn on_outcome(&mut self, state: &mut SessionState, outcome: PageFetchOutcome) -> Step {
        let index = state.current_index;
        let backstep = state.backstep_count as usize;

        match outcome {
            PageFetchOutcome::LastPage => {
                info!("🏁 Last page reached at index {index}");
                Step::Completed
            }
            PageFetchOutcome::Success(mut rows) if rows.len() > backstep + 1 => {
                let fetched = rows.len();
                let fresh = rows.split_off(backstep);
                if let Err(overlap) = check_overlap(state, &fresh, self.settings.overlap_policy) {
                    return self.fail(state, &overlap);
                }

                let added = state.append(fresh);
                state.retry_count = 0;
                state.backstep_count = 0;
                // 후퇴한 만큼의 행도 오프셋에 포함되므로 전체 행 수만큼 전진
                state.current_index += fetched as i64;
                info!(
                    "✅ Index {} -> +{} records (total {}), next index {}",
                    index,
                    added,
                    state.collected.len(),
                    state.current_index
                );
                Step::Continue
            }
            other => {
                let error = failure_for(index, &other).unwrap_or_else(|| ScrapeError::Content {
                    index,
                    reason: format!(
                        "{} rows, need more than {} after {} backsteps",
                        other.row_count(),
                        backstep + 1,
                        backstep
                    ),
                });
                self.fail(state, &error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::records;

    fn strategy(max_nb_try: u32, max_back_step: u32) -> BackstepStrategy {
        BackstepStrategy::new(RecoverySettings {
            max_nb_try,
            max_back_step,
            ..RecoverySettings::default()
        })
    }

    #[test]
    fn test_success_advances_by_row_count() {
        let mut s = strategy(3, 3);
        let mut state = SessionState::new(0);
        let step = s.on_outcome(&mut state, PageFetchOutcome::Success(records(0, 4)));
        assert_eq!(step, Step::Continue);
        assert_eq!(state.current_index, 4);
        assert_eq!(state.collected.len(), 4);
    }

    #[test]
    fn test_retries_before_stepping_back() {
        let mut s = strategy(3, 5);
        let mut state = SessionState::new(10);
        state.collected = records(0, 10);

        for _ in 0..2 {
            assert_eq!(s.on_outcome(&mut state, PageFetchOutcome::EmptyNoContent), Step::Continue);
            assert_eq!(state.current_index, 10);
        }
        assert_eq!(s.on_outcome(&mut state, PageFetchOutcome::EmptyNoContent), Step::Continue);
        assert_eq!(state.current_index, 9);
        assert_eq!(state.backstep_count, 1);
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn test_backstep_skips_already_collected_rows() {
        let mut s = strategy(1, 5);
        let mut state = SessionState::new(10);
        state.collected = records(0, 10);

        // 한 번 실패 -> index 9, backstep 1
        s.on_outcome(&mut state, PageFetchOutcome::fetch_error("net::ERR_FAILED"));
        assert_eq!(state.current_index, 9);

        // offset 9부터 5행: 첫 행(Transaction 9)은 이미 수집됨
        let step = s.on_outcome(&mut state, PageFetchOutcome::Success(records(9, 5)));
        assert_eq!(step, Step::Continue);
        assert_eq!(state.collected.len(), 14);
        assert_eq!(state.current_index, 14);
        assert_eq!(state.backstep_count, 0);
    }

    #[test]
    fn test_overlap_is_a_failure() {
        let mut s = strategy(5, 5);
        let mut state = SessionState::new(5);
        state.collected = records(0, 5);

        let step = s.on_outcome(&mut state, PageFetchOutcome::Success(records(3, 5)));
        assert_eq!(step, Step::Continue);
        assert_eq!(state.collected.len(), 5);
        assert_eq!(state.current_index, 5);
        assert_eq!(state.counters.overlaps, 1);
    }

    #[test]
    fn test_too_few_rows_while_backstepped() {
        let mut s = strategy(1, 5);
        let mut state = SessionState::new(3);
        state.collected = records(0, 3);
        s.on_outcome(&mut state, PageFetchOutcome::EmptyNoContent);
        assert_eq!(state.backstep_count, 1);

        // backstep 1 이면 2행으로는 부족
        s.on_outcome(&mut state, PageFetchOutcome::Success(records(2, 2)));
        assert_eq!(state.counters.failed, 2);
        assert_eq!(state.backstep_count, 2);
    }

    #[test]
    fn test_negative_index_terminates() {
        let mut s = strategy(2, 5);
        let mut state = SessionState::new(0);
        assert_eq!(s.on_outcome(&mut state, PageFetchOutcome::fetch_error("x")), Step::Continue);
        let step = s.on_outcome(&mut state, PageFetchOutcome::fetch_error("x"));
        assert_eq!(step, Step::Failed(TerminationReason::NegativeIndex { index: -1 }));
        assert_eq!(state.counters.errored, 2);
    }

    #[test]
    fn test_backstep_budget_terminates() {
        let mut s = strategy(1, 2);
        let mut state = SessionState::new(20);
        assert_eq!(s.on_outcome(&mut state, PageFetchOutcome::EmptyNoContent), Step::Continue);
        let step = s.on_outcome(&mut state, PageFetchOutcome::EmptyNoContent);
        assert_eq!(
            step,
            Step::Failed(TerminationReason::BackstepBudgetExhausted { backsteps: 2, index: 18 })
        );
    }

    #[test]
    fn test_last_page_completes() {
        let mut s = strategy(5, 5);
        let mut state = SessionState::new(40);
        assert_eq!(s.on_outcome(&mut state, PageFetchOutcome::LastPage), Step::Completed);
    }
}
