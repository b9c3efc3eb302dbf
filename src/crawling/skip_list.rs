//! Skip-and-round-robin 전략
//!
//! 1차 패스: 실패한 인덱스를 `max_nb_try`번 재시도한 뒤 skip list에 넣고
//! `index_step`만큼 건너뜁니다. 마지막 페이지를 본 뒤에는 skip list를 비우며
//! 각 인덱스를 다시 시도하고, 여전히 실패하는 인덱스는 리스트 뒤로 보냅니다.
//!
//! 이 전략 자체에는 종료 상한이 없습니다. 컨트롤러의 전체 재시도 한도
//! (`max_total_retries`)가 상한 역할을 합니다.

use tracing::{info, warn};

use crate::domain::{PageFetchOutcome, Phase, ScrapeError, SessionState, TerminationReason};

use super::strategy::{RecoverySettings, RecoveryStrategy, Step, StrategyKind, check_overlap, failure_for};

#[derive(Debug, Clone)]
pub struct SkipListStrategy {
    settings: RecoverySettings,
}

impl SkipListStrategy {
    pub fn new(settings: RecoverySettings) -> Self {
        Self { settings }
    }

    /// Move on to the next skipped index, or finish when none is left.
    fn next_skipped(state: &mut SessionState) -> Step {
        state.retry_count = 0;
        match state.skip_list.pop_front() {
            Some(index) => {
                info!("🔁 Retrying skipped index {} ({} remaining)", index, state.skip_list.len());
                state.current_index = index;
                Step::Continue
            }
            None => {
                info!("🏁 Skip list drained");
                Step::Completed
            }
        }
    }

    fn fail_first_pass(&self, state: &mut SessionState, error: &ScrapeError) -> Step {
        warn!("❌ [FAILED] {} (try {}/{})", error, state.retry_count + 1, self.settings.max_nb_try);
        state.record_failure(error);
        if state.retry_count >= self.settings.max_nb_try {
            state.retry_count = 0;
            state.skip_list.push_back(state.current_index);
            state.counters.skipped += 1;
            state.current_index += self.settings.index_step;
            info!(
                "⏭️ Skipping index {} -> {} ({} skipped so far)",
                state.current_index - self.settings.index_step,
                state.current_index,
                state.skip_list.len()
            );
        }
        Step::Continue
    }

    fn fail_drain(&self, state: &mut SessionState, error: &ScrapeError) -> Step {
        warn!("❌ [FAILED] {} (try {}/{})", error, state.retry_count + 1, self.settings.max_nb_try);
        state.record_failure(error);
        if state.retry_count < self.settings.max_nb_try {
            return Step::Continue;
        }

        state.retry_count = 0;
        let stuck = state.current_index;
        let Some(next) = state.skip_list.pop_front() else {
            return Step::Failed(TerminationReason::SkipListStalled {
                index: stuck,
                remaining: 1,
            });
        };
        // round-robin: 실패한 인덱스는 뒤로 보내고 다음 인덱스로
        state.skip_list.push_back(stuck);
        state.current_index = next;
        info!("🔄 Rotating skipped index {} to the back, trying {}", stuck, next);
        Step::Continue
    }
}

impl RecoveryStrategy for SkipListStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SkipList
    }

    fn on_outcome(&mut self, state: &mut SessionState, outcome: PageFetchOutcome) -> Step {
        let index = state.current_index;

        match (state.phase, outcome) {
            (Phase::FirstPass, PageFetchOutcome::LastPage) => {
                info!(
                    "🏁 Last page reached at index {} - {} skipped indices to revisit",
                    index,
                    state.skip_list.len()
                );
                state.phase = Phase::DrainingSkipList;
                Self::next_skipped(state)
            }
            (Phase::DrainingSkipList, PageFetchOutcome::LastPage) => {
                warn!("⚠️ Skipped index {index} is past the last page, nothing to collect");
                Self::next_skipped(state)
            }
            (phase, PageFetchOutcome::Success(rows)) if !rows.is_empty() => {
                if let Err(overlap) = check_overlap(state, &rows, self.settings.overlap_policy) {
                    return match phase {
                        Phase::FirstPass => self.fail_first_pass(state, &overlap),
                        Phase::DrainingSkipList => self.fail_drain(state, &overlap),
                    };
                }
                let fetched = rows.len();
                state.append(rows);
                info!("✅ Index {} -> +{} records (total {})", index, fetched, state.collected.len());
                match phase {
                    Phase::FirstPass => {
                        state.retry_count = 0;
                        state.current_index += fetched as i64;
                        Step::Continue
                    }
                    Phase::DrainingSkipList => Self::next_skipped(state),
                }
            }
            (phase, other) => {
                let error = failure_for(index, &other).unwrap_or_else(|| ScrapeError::Content {
                    index,
                    reason: format!("unexpected outcome: {other}"),
                });
                match phase {
                    Phase::FirstPass => self.fail_first_pass(state, &error),
                    Phase::DrainingSkipList => self.fail_drain(state, &error),
                }
            }
        }
    }
}
