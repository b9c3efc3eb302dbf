//! 페이지네이션 복구 전략 인터페이스
//!
//! 두 전략(backstep / skip-list)은 같은 요구사항을 다른 trade-off로 해결합니다:
//! 불안정한 페이지 경계에서 데이터 손실이나 중복 없이 복구하기.
//! 컨트롤러는 fetch 결과를 전략에 넘기고, 전략은 세션 상태를 갱신한 뒤
//! 다음 행동([`Step`])을 돌려줍니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::constants::recovery;
use crate::domain::{
    DuplicatePolicy, PageFetchOutcome, ScrapeError, SessionState, TerminationReason,
    TransactionRecord, find_overlap,
};

use super::backstep::BackstepStrategy;
use super::skip_list::SkipListStrategy;

/// What the controller does after a strategy consumed an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Fetch `state.current_index` next
    Continue,
    Completed,
    Failed(TerminationReason),
}

pub trait RecoveryStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Consume one fetch outcome for `state.current_index`.
    fn on_outcome(&mut self, state: &mut SessionState, outcome: PageFetchOutcome) -> Step;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Bounded backstep (retry, then step back one offset)
    #[default]
    Backstep,
    /// Skip failing offsets by a fixed stride and revisit them round-robin
    SkipList,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backstep => write!(f, "backstep"),
            Self::SkipList => write!(f, "skip_list"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "backstep" | "back_step" => Ok(Self::Backstep),
            "skip_list" | "skip" => Ok(Self::SkipList),
            other => Err(format!("unknown recovery strategy: {other}")),
        }
    }
}

/// Knobs shared by both strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySettings {
    pub max_nb_try: u32,
    pub max_back_step: u32,
    pub index_step: i64,
    pub overlap_policy: DuplicatePolicy,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_nb_try: recovery::MAX_NB_TRY,
            max_back_step: recovery::MAX_BACK_STEP,
            index_step: recovery::INDEX_STEP,
            overlap_policy: DuplicatePolicy::KeyOnly,
        }
    }
}

pub fn build_strategy(kind: StrategyKind, settings: RecoverySettings) -> Box<dyn RecoveryStrategy> {
    match kind {
        StrategyKind::Backstep => Box::new(BackstepStrategy::new(settings)),
        StrategyKind::SkipList => Box::new(SkipListStrategy::new(settings)),
    }
}

/// Failure classification for every outcome that did not yield usable rows.
pub(crate) fn failure_for(index: i64, outcome: &PageFetchOutcome) -> Option<ScrapeError> {
    match outcome {
        PageFetchOutcome::FetchError(message) => Some(ScrapeError::Transport {
            index,
            message: message.clone(),
        }),
        PageFetchOutcome::EmptyNoContent => Some(ScrapeError::Content {
            index,
            reason: "no table rows".to_string(),
        }),
        PageFetchOutcome::Success(rows) if rows.is_empty() => Some(ScrapeError::Content {
            index,
            reason: "no parsable data rows".to_string(),
        }),
        PageFetchOutcome::Success(_) | PageFetchOutcome::LastPage => None,
    }
}

/// Overlap guard run before every merge.
pub(crate) fn check_overlap(
    state: &SessionState,
    incoming: &[TransactionRecord],
    policy: DuplicatePolicy,
) -> Result<(), ScrapeError> {
    match find_overlap(&state.collected, incoming, policy) {
        Some(record) => Err(ScrapeError::Overlap {
            index: state.current_index,
            key: record.key().to_string(),
        }),
        None => Ok(()),
    }
}
