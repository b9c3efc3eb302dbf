//! 스크래핑 세션 상태
//!
//! 반복마다 컨트롤러가 소유한 단일 [`SessionState`] 값을 전략에 넘겨 갱신합니다.
//! 실패/에러/백스텝 카운터도 전부 여기에 모여 있습니다.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{FailureKind, ScrapeError};
use super::transaction::TransactionRecord;

/// Skip-list strategy 진행 단계 (backstep 전략은 항상 `FirstPass`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    FirstPass,
    DrainingSkipList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Fetches performed
    pub iterations: u64,
    /// Content and overlap failures
    pub failed: u64,
    /// Transport failures (including timeouts)
    pub errored: u64,
    /// Subset of `failed` caused by overlapping rows
    pub overlaps: u64,
    pub backsteps: u64,
    /// Indices pushed onto the skip list
    pub skipped: u64,
    pub failures_by_index: BTreeMap<i64, u32>,
}

impl SessionCounters {
    pub fn total_failures(&self) -> u64 {
        self.failed + self.errored
    }

    pub fn failures_at(&self, index: i64) -> u32 {
        self.failures_by_index.get(&index).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    /// Pagination offset (`?start=<index>`)
    pub current_index: i64,
    /// Attempts already failed at `current_index`
    pub retry_count: u32,
    pub backstep_count: u32,
    pub skip_list: VecDeque<i64>,
    pub phase: Phase,
    pub collected: Vec<TransactionRecord>,
    pub counters: SessionCounters,
}

impl SessionState {
    pub fn new(start_index: i64) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            current_index: start_index,
            retry_count: 0,
            backstep_count: 0,
            skip_list: VecDeque::new(),
            phase: Phase::FirstPass,
            collected: Vec::new(),
            counters: SessionCounters::default(),
        }
    }

    pub fn record_iteration(&mut self) {
        self.counters.iterations += 1;
    }

    /// Tally a failed fetch and bump the retry count of the current index.
    pub fn record_failure(&mut self, error: &ScrapeError) {
        match error.kind() {
            FailureKind::Transport => self.counters.errored += 1,
            FailureKind::Content => self.counters.failed += 1,
            FailureKind::Overlap => {
                self.counters.failed += 1;
                self.counters.overlaps += 1;
            }
        }
        *self
            .counters
            .failures_by_index
            .entry(error.index())
            .or_insert(0) += 1;
        self.retry_count += 1;
    }

    /// Append freshly accepted rows; returns how many were added.
    pub fn append(&mut self, rows: Vec<TransactionRecord>) -> usize {
        let added = rows.len();
        self.collected.extend(rows);
        added
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_tallies_by_kind() {
        let mut state = SessionState::new(5);
        state.record_failure(&ScrapeError::Transport { index: 5, message: "timeout".into() });
        state.record_failure(&ScrapeError::Overlap { index: 5, key: "Transaction 1".into() });
        state.record_failure(&ScrapeError::Content { index: 6, reason: "empty".into() });

        assert_eq!(state.counters.errored, 1);
        assert_eq!(state.counters.failed, 2);
        assert_eq!(state.counters.overlaps, 1);
        assert_eq!(state.counters.total_failures(), 3);
        assert_eq!(state.counters.failures_at(5), 2);
        assert_eq!(state.counters.failures_at(6), 1);
        assert_eq!(state.retry_count, 3);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionState::default().session_id, SessionState::default().session_id);
    }
}
