//! Failure taxonomy of a scrape session.
//!
//! [`ScrapeError`] covers per-fetch failures; none of them ends the session on
//! its own. [`TerminationReason`] covers the ways a session can stop short.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("Page failed to load at index {index}: {message}")]
    Transport { index: i64, message: String },

    #[error("No usable rows at index {index}: {reason}")]
    Content { index: i64, reason: String },

    #[error("Rows at index {index} overlap collected data (transaction '{key}')")]
    Overlap { index: i64, key: String },
}

impl ScrapeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } => FailureKind::Transport,
            Self::Content { .. } => FailureKind::Content,
            Self::Overlap { .. } => FailureKind::Overlap,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            Self::Transport { index, .. } | Self::Content { index, .. } | Self::Overlap { index, .. } => {
                *index
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Content,
    Overlap,
}

/// Why a session ended without reaching the last page.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    #[error("backstep budget exhausted ({backsteps} steps back, index {index})")]
    BackstepBudgetExhausted { backsteps: u32, index: i64 },

    #[error("pagination index went negative ({index})")]
    NegativeIndex { index: i64 },

    #[error("skipped index {index} still failing with no other index left to rotate")]
    SkipListStalled { index: i64, remaining: usize },

    #[error("total retry budget of {budget} failures exhausted")]
    RetryBudgetExhausted { budget: u32 },

    #[error("session cancelled")]
    Cancelled,
}

impl TerminationReason {
    /// Process exit code reported for this termination.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_index() {
        let err = ScrapeError::Overlap { index: 12, key: "Transaction 3".into() };
        assert_eq!(err.kind(), FailureKind::Overlap);
        assert_eq!(err.index(), 12);
        assert!(err.to_string().contains("Transaction 3"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(TerminationReason::Cancelled.exit_code(), 130);
        assert_eq!(TerminationReason::NegativeIndex { index: -1 }.exit_code(), 1);
    }
}
