//! End-of-session summary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::crawling::{SessionResult, StrategyKind};
use crate::domain::{DedupOutcome, TerminationReason};
use crate::infrastructure::WrittenFiles;

/// Process exit codes for runs that end without a [`SessionReport`].
pub mod exit_code {
    /// Bad settings, logging setup or Chrome launch; nothing was written
    pub const STARTUP_ERROR: u8 = 2;
    /// The session ran but its output could not be written
    pub const PERSIST_ERROR: u8 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub strategy: StrategyKind,
    pub status: ReportStatus,
    pub termination: Option<TerminationReason>,
    /// Records accepted during the session, before the final pass
    pub collected: usize,
    pub unique: usize,
    pub duplicated: usize,
    pub failed_requests: u64,
    pub error_requests: u64,
    pub overlap_rejections: u64,
    pub backsteps: u64,
    pub skipped_indices: u64,
    /// Skipped indices still unrecovered at the end
    pub pending_skips: Vec<i64>,
    pub iterations: u64,
    pub last_index: i64,
    pub elapsed_ms: u64,
    pub files: Option<WrittenFiles>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn new(result: &SessionResult, dedup: &DedupOutcome, files: Option<WrittenFiles>) -> Self {
        let termination = result.failure_reason().cloned();
        let status = match &termination {
            None => ReportStatus::Completed,
            Some(TerminationReason::Cancelled) => ReportStatus::Cancelled,
            Some(_) => ReportStatus::Failed,
        };
        let counters = &result.counters;

        Self {
            session_id: result.session_id.clone(),
            strategy: result.strategy,
            status,
            termination,
            collected: result.records().len(),
            unique: dedup.unique.len(),
            duplicated: dedup.duplicated.len(),
            failed_requests: counters.failed,
            error_requests: counters.errored,
            overlap_rejections: counters.overlaps,
            backsteps: counters.backsteps,
            skipped_indices: counters.skipped,
            pending_skips: result.pending_skips.clone(),
            iterations: counters.iterations,
            last_index: result.last_index,
            elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            files,
            finished_at: Utc::now(),
        }
    }

    /// 0 completed, 1 failed, 130 cancelled
    pub fn exit_code(&self) -> u8 {
        self.termination.as_ref().map_or(0, TerminationReason::exit_code)
    }

    pub fn log(&self) {
        info!("---------------");
        match &self.termination {
            None => info!("📊 Session {} {} ({})", self.session_id, self.status, self.strategy),
            Some(reason) => warn!(
                "📊 Session {} {} ({}): {}",
                self.session_id, self.status, self.strategy, reason
            ),
        }
        info!("\tNumber of transactions: {}", self.unique);
        info!("\tCollected transactions: {}", self.collected);
        info!("\tDuplicated transactions: {}", self.duplicated);
        info!("\tNumber of failed request: {}", self.failed_requests);
        info!("\tNumber of error request: {}", self.error_requests);
        info!("\tOverlap rejections: {}", self.overlap_rejections);
        match self.strategy {
            StrategyKind::Backstep => info!("\tBacksteps: {}", self.backsteps),
            StrategyKind::SkipList => info!(
                "\tNumber of skipped index: {} ({} unrecovered)",
                self.skipped_indices,
                self.pending_skips.len()
            ),
        }
        info!("\tIterations: {} (last index {})", self.iterations, self.last_index);
        info!("\tTotal time: {} ms", self.elapsed_ms);
        if let Some(files) = &self.files {
            info!("\tOutput result: {}", files.output.display());
            if let Some(duplicates) = &files.duplicates {
                info!("\tDuplicated transactions: {}", duplicates.display());
            }
        }
    }
}
