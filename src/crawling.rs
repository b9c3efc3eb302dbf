//! # Crawling Domain Module
//!
//! Modern Rust 2024 + Clean Architecture
//! - 명시적 모듈 구조 (mod.rs 비사용)
//! - 페이지네이션 복구 루프는 브라우저에 의존하지 않음 (`PageFetcher` 추상화)
//! - 복구 전략은 `RecoveryStrategy` 로 교체 가능

pub mod backstep;
pub mod controller;
pub mod fetcher;
pub mod skip_list;
pub mod strategy;

// Clean re-exports
pub use backstep::BackstepStrategy;
pub use controller::{ControllerSettings, PaginationController, ScrapeOutcome, SessionResult};
pub use fetcher::PageFetcher;
pub use skip_list::SkipListStrategy;
pub use strategy::{RecoverySettings, RecoveryStrategy, Step, StrategyKind, build_strategy};
