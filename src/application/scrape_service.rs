//! 스크래핑 세션 실행 서비스
//!
//! 설정 → 복구 전략 → 컨트롤러 → 최종 중복 제거 → 저장 → 리포트 순서로
//! 한 번의 세션을 실행합니다. 실패/취소된 세션도 수집한 데이터는 저장합니다.

use anyhow::{Context, Result, anyhow};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::crawling::{PageFetcher, PaginationController, build_strategy};
use crate::domain::dedup_pass;
use crate::infrastructure::{AppConfig, BrowserPageFetcher, JsonFileSink, ResultSink, launch_browser};

use super::report::SessionReport;

pub struct ScrapeService<S: ResultSink> {
    config: AppConfig,
    sink: S,
}

impl ScrapeService<JsonFileSink> {
    /// Service writing to the configured output and duplicates files.
    pub fn from_config(config: AppConfig) -> Self {
        let sink = JsonFileSink::new(
            config.scraper.output_file.clone(),
            config.scraper.duplicates_path(),
        );
        Self::new(config, sink)
    }
}

impl<S: ResultSink> ScrapeService<S> {
    pub fn new(config: AppConfig, sink: S) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Launch Chrome and build the page fetcher for the configured site.
    pub async fn launch_fetcher(&self) -> Result<BrowserPageFetcher> {
        let browser_config = self.config.browser.clone();
        let browser = tokio::task::spawn_blocking(move || launch_browser(&browser_config))
            .await
            .map_err(|e| anyhow!("Blocking task panicked: {}", e))??;
        BrowserPageFetcher::new(browser, &self.config)
    }

    /// Run one session with `fetcher` until it completes, fails or `cancel` fires.
    pub async fn run<F: PageFetcher>(&self, fetcher: F, cancel: CancellationToken) -> Result<SessionReport> {
        let scraper = &self.config.scraper;
        info!(
            "🔧 {} strategy, max_nb_try {}, max_back_step {}, index_step {}",
            scraper.strategy, scraper.max_nb_try, scraper.max_back_step, scraper.index_step
        );

        let strategy = build_strategy(scraper.strategy, self.config.recovery_settings());
        let result = PaginationController::new(fetcher, strategy, self.config.controller_settings())
            .with_cancellation(cancel)
            .run()
            .await;

        let dedup = dedup_pass(result.records(), scraper.final_policy);
        let files = match self.sink.persist(&dedup).await {
            Ok(files) => files,
            Err(e) => {
                error!("❌ Failed to persist {} records: {:#}", dedup.unique.len(), e);
                return Err(e).context("persisting scrape results");
            }
        };

        let report = SessionReport::new(&result, &dedup, Some(files));
        report.log();
        Ok(report)
    }
}
