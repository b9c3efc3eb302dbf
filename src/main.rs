use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use ledger_crawler::ScrapeService;
use ledger_crawler::application::exit_code;
use ledger_crawler::crawling::StrategyKind;
use ledger_crawler::infrastructure::logging::{init_logging_with_config, log_system_info};
use ledger_crawler::infrastructure::{AppConfig, ConfigOverrides};

#[derive(Parser, Debug)]
#[command(
    name = "ledger-crawler",
    version,
    about = "Scrape a paginated transaction table into JSON"
)]
struct Cli {
    /// Config file (toml / json / yaml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listing page; `?start=<index>` is appended
    #[arg(long)]
    root_url: Option<String>,

    /// Output JSON file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Side file for duplicates (default: duplicated-<output>)
    #[arg(long)]
    duplicates_output: Option<PathBuf>,

    /// Recovery strategy: backstep | skip_list
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Attempts per index before escalating
    #[arg(long)]
    max_nb_try: Option<u32>,

    /// Backstep strategy: steps back before giving up
    #[arg(long)]
    max_back_step: Option<u32>,

    /// Skip-list strategy: stride over a failing index
    #[arg(long)]
    index_step: Option<i64>,

    /// Skip-list strategy: session-wide failure budget (0 disables it)
    #[arg(long)]
    max_total_retries: Option<u32>,

    /// error | warn | info | debug | trace
    #[arg(long)]
    log_level: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Chrome binary
    #[arg(long)]
    chrome_path: Option<PathBuf>,
}

impl Cli {
    fn into_parts(self) -> (Option<PathBuf>, ConfigOverrides) {
        let overrides = ConfigOverrides {
            root_url: self.root_url,
            output_file: self.output,
            duplicates_file: self.duplicates_output,
            strategy: self.strategy,
            max_nb_try: self.max_nb_try,
            max_back_step: self.max_back_step,
            index_step: self.index_step,
            max_total_retries: self.max_total_retries,
            log_level: self.log_level,
            headful: self.headful,
            chrome_path: self.chrome_path,
        };
        (self.config, overrides)
    }
}

fn load_config(cli: Cli) -> Result<AppConfig> {
    let (path, overrides) = cli.into_parts();
    let mut config = AppConfig::load(path.as_deref())?;
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

/// First Ctrl-C cancels the session; collected data is still written.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C received, cancelling the session");
            cancel.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::from(exit_code::STARTUP_ERROR);
        }
    };

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("❌ Failed to initialize logging: {e:#}");
        return ExitCode::from(exit_code::STARTUP_ERROR);
    }
    log_system_info();

    let service = ScrapeService::from_config(config);
    let fetcher = match service.launch_fetcher().await {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("❌ Startup failed: {:#}", e);
            return ExitCode::from(exit_code::STARTUP_ERROR);
        }
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match service.run(fetcher, cancel).await {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            error!("❌ Scrape session failed: {:#}", e);
            ExitCode::from(exit_code::PERSIST_ERROR)
        }
    }
}
