//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (`defaults` module, via `Default` impls)
//! 2. Optional config file (`ledger-crawler.{toml,json,yaml}` or `--config`)
//! 3. Environment variables, e.g. `LEDGER_CRAWLER__SCRAPER__MAX_NB_TRY=3`
//! 4. Command line overrides ([`ConfigOverrides`])

#![allow(clippy::derivable_impls)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::crawling::{ControllerSettings, RecoverySettings, StrategyKind};
use crate::domain::DuplicatePolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub browser: BrowserConfig,
    pub logging: LoggingConfig,
}

/// Pagination and recovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Listing page; the pagination offset is appended as `?start=<index>`
    pub root_url: String,

    /// JSON array of unique records
    pub output_file: PathBuf,

    /// Exact duplicates found by the final pass. Defaults to
    /// `duplicated-<output file name>` next to the output file.
    pub duplicates_file: Option<PathBuf>,

    pub strategy: StrategyKind,

    /// Attempts per index before the strategy escalates
    pub max_nb_try: u32,

    /// Backstep strategy: steps back before giving up
    pub max_back_step: u32,

    /// Skip-list strategy: stride used to jump over a failing index
    pub index_step: i64,

    /// Skip-list strategy: session-wide failure budget, `0` disables it
    pub max_total_retries: u32,

    pub start_index: i64,

    pub fetch_timeout_secs: u64,

    /// Pause between two fetches
    pub request_delay_ms: u64,

    /// Policy of the overlap guard run before every merge
    pub overlap_policy: DuplicatePolicy,

    /// Policy of the deduplication pass run on the collected records
    pub final_policy: DuplicatePolicy,
}

/// Headless Chrome settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Chrome binary; falls back to `CHROME_PATH`, then auto-detection
    pub chrome_path: Option<PathBuf>,

    /// `None` enables the sandbox except inside containers
    pub sandbox: Option<bool>,

    /// Wait after navigation (and after clicking generate) before extracting
    pub settle_ms: u64,

    pub navigation_timeout_secs: u64,

    pub window_width: u32,
    pub window_height: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs (file output)
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    pub file_name: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            root_url: defaults::ROOT_URL.to_string(),
            output_file: PathBuf::from(defaults::OUTPUT_FILE),
            duplicates_file: None,
            strategy: StrategyKind::default(),
            max_nb_try: defaults::MAX_NB_TRY,
            max_back_step: defaults::MAX_BACK_STEP,
            index_step: defaults::INDEX_STEP,
            max_total_retries: defaults::MAX_TOTAL_RETRIES,
            start_index: 0,
            fetch_timeout_secs: defaults::FETCH_TIMEOUT_SECS,
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            overlap_policy: DuplicatePolicy::KeyOnly,
            final_policy: DuplicatePolicy::FullField,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            sandbox: None,
            settle_ms: defaults::SETTLE_MS,
            navigation_timeout_secs: defaults::NAVIGATION_TIMEOUT_SECS,
            window_width: defaults::WINDOW_WIDTH,
            window_height: defaults::WINDOW_HEIGHT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the loaded value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_url: Option<String>,
    pub output_file: Option<PathBuf>,
    pub duplicates_file: Option<PathBuf>,
    pub strategy: Option<StrategyKind>,
    pub max_nb_try: Option<u32>,
    pub max_back_step: Option<u32>,
    pub index_step: Option<i64>,
    pub max_total_retries: Option<u32>,
    pub log_level: Option<String>,
    pub headful: bool,
    pub chrome_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load defaults, then the config file, then the environment.
    ///
    /// Without an explicit path, `<user config dir>/ledger-crawler/config.*`
    /// and `./ledger-crawler.*` are read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Self::environment())
    }

    /// `LEDGER_CRAWLER__SECTION__KEY` variables, values parsed as numbers/bools
    /// where possible.
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix(defaults::ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// [`AppConfig::load`] with an explicit environment source.
    pub fn load_with_env(path: Option<&Path>, environment: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        match path {
            Some(path) => builder = builder.add_source(config::File::from(path).required(true)),
            None => {
                if let Some(user_file) = Self::user_config_file() {
                    builder = builder.add_source(config::File::from(user_file).required(false));
                }
                builder = builder
                    .add_source(config::File::with_name(defaults::CONFIG_FILE_STEM).required(false));
            }
        }

        let settings = builder
            .add_source(environment)
            .build()?;

        let config: Self = settings.try_deserialize()?;
        if let Some(path) = path {
            info!("📋 Configuration loaded from {}", path.display());
        }
        Ok(config)
    }

    /// Extension-less stem; the `config` crate probes toml/json/yaml.
    pub fn user_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::CONFIG_FILE_STEM).join("config"))
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            root_url,
            output_file,
            duplicates_file,
            strategy,
            max_nb_try,
            max_back_step,
            index_step,
            max_total_retries,
            log_level,
            headful,
            chrome_path,
        } = overrides;

        let scraper = &mut self.scraper;
        if let Some(v) = root_url {
            scraper.root_url = v;
        }
        if let Some(v) = output_file {
            scraper.output_file = v;
        }
        if let Some(v) = duplicates_file {
            scraper.duplicates_file = Some(v);
        }
        if let Some(v) = strategy {
            scraper.strategy = v;
        }
        if let Some(v) = max_nb_try {
            scraper.max_nb_try = v;
        }
        if let Some(v) = max_back_step {
            scraper.max_back_step = v;
        }
        if let Some(v) = index_step {
            scraper.index_step = v;
        }
        if let Some(v) = max_total_retries {
            scraper.max_total_retries = v;
        }
        if let Some(v) = log_level {
            self.logging.level = v;
        }
        if headful {
            self.browser.headless = false;
        }
        if let Some(v) = chrome_path {
            self.browser.chrome_path = Some(v);
        }
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scraper = &self.scraper;

        for (name, value) in [
            ("max_nb_try", i64::from(scraper.max_nb_try)),
            ("max_back_step", i64::from(scraper.max_back_step)),
            ("index_step", scraper.index_step),
        ] {
            if value < 1 {
                return Err(ConfigError::Validation {
                    message: format!("scraper.{name} must be at least 1 (got {value})"),
                });
            }
        }

        if scraper.fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "scraper.fetch_timeout_secs must be greater than 0".to_string(),
            });
        }

        if scraper.start_index < 0 {
            return Err(ConfigError::Validation {
                message: format!("scraper.start_index cannot be negative (got {})", scraper.start_index),
            });
        }

        let url = Url::parse(&scraper.root_url).map_err(|e| ConfigError::Validation {
            message: format!("scraper.root_url '{}' is not a valid URL: {e}", scraper.root_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                message: format!("scraper.root_url must be http(s), got '{}'", url.scheme()),
            });
        }

        if scraper.output_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "scraper.output_file cannot be empty".to_string(),
            });
        }

        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::Validation {
                message: "at least one of logging.console_output / logging.file_output must be enabled"
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn recovery_settings(&self) -> RecoverySettings {
        RecoverySettings {
            max_nb_try: self.scraper.max_nb_try,
            max_back_step: self.scraper.max_back_step,
            index_step: self.scraper.index_step,
            overlap_policy: self.scraper.overlap_policy,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            start_index: self.scraper.start_index,
            fetch_timeout: Duration::from_secs(self.scraper.fetch_timeout_secs),
            request_delay: Duration::from_millis(self.scraper.request_delay_ms),
            max_total_retries: (self.scraper.max_total_retries > 0).then_some(self.scraper.max_total_retries),
        }
    }
}

impl ScraperConfig {
    /// Explicit duplicates file, or `duplicated-<name>` beside the output.
    pub fn duplicates_path(&self) -> PathBuf {
        if let Some(path) = &self.duplicates_file {
            return path.clone();
        }
        let name = self
            .output_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| defaults::OUTPUT_FILE.to_string());
        self.output_file.with_file_name(format!("duplicated-{name}"))
    }
}

/// Default configuration values
pub mod defaults {
    use crate::domain::constants::{recovery, site};

    pub const CONFIG_FILE_STEM: &str = "ledger-crawler";
    pub const ENV_PREFIX: &str = "LEDGER_CRAWLER";

    pub const ROOT_URL: &str = site::ROOT_URL;
    pub const OUTPUT_FILE: &str = "result.json";

    pub const MAX_NB_TRY: u32 = recovery::MAX_NB_TRY;
    pub const MAX_BACK_STEP: u32 = recovery::MAX_BACK_STEP;
    pub const INDEX_STEP: i64 = recovery::INDEX_STEP;
    pub const MAX_TOTAL_RETRIES: u32 = recovery::MAX_TOTAL_RETRIES;

    pub const FETCH_TIMEOUT_SECS: u64 = 60;
    pub const REQUEST_DELAY_MS: u64 = 0;

    pub const SETTLE_MS: u64 = 1000;
    pub const NAVIGATION_TIMEOUT_SECS: u64 = 30;
    pub const WINDOW_WIDTH: u32 = 1280;
    pub const WINDOW_HEIGHT: u32 = 900;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "ledger-crawler.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scraper.max_nb_try, 5);
        assert_eq!(config.scraper.strategy, StrategyKind::Backstep);
        assert_eq!(config.scraper.final_policy, DuplicatePolicy::FullField);
        assert_eq!(config.controller_settings().max_total_retries, Some(1000));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_overrides(ConfigOverrides {
            strategy: Some(StrategyKind::SkipList),
            max_nb_try: Some(2),
            output_file: Some(PathBuf::from("out/data.json")),
            headful: true,
            ..ConfigOverrides::default()
        });
        assert_eq!(config.scraper.strategy, StrategyKind::SkipList);
        assert_eq!(config.recovery_settings().max_nb_try, 2);
        assert!(!config.browser.headless);
        assert_eq!(config.scraper.duplicates_path(), PathBuf::from("out/duplicated-data.json"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.scraper.max_nb_try = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        let mut config = AppConfig::default();
        config.scraper.root_url = "ftp://example.com/list".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.console_output = false;
        config.logging.file_output = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_budget_disables_it() {
        let mut config = AppConfig::default();
        config.scraper.max_total_retries = 0;
        assert_eq!(config.controller_settings().max_total_retries, None);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[scraper]\nstrategy = \"skip_list\"\nindex_step = 25\n\n[browser]\nsettle_ms = 250"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.scraper.strategy, StrategyKind::SkipList);
        assert_eq!(config.scraper.index_step, 25);
        assert_eq!(config.scraper.max_back_step, 5);
        assert_eq!(config.browser.settle_ms, 250);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_environment_layer_overrides_defaults() {
        let vars: config::Map<String, String> = [
            ("LEDGER_CRAWLER__SCRAPER__STRATEGY", "skip_list"),
            ("LEDGER_CRAWLER__SCRAPER__MAX_NB_TRY", "3"),
            ("LEDGER_CRAWLER__BROWSER__HEADLESS", "false"),
            ("UNRELATED__SCRAPER__MAX_NB_TRY", "9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = AppConfig::load_with_env(None, AppConfig::environment().source(Some(vars))).unwrap();
        assert_eq!(config.scraper.strategy, StrategyKind::SkipList);
        assert_eq!(config.scraper.max_nb_try, 3);
        assert!(!config.browser.headless);
        assert_eq!(config.scraper.max_back_step, 5);
    }

    #[test]
    fn test_environment_wins_over_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scraper]\nstrategy = \"backstep\"\nindex_step = 25").unwrap();
        let vars: config::Map<String, String> =
            [("LEDGER_CRAWLER__SCRAPER__STRATEGY".to_string(), "skip_list".to_string())]
                .into_iter()
                .collect();

        let config =
            AppConfig::load_with_env(Some(file.path()), AppConfig::environment().source(Some(vars))).unwrap();
        assert_eq!(config.scraper.strategy, StrategyKind::SkipList);
        assert_eq!(config.scraper.index_step, 25);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/ledger.toml"))).is_err());
    }
}
