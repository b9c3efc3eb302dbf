//! Logging system configuration and initialization
//!
//! - Console output with local timestamps
//! - Optional file output through a non-blocking `tracing-appender` writer
//! - Structured JSON file logs (optional)
//! - `RUST_LOG` overrides the configured level

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Local time formatter for log lines
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Directory the file layer writes to for `config`.
pub fn resolve_log_directory(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(get_log_directory)
}

/// Filter for the configured level; noisy dependencies are held back unless
/// the level is `trace`.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for directive in [
            "headless_chrome=warn",
            "tungstenite=warn",
            "html5ever=error",
            "selectors=warn",
        ] {
            filter = filter.add_directive(directive.parse()?);
        }
        filter = filter.add_directive(format!("ledger_crawler={}", config.level).parse()?);
    }

    Ok(filter)
}

/// Initialize the global subscriber. Fails if called twice in one process.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(config)?;
    let registry = Registry::default().with(env_filter);

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
    });

    let mut log_dir = None;
    let (plain_file_layer, json_file_layer) = if config.file_output {
        let dir = resolve_log_directory(config);
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", dir, e))?;

        let file_appender = rolling::never(&dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);
        log_dir = Some(dir);

        if config.json_format {
            let layer = fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            (None, Some(layer))
        } else {
            // time + level + message only
            let layer = fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false);
            (Some(layer), None)
        }
    } else {
        (None, None)
    };

    if console_layer.is_none() && log_dir.is_none() {
        return Err(anyhow!("No logging output configured"));
    }

    registry
        .with(console_layer)
        .with(plain_file_layer)
        .with(json_file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging system initialized (level: {})", config.level);
    if let Some(dir) = log_dir {
        info!(
            "Log file: {:?} (json: {})",
            dir.join(&config.file_name),
            config.json_format
        );
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Ledger Crawler v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
}
