//! Logging bootstrap.
//!
//! The core emits diagnostics through the `log` facade. Messages carry
//! identifiers and outcomes only, never clinical payload. Hosts that want the
//! core to own the backend call [`init_logging`] once at startup; opening a
//! database never touches logger state.

use std::path::PathBuf;

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::info;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::config::LogConfig;

const LOG_FILE_BASENAME: &str = "vetpath";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    directory: Option<PathBuf>,
    _handle: LoggerHandle,
}

/// Logging setup errors.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Unsupported log level: {0}")]
    Level(String),

    #[error("Log directory must be absolute: {0}")]
    RelativeDirectory(String),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logger backend error: {0}")]
    Backend(#[from] FlexiLoggerError),

    #[error("Logging already initialized with {0}")]
    AlreadyInitialized(String),
}

/// Start the logger backend.
///
/// Repeating the call with the same settings is a no-op; different settings
/// after the first call are rejected.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let level = normalize_level(&config.level)?;
    let directory = match &config.directory {
        Some(dir) if !dir.is_absolute() => {
            return Err(LoggingError::RelativeDirectory(dir.display().to_string()))
        }
        other => other.clone(),
    };

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, LoggingError> {
        let logger = Logger::try_with_str(level)?;
        let handle = match &directory {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                logger
                    .log_to_file(
                        FileSpec::default()
                            .directory(dir.as_path())
                            .basename(LOG_FILE_BASENAME),
                    )
                    .rotate(
                        Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(MAX_LOG_FILES),
                    )
                    .write_mode(WriteMode::BufferAndFlush)
                    .append()
                    .format_for_files(flexi_logger::detailed_format)
                    .start()?
            }
            None => logger.log_to_stderr().start()?,
        };

        info!(
            "event=logging_init level={} version={}",
            level,
            env!("CARGO_PKG_VERSION")
        );

        Ok(LoggingState {
            level,
            directory: directory.clone(),
            _handle: handle,
        })
    })?;

    if state.level != level || state.directory != directory {
        return Err(LoggingError::AlreadyInitialized(format!(
            "level `{}` and directory `{}`",
            state.level,
            state
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "stderr".into())
        )));
    }

    Ok(())
}

/// Active logger settings, or `None` before [`init_logging`] succeeds.
pub fn logging_status() -> Option<(&'static str, Option<PathBuf>)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.directory.clone()))
}

fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::Level(other.to_string())),
    }
}
