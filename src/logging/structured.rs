//! Subscriber setup for forgetme
//!
//! Human-readable events go to stderr so that reports printed on stdout stay
//! machine-readable. When `logging.local_enabled` is set, the same events are also
//! written as JSON lines to a rolling file in `logging.local_path`.
//!
//! # Example
//!
//! ```no_run
//! use forgetme::config::LoggingConfig;
//! use forgetme::logging::init_logging;
//!
//! let guard = init_logging("info", &LoggingConfig::default()).expect("logging");
//! // ... run the command ...
//! drop(guard);
//! ```

use crate::config::LoggingConfig;
use crate::domain::{ForgetError, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log file name prefix inside `logging.local_path`
const LOG_FILE_NAME: &str = "forgetme.log";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Keeps the non-blocking file writer alive
///
/// Buffered events are flushed when the guard is dropped, so `main` holds it until
/// just before exiting.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over `level` when it is set.
///
/// # Errors
///
/// Returns [`ForgetError::Configuration`] for an unknown level or when the log
/// directory cannot be created.
pub fn init_logging(level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let level = parse_log_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let mut layers = vec![console_layer(filter.clone())];
    let mut file_guard = None;

    if config.local_enabled {
        let (layer, guard) = file_layer(config, filter)?;
        layers.push(layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry().with(layers).init();

    tracing::debug!(
        local_enabled = config.local_enabled,
        local_path = %config.local_path,
        rotation = %config.local_rotation,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn console_layer<S>(filter: EnvFilter) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter)
        .boxed()
}

fn file_layer<S>(config: &LoggingConfig, filter: EnvFilter) -> Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(&config.local_path).map_err(|e| {
        ForgetError::Configuration(format!(
            "Failed to create log directory {}: {e}",
            config.local_path
        ))
    })?;

    let appender = RollingFileAppender::new(
        parse_rotation(&config.local_rotation),
        &config.local_path,
        LOG_FILE_NAME,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(writer)
        .with_filter(filter)
        .boxed();

    Ok((layer, guard))
}

fn default_directive(level: Level) -> String {
    format!("forgetme={}", level.as_str().to_lowercase())
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    if level.trim().is_empty() || level.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid_level(level));
    }
    Level::from_str(level).map_err(|_| invalid_level(level))
}

fn invalid_level(level: &str) -> ForgetError {
    ForgetError::Configuration(format!(
        "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
    ))
}
