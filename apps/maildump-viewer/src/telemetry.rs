//! Logging setup. The viewer owns the terminal, so records only go to a file.

use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "MAILDUMP_VIEWER_LOG_FILTER";
pub const TRACE_DEPS_ENV: &str = "MAILDUMP_VIEWER_TRACE_DEPS";

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

static INIT: OnceLock<()> = OnceLock::new();
static GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Installs the global subscriber. Without a log file nothing is recorded.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if INIT.get().is_some() {
        return Ok(());
    }
    let Some(path) = &config.file else {
        INIT.set(()).ok();
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| InitError::Io {
            path: path.clone(),
            source,
        })?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let env_filter = build_env_filter(config.level.to_filter());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_level(true)
        .with_target(config.level >= LogLevel::Debug)
        .with_thread_names(config.level >= LogLevel::Trace)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;

    let _ = GUARD.set(Some(guard));
    INIT.set(()).ok();
    Ok(())
}

fn build_env_filter(level: LevelFilter) -> EnvFilter {
    if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
        return EnvFilter::new(filter);
    }
    EnvFilter::new(default_filter_for(level, allow_dependency_traces()))
}

const TRACE_DEP_TARGETS: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "reqwest_eventsource",
    "eventsource_stream",
    "rustls",
    "mio",
    "h2",
];

fn default_filter_for(level: LevelFilter, allow_deps: bool) -> String {
    let base = match level {
        LevelFilter::TRACE => "info,maildump_viewer=trace,mailbox_live=trace",
        LevelFilter::DEBUG => "info,maildump_viewer=debug,mailbox_live=debug",
        LevelFilter::INFO => "info",
        LevelFilter::WARN => "warn",
        LevelFilter::ERROR => "error",
        LevelFilter::OFF => "off",
    };
    if level == LevelFilter::TRACE && !allow_deps {
        let mut filter = base.to_owned();
        for target in TRACE_DEP_TARGETS {
            filter.push(',');
            filter.push_str(target);
            filter.push_str("=info");
        }
        filter
    } else {
        base.to_owned()
    }
}

fn allow_dependency_traces() -> bool {
    std::env::var(TRACE_DEPS_ENV)
        .map(|v| v != "0" && !v.is_empty())
        .unwrap_or(false)
}
