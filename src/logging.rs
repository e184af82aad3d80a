//! Tracing setup for the CLI.
//!
//! Log lines always go to stderr so command output on stdout stays clean.
//! With `[logging] to_file` on, each run also writes a plain-text file under
//! the app's `logs/` directory; only the newest `retained_files` are kept.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs;
use crate::config::LoggingConfig;

const RUN_FILE_PREFIX: &str = "delay-dashboard-";
const RUN_FILE_SUFFIX: &str = ".log";
const FALLBACK_FILTER: &str = "info";

static INSTALLED: OnceLock<Installed> = OnceLock::new();

struct Installed {
    destination: LogDestination,
    _file_guard: Option<WorkerGuard>,
}

/// Problems preparing the per-run log file.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log directory unavailable: {0}")]
    Dir(#[from] app_dirs::AppDirError),
    #[error("Failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to list log directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file name: {0}")]
    FormatTime(#[from] time::error::Format),
}

/// Where this run's log lines end up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogDestination {
    Stderr,
    StderrAndFile(PathBuf),
}

/// Install the global subscriber described by `config`.
///
/// Never fails: a bad filter directive falls back to `info` and a log file
/// that cannot be prepared leaves stderr as the only destination. Both are
/// reported as warnings once the subscriber is live. Later calls return the
/// destination chosen by the first.
pub fn init(config: &LoggingConfig) -> LogDestination {
    if let Some(installed) = INSTALLED.get() {
        return installed.destination.clone();
    }

    let (filter, filter_problem) = build_filter(&config.filter);
    let run_file = config.to_file.then(|| {
        app_dirs::logs_dir()
            .map_err(LoggingError::from)
            .and_then(|dir| open_run_file(&dir, now_local_or_utc(), config.retained_files))
    });

    let timer = build_timer();
    let console_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stderr);
    let (file_layer, file_guard, destination, file_problem) = match run_file {
        Some(Ok(RunFile { path, file })) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(writer);
            (Some(layer), Some(guard), LogDestination::StderrAndFile(path), None)
        }
        Some(Err(err)) => (None, None, LogDestination::Stderr, Some(err)),
        None => (None, None, LogDestination::Stderr, None),
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Someone else owns the global subscriber; our layers are dropped.
        return LogDestination::Stderr;
    }
    let _ = INSTALLED.set(Installed {
        destination: destination.clone(),
        _file_guard: file_guard,
    });

    if let Some(problem) = filter_problem {
        tracing::warn!("{problem}");
    }
    match (&destination, file_problem) {
        (LogDestination::StderrAndFile(path), _) => {
            tracing::info!("Writing log file {}", path.display());
        }
        (LogDestination::Stderr, Some(err)) => {
            tracing::warn!("File logging disabled: {err}");
        }
        (LogDestination::Stderr, None) => {}
    }
    destination
}

/// `RUST_LOG` wins over the configured directive.
fn build_filter(directive: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, None),
        Err(_) => configured_filter(directive),
    }
}

fn configured_filter(directive: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(err) => (
            EnvFilter::new(FALLBACK_FILTER),
            Some(format!(
                "Ignoring log filter `{directive}` ({err}); using `{FALLBACK_FILTER}`"
            )),
        ),
    }
}

struct RunFile {
    path: PathBuf,
    file: File,
}

fn open_run_file(dir: &Path, now: OffsetDateTime, retained: usize) -> Result<RunFile, LoggingError> {
    let path = dir.join(run_file_name(now)?);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::OpenFile {
            path: path.clone(),
            source,
        })?;
    prune_run_files(dir, retained)?;
    Ok(RunFile { path, file })
}

/// Delete all but the newest `keep` run files. Names embed a sortable
/// timestamp, so name order is age order. Other files are left alone.
fn prune_run_files(dir: &Path, keep: usize) -> Result<usize, LoggingError> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(|source| LoggingError::ListDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_run_file(name))
        .collect();
    names.sort_unstable_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for name in names.into_iter().skip(keep) {
        let path = dir.join(name);
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
        removed += 1;
    }
    Ok(removed)
}

fn is_run_file(name: &str) -> bool {
    name.starts_with(RUN_FILE_PREFIX) && name.ends_with(RUN_FILE_SUFFIX)
}

fn run_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year][month][day]-[hour][minute][second]");
    Ok(format!(
        "{RUN_FILE_PREFIX}{}{RUN_FILE_SUFFIX}",
        now.format(NAME_FORMAT)?
    ))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
