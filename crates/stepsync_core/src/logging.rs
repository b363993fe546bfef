//! Process-wide log sink for extraction and reconcile runs.
//!
//! # Responsibility
//! - Route `log` records to size-rotated files under one directory.
//! - Record panics as `event=panic_captured` lines before the previous hook runs.
//!
//! # Invariants
//! - The sink starts at most once per process. Repeating the call with the
//!   same settings is a no-op; different settings are rejected.
//! - Setup failures are returned, never panicked on.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle, Naming,
    WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "stepsync";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEPT_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE_SINK: OnceCell<ActiveSink> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveSink {
    settings: LogSettings,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    InvalidDirectory(String),
    CreateDirectory { dir: PathBuf, source: std::io::Error },
    Backend(FlexiLoggerError),
    /// The sink already runs with other settings.
    Conflict { active: LogSettings },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected off|error|warn|info|debug|trace"
            ),
            Self::InvalidDirectory(reason) => write!(f, "invalid log directory: {reason}"),
            Self::CreateDirectory { dir, source } => {
                write!(f, "failed to create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::Conflict { active } => write!(
                f,
                "logging already runs at level `{}` in `{}`",
                active.level,
                active.log_dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            Self::InvalidLevel(_) | Self::InvalidDirectory(_) | Self::Conflict { .. } => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Validated sink settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// Absolute directory holding `stepsync*.log` files.
    pub log_dir: PathBuf,
}

impl LogSettings {
    /// Parses a level name (case-insensitive, `warning` accepted) and an
    /// absolute directory.
    pub fn parse(level: &str, log_dir: &str) -> Result<Self, LoggingError> {
        let trimmed_level = level.trim();
        let level_name = if trimmed_level.eq_ignore_ascii_case("warning") {
            "warn"
        } else {
            trimmed_level
        };
        let level = LevelFilter::from_str(level_name)
            .map_err(|_| LoggingError::InvalidLevel(trimmed_level.to_string()))?;

        let dir = log_dir.trim();
        if dir.is_empty() {
            return Err(LoggingError::InvalidDirectory("path is empty".to_string()));
        }
        let path = Path::new(dir);
        if !path.is_absolute() {
            return Err(LoggingError::InvalidDirectory(format!(
                "`{dir}` is not absolute"
            )));
        }

        Ok(Self {
            level,
            log_dir: path.to_path_buf(),
        })
    }
}

/// Starts the file sink, or confirms the running one matches.
///
/// # Errors
/// - `InvalidLevel` / `InvalidDirectory` for unusable arguments.
/// - `CreateDirectory` / `Backend` when the sink cannot start.
/// - `Conflict` when a sink with other settings is already running.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let settings = LogSettings::parse(level, log_dir)?;
    let sink = ACTIVE_SINK.get_or_try_init(|| start_sink(settings.clone()))?;
    if sink.settings == settings {
        Ok(())
    } else {
        Err(LoggingError::Conflict {
            active: sink.settings.clone(),
        })
    }
}

/// Settings of the running sink, if any.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE_SINK.get().map(|sink| sink.settings.clone())
}

/// `Debug` for debug builds, `Info` otherwise.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn start_sink(settings: LogSettings) -> Result<ActiveSink, LoggingError> {
    std::fs::create_dir_all(&settings.log_dir).map_err(|source| {
        LoggingError::CreateDirectory {
            dir: settings.log_dir.clone(),
            source,
        }
    })?;

    let handle = Logger::with(LogSpecification::builder().default(settings.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(settings.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEPT_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok version={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        settings.level,
        settings.log_dir.display()
    );

    Ok(ActiveSink {
        settings,
        _handle: handle,
    })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payloads may echo descriptor or config text.
        let location = panic_info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(panic_info);
    }));
}

/// Joins lines and cuts `value` to `limit` chars, marking the cut with `...`.
fn single_line(value: &str, limit: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut cut: String = flat.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, single_line, LogSettings, LoggingError};
    use log::LevelFilter;

    #[test]
    fn settings_accept_level_aliases() {
        let settings = LogSettings::parse(" Warning ", "/var/log/stepsync").unwrap();
        assert_eq!(settings.level, LevelFilter::Warn);
        assert_eq!(
            LogSettings::parse("TRACE", "/tmp").unwrap().level,
            LevelFilter::Trace
        );
    }

    #[test]
    fn settings_reject_bad_input() {
        assert!(matches!(
            LogSettings::parse("verbose", "/tmp"),
            Err(LoggingError::InvalidLevel(_))
        ));
        assert!(matches!(
            LogSettings::parse("info", "logs/dev"),
            Err(LoggingError::InvalidDirectory(_))
        ));
        assert!(matches!(
            LogSettings::parse("info", "  "),
            Err(LoggingError::InvalidDirectory(_))
        ));
    }

    #[test]
    fn single_line_flattens_and_cuts() {
        assert_eq!(single_line("a\nb", 10), "a b");
        assert_eq!(single_line("line1\nline2\rline3", 8), "line1 li...");
    }

    #[test]
    fn second_init_must_match_running_sink() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        init_logging("info", dir_str).unwrap();
        init_logging("INFO", dir_str).unwrap();

        let err = init_logging("debug", dir_str).unwrap_err();
        assert!(matches!(err, LoggingError::Conflict { .. }));
        let err = init_logging("info", other.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("already runs"));

        let active = logging_status().unwrap();
        assert_eq!(active.level, LevelFilter::Info);
        assert_eq!(active.log_dir, dir.path());
    }
}
