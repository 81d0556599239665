//! log4rs wiring: an application log, a dedicated capped-cleanup log, and an
//! optional developer trace file fed by [`dev6!`](crate::dev6).

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::config::LoggingConfig;
use crate::utils::devlog::DEV_TARGET;

/// Target used by the capped cleaner.
pub const CAPPED_TARGET: &str = "docmatch::capped";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

type LogResult = Result<(), Box<dyn std::error::Error>>;

// Set on first successful configuration so later calls swap the config in place.
static HANDLE: Mutex<Option<log4rs::Handle>> = Mutex::new(None);

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error if the file is missing, malformed, or a logger is already installed.
pub fn init() -> LogResult {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes logging from a specific log4rs config file.
///
/// # Errors
/// As [`init`].
pub fn init_path(path: &Path) -> LogResult {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Maps a level name to a filter; unknown names fall back to `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Configure logging for the process, replacing any config installed by an earlier call.
/// - dir: base directory for log files; the working directory when `None`.
/// - level: error|warn|info|debug|trace
/// - retention: rolled files to keep per log (default 7)
///
/// # Errors
/// Returns an error if the directory or files cannot be created, or if a logger
/// not managed by this module is already installed.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult {
    configure_logging_with_dev(dir, level, retention, false)
}

/// Like [`configure_logging`], additionally persisting `docmatch::dev6` traces
/// to `dev6.log` when `enable_dev6` is set.
///
/// # Errors
/// As [`configure_logging`].
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> LogResult {
    let base = match dir {
        Some(d) => PathBuf::from(d),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(DEFAULT_RETENTION)
        .max(1);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("capped", Box::new(rolling(&base, "capped", keep)?)))
        .logger(Logger::builder().appender("capped").additive(false).build(CAPPED_TARGET, lvl));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV_TARGET, LevelFilter::Off))
    };

    let config = builder.build(Root::builder().appender("app").build(lvl))?;
    let mut handle = HANDLE.lock();
    match handle.as_ref() {
        Some(h) => h.set_config(config),
        None => *handle = Some(log4rs::init_config(config)?),
    }
    Ok(())
}

/// Configure logging from a loaded `[logging]` section.
///
/// # Errors
/// As [`configure_logging`].
pub fn configure_from_config(cfg: &LoggingConfig) -> LogResult {
    configure_logging_with_dev(
        cfg.dir.as_deref(),
        Some(cfg.level.as_str()),
        Some(cfg.retention),
        cfg.dev6,
    )
}

/// Configure logging from environment variables if present:
/// - DOCMATCH_LOG_DIR
/// - DOCMATCH_LOG_LEVEL
/// - DOCMATCH_LOG_RETENTION
/// - DOCMATCH_DEV6 (1|true|yes)
///
/// # Errors
/// As [`configure_logging`].
pub fn configure_from_env() -> LogResult {
    let dir = std::env::var("DOCMATCH_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("DOCMATCH_LOG_LEVEL").ok();
    let retention = std::env::var("DOCMATCH_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    let dev6 = std::env::var("DOCMATCH_DEV6")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    configure_logging_with_dev(dir.as_deref(), level.as_deref(), retention, dev6)
}
