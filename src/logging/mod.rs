//! Tiered logging sink and tracing setup.
//!
//! [`setup_tracing`] builds a subscriber with three synchronous destinations
//! sharing one record framing:
//!
//! - **stdout**: every record at or above the configured minimum severity;
//! - **info tier**: records strictly below `error`, in a daily-rotating
//!   `<directory>/<YYYY-MM-DD>_info.log`;
//! - **error tier**: records at `error` and above, in a daily-rotating
//!   `<directory>/<YYYY-MM-DD>_error.log`.
//!
//! Each tier keeps a stable link to its current file and prunes files older
//! than seven days. When the minimum severity is `debug` or `error`, every
//! record carries a captured call stack; at other thresholds no stack is
//! captured, since capture is expensive and only wanted at diagnostic
//! verbosity.
//!
//! Construction failure (an unopenable log destination) is returned as an
//! error and should abort startup; after construction, emission is
//! best-effort and never fails the caller.
//!
//! # Usage
//!
//! Call [`setup_tracing`] once at application startup:
//!
//! ```rust,ignore
//! fn main() -> anyhow::Result<()> {
//!     ponzu::logging::setup_tracing(&ponzu::logging::LogConfig::from_env())?;
//!     // ... rest of application
//! }
//! ```

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

mod format;
mod rotate;

pub use format::{LevelEncoding, RecordFormat, TIMESTAMP_FORMAT, TierFormat};
pub use rotate::RotatingFileWriter;

/// Sink configuration, built once at startup and immutable afterwards.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum severity: `debug`, `info`, `warn`, `error`, `dpanic`, `panic`
    /// or `fatal` (case-insensitive). Unrecognized values mean `info`.
    pub level: String,
    /// Record framing shared by all destinations.
    pub format: RecordFormat,
    /// Severity label style shared by all destinations.
    pub encode_level: LevelEncoding,
    /// Directory receiving the rotated files.
    pub directory: PathBuf,
    /// Stable pointer to the current file. The tier name is injected before
    /// the extension, so `latest.log` yields `latest_info.log` and
    /// `latest_error.log`.
    pub link_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: RecordFormat::Console,
            encode_level: LevelEncoding::Lowercase,
            directory: PathBuf::from("logs"),
            link_name: "latest.log".to_string(),
        }
    }
}

impl LogConfig {
    /// Reads the sink configuration from `LOG_*` environment variables,
    /// falling back to the defaults for anything unset or unrecognized.
    pub fn from_env() -> Self {
        let defaults = LogConfig::default();

        LogConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.level),
            format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => RecordFormat::Json,
                _ => defaults.format,
            },
            encode_level: match env::var("LOG_ENCODE_LEVEL").as_deref() {
                Ok("lowercase-color") => LevelEncoding::LowercaseColor,
                Ok("uppercase") => LevelEncoding::Uppercase,
                Ok("uppercase-color") => LevelEncoding::UppercaseColor,
                _ => defaults.encode_level,
            },
            directory: env::var("LOG_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            link_name: env::var("LOG_LINK_NAME").unwrap_or(defaults.link_name),
        }
    }
}

/// Builds the tiered sink and installs it as the global subscriber.
///
/// Returns an error if a rotating destination cannot be opened or a
/// subscriber is already installed; both are startup failures.
pub fn setup_tracing(config: &LogConfig) -> anyhow::Result<()> {
    build_subscriber(config)?
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install tracing subscriber: {err}"))?;

    tracing::info!(
        "Logging initialized [stdout plus info/error tiers under {}]",
        config.directory.display()
    );
    Ok(())
}

/// Builds the three-destination subscriber without installing it.
///
/// Split out from [`setup_tracing`] so tests can scope the subscriber with
/// `tracing::subscriber::with_default`.
pub fn build_subscriber(
    config: &LogConfig,
) -> anyhow::Result<impl Subscriber + Send + Sync + 'static> {
    let min_level = parse_level(&config.level);
    // Stack capture is reserved for the diagnostic thresholds.
    let capture_stacktrace = min_level == Level::DEBUG || min_level == Level::ERROR;
    let format = TierFormat::new(config.format, config.encode_level, capture_stacktrace);

    let info_writer = RotatingFileWriter::new(
        &config.directory,
        "info",
        &tier_link_name(&config.link_name, "info"),
    )?;
    let error_writer = RotatingFileWriter::new(
        &config.directory,
        "error",
        &tier_link_name(&config.link_name, "error"),
    )?;

    // tracing orders levels by verbosity: ERROR < WARN < INFO < DEBUG < TRACE,
    // so "at least as severe as X" reads as `level <= X`.
    let stdout_layer = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(std::io::stdout)
        .with_filter(filter_fn(move |metadata| *metadata.level() <= min_level));

    let info_layer = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(info_writer)
        .with_filter(filter_fn(|metadata| *metadata.level() > Level::ERROR));

    let error_layer = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(error_writer)
        .with_filter(filter_fn(|metadata| *metadata.level() <= Level::ERROR));

    Ok(Registry::default()
        .with(stdout_layer)
        .with(info_layer)
        .with(error_layer))
}

/// Maps a configured level name onto the `tracing` taxonomy.
///
/// `dpanic`, `panic` and `fatal` collapse onto `error`, the most severe level
/// `tracing` has. Unrecognized names mean `info`.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" | "dpanic" | "panic" | "fatal" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Injects the tier name into the configured link name, before the extension
/// if there is one: `latest.log` becomes `latest_info.log`.
fn tier_link_name(link_name: &str, tier: &str) -> String {
    match Path::new(link_name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => {
            let stem = &link_name[..link_name.len() - ext.len() - 1];
            format!("{}_{}.{}", stem, tier, ext)
        }
        None => format!("{}_{}", link_name, tier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::fs;

    fn test_config(directory: &Path, level: &str, format: RecordFormat) -> LogConfig {
        LogConfig {
            level: level.to_string(),
            format,
            encode_level: LevelEncoding::Lowercase,
            directory: directory.to_path_buf(),
            link_name: "latest.log".to_string(),
        }
    }

    fn tier_file(directory: &Path, tier: &str) -> PathBuf {
        let day = Local::now().date_naive().format("%Y-%m-%d");
        directory.join(format!("{}_{}.log", day, tier))
    }

    #[test]
    fn parses_all_recognized_levels() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("INFO"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("dpanic"), Level::ERROR);
        assert_eq!(parse_level("panic"), Level::ERROR);
        assert_eq!(parse_level("fatal"), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn tier_links_get_distinct_names() {
        assert_eq!(tier_link_name("latest.log", "info"), "latest_info.log");
        assert_eq!(tier_link_name("latest.log", "error"), "latest_error.log");
        assert_eq!(tier_link_name("current", "info"), "current_info");
    }

    #[test]
    fn warn_routes_to_info_tier_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "info", RecordFormat::Console);

        let subscriber = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("careful now");
            tracing::error!("it broke");
        });

        let info = fs::read_to_string(tier_file(dir.path(), "info")).unwrap();
        let error = fs::read_to_string(tier_file(dir.path(), "error")).unwrap();

        assert!(info.contains("careful now"));
        assert!(!info.contains("it broke"));
        assert!(error.contains("it broke"));
        assert!(!error.contains("careful now"));
    }

    #[test]
    fn tier_routing_ignores_the_minimum_threshold() {
        // A debug record is below an `info` stdout threshold but still lands
        // in the info tier file.
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "info", RecordFormat::Console);

        let subscriber = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("just details");
        });

        let info = fs::read_to_string(tier_file(dir.path(), "info")).unwrap();
        assert!(info.contains("just details"));
    }

    #[test]
    fn json_records_carry_level_time_message_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "info", RecordFormat::Json);

        let subscriber = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user = "amy", attempts = 3, "login accepted");
        });

        let info = fs::read_to_string(tier_file(dir.path(), "info")).unwrap();
        let record: serde_json::Value = serde_json::from_str(info.lines().next().unwrap()).unwrap();

        assert_eq!(record["level"], "info");
        assert_eq!(record["message"], "login accepted");
        assert_eq!(record["user"], "amy");
        assert_eq!(record["attempts"], 3);
        assert!(
            chrono::NaiveDateTime::parse_from_str(record["time"].as_str().unwrap(), TIMESTAMP_FORMAT)
                .is_ok()
        );
        assert!(record.get("stacktrace").is_none());
    }

    #[test]
    fn debug_threshold_attaches_stacktraces() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "debug", RecordFormat::Json);

        let subscriber = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("traced");
        });

        let info = fs::read_to_string(tier_file(dir.path(), "info")).unwrap();
        let record: serde_json::Value = serde_json::from_str(info.lines().next().unwrap()).unwrap();
        assert!(record.get("stacktrace").is_some());
    }

    #[test]
    fn construction_fails_on_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, "a file, not a directory").unwrap();

        let config = test_config(&blocked, "info", RecordFormat::Console);
        assert!(build_subscriber(&config).is_err());
    }

    #[test]
    fn config_default_and_deserialization_agree() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, RecordFormat::Console);
        assert_eq!(config.encode_level, LevelEncoding::Lowercase);
        assert_eq!(config.link_name, "latest.log");

        let config: LogConfig =
            serde_json::from_str(r#"{"level": "warn", "format": "json", "encode_level": "uppercase-color"}"#)
                .unwrap();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, RecordFormat::Json);
        assert_eq!(config.encode_level, LevelEncoding::UppercaseColor);
    }
}
