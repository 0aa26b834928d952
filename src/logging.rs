//! Logging infrastructure
//!
//! The terminal belongs to the TUI, so logs go to a daily file under
//! [`Config::log_path`]. Nothing is ever written to stdout or stderr.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// HTTP and HTML crates that are chatty at `debug`; held at `warn` unless
/// `RUST_LOG` names them.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "html5ever", "selectors"];

/// Start file logging at `config.level`. `RUST_LOG`, when set, replaces
/// the configured filter entirely.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_path = Config::log_path();
    let log_dir = log_path.parent().unwrap_or(Path::new("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "livescroll-digest.log".into());
    std::fs::create_dir_all(log_dir)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!(log_dir = %log_dir.display(), level = %config.level, "Logging initialized");
    Ok(LoggingGuard { _guard: guard })
}

/// `level` for this crate and everything else, with [`QUIET_TARGETS`] at `warn`.
fn level_filter(level: &str) -> Result<EnvFilter> {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    EnvFilter::try_new(directives.join(","))
        .map_err(|e| Error::Config(format!("invalid log level {level:?}: {e}")))
}

/// Test logging through the libtest writer; safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keeps the non-blocking writer alive; pending writes flush on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_quiets_transport_crates() {
        let filter = level_filter("debug").unwrap().to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("html5ever=warn"));
    }

    #[test]
    fn bad_level_is_a_config_error() {
        assert!(matches!(level_filter("livescroll_digest=loud"), Err(Error::Config(_))));
    }
}
