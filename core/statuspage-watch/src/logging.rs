//! Logging setup.
//!
//! Stdout carries the rendered views, so logs go to a daily rolling file under
//! `~/.statuspage/logs/`; only warnings and errors are echoed to stderr.

use std::env;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "statuspage-watch.log";

/// Installs the global subscriber. Keep the guard alive for the process
/// lifetime or buffered lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let filter = build_filter(
        env::var("STATUSPAGE_DEBUG_LOG").ok().as_deref(),
        env::var("STATUSPAGE_LOG").ok().as_deref(),
    );

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(LevelFilter::WARN);

    let (file_layer, guard) = match log_dir().filter(|dir| fs_err::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }
    guard
}

fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".statuspage").join("logs"))
}

fn debug_enabled(value: Option<&str>) -> bool {
    value
        .map(|value| matches!(value, "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn build_filter(debug: Option<&str>, directives: Option<&str>) -> EnvFilter {
    if debug_enabled(debug) {
        return EnvFilter::new("debug");
    }
    match directives {
        Some(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
        }
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_accepts_common_truthy_values() {
        assert!(debug_enabled(Some("1")));
        assert!(debug_enabled(Some("yes")));
        assert!(!debug_enabled(Some("0")));
        assert!(!debug_enabled(None));
    }

    #[test]
    fn debug_flag_overrides_directives() {
        let filter = build_filter(Some("true"), Some("warn"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn explicit_directives_are_used() {
        let filter = build_filter(None, Some("statuspage_core=trace"));
        assert_eq!(filter.to_string(), "statuspage_core=trace");
    }
}
