//! Logging setup
//!
//! The engine only emits `tracing` events. Embedders that do not install their
//! own subscriber can call [`init_logging`], which writes human-readable output
//! to stderr and, when a directory is given, JSON lines to a daily rolling file.
//!
//! Deprecation warnings use the [`DEPRECATION_TARGET`] target so they can be
//! routed or silenced separately, e.g. `SHADOW_AUTHZ_LOG=info,shadow_authz::deprecation=off`.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Target of deprecation warnings
pub const DEPRECATION_TARGET: &str = "shadow_authz::deprecation";

/// Environment variable holding the filter directive
pub const LOG_ENV: &str = "SHADOW_AUTHZ_LOG";

const DEFAULT_DIRECTIVE: &str = "info";
const LOG_FILE_PREFIX: &str = "shadow-authz.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for as long as logs should be written.
pub fn init_logging(log_directory: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    match log_directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("failed to create log directory {}", directory.display())
            })?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter());

            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .context("failed to install tracing subscriber")?;

            tracing::info!("Logging to {}", directory.display());
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

/// Route events to the test harness output. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_can_be_initialized_twice() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("still alive");
    }

    #[test]
    fn deprecation_target_lives_under_crate() {
        assert!(DEPRECATION_TARGET.starts_with("shadow_authz::"));
    }
}
