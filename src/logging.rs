//! Logging setup and operation timing.
//!
//! The interactive screen owns stdout, so log output goes to a daily-rolling file
//! through `tracing-appender`'s non-blocking writer.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Options for [`init`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory that receives `termenu.log.<date>` files.
    pub directory: PathBuf,
    /// Raise the default level from `info` to `debug`.
    pub debug: bool,
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. The returned guard must be kept
/// alive for the whole process, dropping it flushes buffered lines.
pub fn init(options: &LogOptions) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(&options.directory, "termenu.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if options.debug { "termenu=debug" } else { "termenu=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    guard
}

/// Measures how long a labelled operation takes and logs it when finished.
#[derive(Debug)]
pub struct OperationTimer {
    label: &'static str,
    started: Instant,
}

impl OperationTimer {
    /// Starts timing `label`.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stops the timer, logs the elapsed time at debug level and returns it.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        debug!(
            operation = self.label,
            elapsed_ms = elapsed.as_millis() as u64,
            "Operation finished"
        );
        elapsed
    }
}
