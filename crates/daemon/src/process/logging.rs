//! Tracing setup for the `serve` process

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_NAME: &str = "strongbox.log";

/// Flushes buffered log lines when dropped. Hold for the life of the process.
#[must_use]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// `level` unless `RUST_LOG` says otherwise
fn filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Compact logging to stdout, plus a daily-rotated `strongbox.log` under
/// `log_dir` when one is configured.
///
/// Also routes panics through tracing and logs the build this process runs.
pub fn init_logging(level: Level, log_dir: Option<&Path>) -> LogGuards {
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![stdout_guard];

    let file_layer = log_dir.and_then(|dir| match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_filter(filter(level)),
            )
        }
        Err(e) => {
            eprintln!("strongbox: not logging to {}: {}", dir.display(), e);
            None
        }
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(stdout)
                .with_filter(filter(level)),
        )
        .with(file_layer)
        .init();

    log_panics();
    tracing::info!(build = %common::prelude::build_info(), "strongbox starting");

    LogGuards { _guards: guards }
}

fn log_panics() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
        tracing::error!(
            location = location.as_deref().unwrap_or("unknown"),
            "panic: {}",
            info
        );
    }));
}
