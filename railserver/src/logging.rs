//! Logging setup (mirrors `logger.py`'s
//! `QueueHandler`/`QueueListener` pair with `tracing-appender`'s
//! non-blocking writer — a bounded channel plus a background flush thread
//! so a slow sink never stalls a handler thread).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. The returned guard must be held for
/// the lifetime of the process: dropping it stops the background writer
/// thread and flushes whatever is still queued.
pub fn init(log_level: &str, log_dir: Option<&str>) -> WorkerGuard {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "railserver.log");
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
    guard
}
