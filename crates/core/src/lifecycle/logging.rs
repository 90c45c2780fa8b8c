//! Tracing subscriber setup.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "grok-bridge.log";

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// With `to_file` the output goes to a daily rolling file under `log_dir`
/// (default `./logs`) through a non-blocking writer; the returned guard must
/// be held until shutdown so buffered lines get flushed.
pub fn init_logging(level: &str, to_file: bool, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if !to_file {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir.unwrap_or("./logs"), LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
