use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

pub const LOG_FILE_PREFIX: &str = "catalogue-flattener.log";

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured filter. With a log directory the
/// output goes to a daily rolling file instead of stderr; keep the returned
/// guard alive for the life of the process or buffered lines are lost.
pub fn init(settings: &Settings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));

    match &settings.log_dir {
        Some(dir) => {
            let file_appender = rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false) // no color codes in file
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
