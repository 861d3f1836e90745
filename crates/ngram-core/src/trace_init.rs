//! Optional JSON trace output, configured by the `logging` settings.

use std::path::Path;

/// Install a subscriber writing JSON lines to `logging.file_name` under
/// `log_dir`, rotated per `logging.rotation`.
///
/// `RUST_LOG` overrides `logging.default_filter`. Returns false when a
/// subscriber was already installed, by this function or anyone else.
/// Without the `trace` feature this does nothing and returns false.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) -> bool {
    use std::sync::OnceLock;

    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling::{self, RollingFileAppender};
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    use crate::settings::{settings, LogRotation};

    // flushes buffered lines for as long as the process runs
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    if GUARD.get().is_some() {
        return false;
    }
    let logging = &settings().logging;
    let appender: RollingFileAppender = match logging.rotation {
        LogRotation::Never => rolling::never(log_dir, &logging.file_name),
        LogRotation::Daily => rolling::daily(log_dir, &logging.file_name),
        LogRotation::Hourly => rolling::hourly(log_dir, &logging.file_name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.default_filter));

    let installed = tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        let _ = GUARD.set(guard);
        tracing::debug!(dir = %log_dir.display(), file = %logging.file_name, "tracing to file");
    }
    installed
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &Path) -> bool {
    false
}
