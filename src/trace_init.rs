//! Opt-in file logging for decode diagnostics.

#[cfg(feature = "trace")]
use std::path::Path;
#[cfg(feature = "trace")]
use std::sync::OnceLock;

/// Flushes buffered lines when dropped; parked here for the process
/// lifetime, which also makes repeat initialization a no-op.
#[cfg(feature = "trace")]
static WRITER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Route decoder events to `decode.jsonl` under `log_dir` as JSON lines.
///
/// Only the first call installs the subscriber. The writer is non-blocking:
/// batch workers emit concurrently and file IO must not stall the frame
/// loop. The decoder logs plain events (init, feed, batch dispatch) and
/// opens no spans, so no span-lifecycle output is configured.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) {
    WRITER_GUARD.get_or_init(|| {
        let appender = tracing_appender::rolling::never(log_dir, "decode.jsonl");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .json()
            .with_writer(writer)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("prefixbeam=debug")),
            )
            .init();
        guard
    });
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &std::path::Path) {}
