//! JSON trace output for decoding runs.

use std::path::Path;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_TRACE_FILTER: &str = "decoder_core=debug,decoder_engine=debug";

/// Keeps the background trace writer alive. Dropping it flushes buffered
/// events, so hold it until the last utterance is decoded.
#[must_use = "trace output stops when the guard is dropped"]
pub struct TraceGuard {
    #[cfg(feature = "trace")]
    _worker: tracing_appender::non_blocking::WorkerGuard,
}

impl std::fmt::Debug for TraceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceGuard").finish_non_exhaustive()
    }
}

/// Install a global JSON subscriber writing to `log_dir/file_name`.
///
/// Returns `None` when another global subscriber is already installed.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path, file_name: &str) -> Option<TraceGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let appender = tracing_appender::rolling::never(log_dir, file_name);
    let (writer, worker) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACE_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter)
        .try_init()
        .ok()?;
    Some(TraceGuard { _worker: worker })
}

/// Tracing is compiled out; nothing is installed.
#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &Path, _file_name: &str) -> Option<TraceGuard> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "trace"))]
    #[test]
    fn disabled_build_installs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(init_tracing(dir.path(), "decode.jsonl").is_none());
        assert!(!dir.path().join("decode.jsonl").exists());
    }

    #[cfg(feature = "trace")]
    #[test]
    fn guard_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_tracing(dir.path(), "decode.jsonl").expect("first install");
        assert!(init_tracing(dir.path(), "other.jsonl").is_none());
        tracing::debug!(target: "decoder_engine", frames = 3, "decoded");
        drop(guard);
        let written = std::fs::read_to_string(dir.path().join("decode.jsonl")).unwrap();
        assert!(written.contains("\"frames\":3"));
    }
}
