//! Structured logging setup via `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a process-global `tracing` subscriber reading its filter from
/// `RUST_LOG` (default `info`). JSON output is used when
/// `GITMEMORY_LOG_FORMAT=json`; otherwise compact human-readable output.
///
/// Safe to call more than once — subsequent calls are no-ops (the
/// underlying `set_global_default` error is ignored, matching the
/// teacher's permissive library-init convention).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("GITMEMORY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).compact().try_init()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already initialized");
    }
}
