//! Tracing subscriber setup.
//!
//! `RUST_LOG` selects the filter; without it the given default level is
//! used. `PROCTRACK_LOG_JSON=1` switches to one JSON object per line. Logs
//! always go to stderr so command output on stdout stays machine-readable.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub(crate) const ENV_LOG_JSON: &str = "PROCTRACK_LOG_JSON";

/// Install the global subscriber. Later calls are no-ops.
pub(crate) fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let use_json = std::env::var(ENV_LOG_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(json = use_json, "tracing initialized");
    }
}
