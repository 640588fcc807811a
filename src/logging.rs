//! Structured logging setup (C13).
//!
//! Every request handler, backend channel, and scheduler worker logs
//! through `tracing` spans rather than ad-hoc `eprintln!`; this module
//! only owns process-wide subscriber initialization.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "polyglot_lsp=info,tower_lsp=warn";

/// Installs the global `tracing` subscriber. Must be called exactly once,
/// before any other module logs.
pub fn init(format: LogFormat, filter_override: Option<&str>) {
    let filter = filter_override
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
