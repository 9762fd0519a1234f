use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

/// Dependencies that are chatty at `info`; kept at `warn` unless the filter names them.
const QUIET_TARGETS: &[(&str, &str)] = &[
    ("async_nats", "async_nats=warn"),
    ("hyper", "hyper=warn"),
    ("reqwest", "reqwest=warn"),
];

pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    if tracing::dispatcher::has_been_set() {
        return Err(LoggerError::AlreadyInitialized);
    }
    let filter = build_filter(&cfg.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let res = match cfg.format {
        LoggerFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(cfg.use_color)
                    .with_target(cfg.with_targets)
                    .with_timer(local_timer()),
            )
            .try_init(),
        LoggerFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr)
                    .with_target(cfg.with_targets)
                    .with_timer(local_timer()),
            )
            .try_init(),
        LoggerFormat::Journald => return journald(registry),
    };
    res.map_err(|e| LoggerError::InitializationFailed(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    let mut directives = level.trim().to_string();
    for (target, directive) in QUIET_TARGETS {
        if !directives.contains(target) {
            directives.push(',');
            directives.push_str(directive);
        }
    }
    EnvFilter::try_new(&directives).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald<S>(registry: S) -> Result<(), LoggerError>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("shipyard-worker".to_string());
    registry
        .with(layer)
        .try_init()
        .map_err(|e| LoggerError::InitializationFailed(e.to_string()))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald<S>(_registry: S) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}
