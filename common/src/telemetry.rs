use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::{log::SetLoggerError, LogTracer};
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

/// Builds the subscriber used by every binary of the workspace.
///
/// Spans and events are filtered by `RUST_LOG` (or `fallback_env_filter` when it is not set),
/// enriched by `JsonStorageLayer` so children inherit the fields of their parent span,
/// and written to `sink` as bunyan-compatible JSON lines.
///
/// # Arguments
/// - `name`: name of the app, reported in each log line
/// - `fallback_env_filter`: filter used if the RUST_LOG env variable has not been set
/// - `sink`: where the log lines are written (`std::io::stdout`, `std::io::sink` in tests ...)
pub fn get_tracing_subscriber<Sink>(
    name: String,
    fallback_env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    // HRTB: the sink must be a `MakeWriter` for any lifetime `'a`
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_env_filter));

    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Registers `subscriber` as the global default and redirects `log` records to it.
///
/// Can only succeed once per process.
pub fn init_tracing_subscriber(
    subscriber: impl Subscriber + Send + Sync,
) -> Result<(), TelemetryError> {
    LogTracer::init()?;
    set_global_default(subscriber)?;

    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to set logger: {0}")]
    Logger(#[from] SetLoggerError),
    #[error("Failed to set subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}
