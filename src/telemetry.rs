//! Logging for the bootstrap run.
//!
//! Log lines go to stderr so the run summary on stdout stays readable when it
//! is piped. `reqwest` and other crates that still emit through `log` are
//! bridged into the same subscriber.

use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Registry, fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("cannot route log records into tracing: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("cannot install the tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` overrides `OBS_LOG_LEVEL` when both are set.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        // Library users may have a logger of their own; the run still works,
        // only reqwest's internal records go missing.
        eprintln!("obs-bootstrap: log records from dependencies are not captured ({err})");
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if let Err(err) = tracing_subscriber::registry()
        .with(output_layer(&config.log_format))
        .with(filter)
        .try_init()
    {
        INSTALLED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    Ok(())
}

fn output_layer(format: &str) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    match format {
        "json" => layer.json().boxed(),
        "pretty" => layer.pretty().boxed(),
        _ => layer.compact().boxed(),
    }
}
