//! Telemetry collaborators the activity environment references: the metrics scope, the tracer,
//! and a convenience to install a console subscriber.

pub mod metrics;

use std::sync::{Arc, OnceLock};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracer made available to activity code and interceptors for creating their own spans
pub type Tracer = Arc<opentelemetry::global::BoxedTracer>;

static TRACING_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize tracing subscribers and output. Nothing in this crate calls this itself, it exists
/// so that consumers and tests have an easy way to initialize tracing.
///
/// Console output is filtered with the standard `RUST_LOG` env var, defaulting to `info`.
/// Calling this more than once is harmless; every call returns the outcome of the first.
pub fn telemetry_init() -> Result<(), anyhow::Error> {
    TRACING_INIT
        .get_or_init(|| {
            let filter_layer = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .map_err(|e| e.to_string())?;
            let pretty_fmt = tracing_subscriber::fmt::format()
                .pretty()
                .with_source_location(false);
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .event_format(pretty_fmt),
                )
                .try_init()
                .map_err(|e| e.to_string())
        })
        .clone()
        .map_err(anyhow::Error::msg)
}
