//! Log subscriber setup
//!
//! Logs go to stderr so stdout stays reserved for the report document. When a
//! tracer provider is supplied and `export_host_spans` is on, the process's own
//! `tracing` spans are forwarded to it as well.

use std::io;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};

/// Span targets never forwarded to the exporter; exporting the exporter's own
/// transport spans would feed back into itself.
const TRANSPORT_TARGETS: &[&str] = &["opentelemetry", "hyper", "h2", "reqwest", "tower", "rustls"];

/// Target of the CLI's own run span. It is logged but never exported, so each
/// run's trace has `inspec-run` as its only root.
pub const DRIVER_TARGET: &str = "scantrace::cli";

/// Whether spans from `target` may be forwarded to the span exporter
pub fn is_host_target(target: &str) -> bool {
    target != DRIVER_TARGET && !TRANSPORT_TARGETS.iter().any(|t| target.starts_with(t))
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(
    config: &LoggingConfig,
    verbose: bool,
    provider: Option<&SdkTracerProvider>,
) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(io::stderr).boxed(),
    };

    let host_spans = provider
        .filter(|_| config.export_host_spans)
        .map(host_span_layer);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(host_spans)
        .with(filter)
        .try_init()
        .map_err(|e| Error::config(format!("failed to install log subscriber: {e}")))
}

/// Layer forwarding host `tracing` spans to `provider`, minus transport and
/// driver spans
pub fn host_span_layer<S>(provider: &SdkTracerProvider) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer()
        .with_tracer(provider.tracer("scantrace"))
        .with_filter(filter_fn(|meta| is_host_target(meta.target())))
}
