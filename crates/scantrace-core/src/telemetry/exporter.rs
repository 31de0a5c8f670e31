//! OTLP exporter and tracer provider setup

use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing::debug;

use crate::config::ExporterConfig;
use crate::error::{Error, Result};

static INSTALLED: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Build a tracer provider that batches spans to the configured OTLP/HTTP endpoint
pub fn build_provider(config: &ExporterConfig) -> Result<SdkTracerProvider> {
    let service = config.resolve_service_name();

    let mut builder = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_timeout(config.timeout);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint.clone());
    }
    if !config.headers.is_empty() {
        builder = builder.with_headers(config.headers.clone().into_iter().collect());
    }
    let exporter = builder
        .build()
        .map_err(|e| Error::exporter(format!("failed to build OTLP span exporter: {e}")))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(service.name).build())
        .build())
}

/// Build the process-wide provider and register it as the global tracer provider.
///
/// Only the first call configures anything. Later calls return the provider
/// installed by the first and ignore their argument; reconfiguring a live
/// process is not supported.
pub fn install(config: &ExporterConfig) -> Result<SdkTracerProvider> {
    if let Some(provider) = INSTALLED.get() {
        debug!("Tracer provider already installed, ignoring new exporter configuration");
        return Ok(provider.clone());
    }

    INSTALLED
        .get_or_try_init(|| -> Result<SdkTracerProvider> {
            let provider = build_provider(config)?;
            global::set_tracer_provider(provider.clone());
            Ok(provider)
        })
        .cloned()
}

/// The provider registered by [`install`], if any
pub fn installed() -> Option<SdkTracerProvider> {
    INSTALLED.get().cloned()
}
