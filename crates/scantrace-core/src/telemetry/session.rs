//! One report run: root span, span tree, blocking flush

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::models::{ScanReport, SpanAttributes};

use super::builder::SpanTreeBuilder;
use super::host::{HostProbe, SystemHost};
use super::pause::{Pause, ThreadPause};

/// Outcome of recording a report
#[derive(Debug)]
pub struct RunSummary {
    /// Spans opened, root included
    pub spans: usize,
    /// Wall-clock time spent building the tree and flushing
    pub elapsed: Duration,
    /// Whether every buffered span reached the transport
    pub flush: Result<()>,
}

/// Projects scan reports onto span trees through one tracer provider
pub struct TraceSession {
    provider: SdkTracerProvider,
    service_name: String,
    settings: SessionConfig,
    host: Box<dyn HostProbe>,
    pause: Box<dyn Pause>,
}

impl TraceSession {
    /// Create a session exporting through `provider`
    pub fn new(
        provider: SdkTracerProvider,
        service_name: impl Into<String>,
        settings: SessionConfig,
    ) -> Self {
        Self {
            provider,
            service_name: service_name.into(),
            settings,
            host: Box::new(SystemHost),
            pause: Box::new(ThreadPause),
        }
    }

    /// Replace the host probe used for root span attributes
    pub fn with_host(mut self, host: impl HostProbe + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// Replace how the per-control pause is taken
    pub fn with_pause(mut self, pause: impl Pause + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    /// The provider spans are exported through
    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    /// Service name written on the root span
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Export `report` as a span tree and hand it back unchanged.
    ///
    /// Telemetry failures are logged, never returned.
    pub fn run(&self, report: ScanReport) -> ScanReport {
        let summary = self.record(&report);
        match &summary.flush {
            Ok(()) => debug!(
                spans = summary.spans,
                elapsed = %humantime::format_duration(summary.elapsed),
                "Successfully sent report"
            ),
            Err(e) => warn!(
                spans = summary.spans,
                "Scan spans may not have reached the backend: {}", e
            ),
        }
        report
    }

    /// Emit the span tree for `report` and flush
    pub fn record(&self, report: &ScanReport) -> RunSummary {
        let started = Instant::now();
        info!(
            profiles = report.profiles.len(),
            service_name = %self.service_name,
            "Tracing scan report"
        );

        let tracer = self.provider.tracer(self.settings.tracer_name.clone());
        let mut builder =
            SpanTreeBuilder::new(&tracer, self.pause.as_ref(), self.settings.control_delay);

        {
            let root = builder.open_root(report, &self.service_name, self.host.as_ref());
            builder.build_profiles(root.context(), &report.profiles);

            // children are all closed by now
            let mut closing = SpanAttributes::new();
            closing.set_opt("duration", report.duration_ms());
            root.set_attributes(closing);
        }

        let spans = builder.opened();
        let flush = self.flush();
        RunSummary {
            spans,
            elapsed: started.elapsed(),
            flush,
        }
    }

    /// Block until buffered spans reach the transport or the flush timeout fires
    pub fn flush(&self) -> Result<()> {
        flush_with_timeout(&self.provider, self.settings.flush_timeout)
    }
}

/// Force-flush `provider`, giving up after `timeout`
///
/// The flush runs on a helper thread so a wedged transport cannot hold the
/// caller past the deadline.
pub fn flush_with_timeout(provider: &SdkTracerProvider, timeout: Duration) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let provider = provider.clone();
    thread::Builder::new()
        .name("scantrace-flush".to_string())
        .spawn(move || {
            let _ = tx.send(provider.force_flush());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::flush(e.to_string())),
        Err(RecvTimeoutError::Timeout) => Err(Error::flush(format!(
            "timed out after {}",
            humantime::format_duration(timeout)
        ))),
        Err(RecvTimeoutError::Disconnected) => {
            Err(Error::flush("flush thread exited without a result"))
        }
    }
}
