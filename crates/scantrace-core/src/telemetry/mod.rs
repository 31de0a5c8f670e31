//! Span export for scan reports
//!
//! A [`TraceSession`] walks a [`ScanReport`](crate::models::ScanReport) with a
//! [`SpanTreeBuilder`] and blocks on a flush before handing the report back.
//! [`install`] sets up the OTLP pipeline once per process.

mod builder;
mod exporter;
mod host;
mod pause;
mod session;

pub use builder::{
    control_attributes, control_span_name, profile_attributes, profile_span_name,
    result_attributes, result_span_name, root_attributes, SpanScope, SpanTreeBuilder,
    ROOT_SPAN_NAME,
};
pub use exporter::{build_provider, install, installed};
pub use host::{joined_ip_addresses, HostProbe, StaticHost, SystemHost};
pub use pause::{Pause, ThreadPause};
pub use session::{flush_with_timeout, RunSummary, TraceSession};
