//! # ScanTrace
//!
//! Projects compliance scan reports onto OpenTelemetry span trees.
//!
//! Each run produces one trace: a root span for the scan, a span per profile,
//! control and result, nested the way the report nests them. Spans are
//! exported over OTLP and flushed before the report is handed back, so trace
//! tooling can show which profile, control and check took how long and how it
//! ended.
//!
//! ## Architecture
//!
//! - **Models**: the scan report document and scalar span attribute values
//! - **Telemetry**: span tree construction, run sessions, exporter setup
//! - **Config**: file and environment layered settings
//!
//! ## Quick Start
//!
//! ```bash
//! export OTEL_EXPORTER_OTLP_ENDPOINT=https://api.honeycomb.io
//! export OTEL_EXPORTER_OTLP_HEADERS=x-honeycomb-team=$API_KEY
//! inspec exec profile --reporter json | scantrace report - > report.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod telemetry;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::telemetry::TraceSession;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::{Config, ExporterConfig, SessionConfig};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::telemetry::{HostProbe, Pause, RunSummary, TraceSession};
}
