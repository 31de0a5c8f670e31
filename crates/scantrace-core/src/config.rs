//! Configuration management for ScanTrace
//!
//! Settings are layered: built-in defaults, an optional TOML file, `SCANTRACE_*`
//! environment variables (`__` separates nested keys, e.g.
//! `SCANTRACE_SESSION__CONTROL_DELAY=0s`), and finally the standard `OTEL_*`
//! exporter variables.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Service name used when neither the environment nor the config file sets one
pub const DEFAULT_SERVICE_NAME: &str = "inspec-honeycomb-reporter";

/// Environment variable overriding the exported service name
pub const SERVICE_NAME_VAR: &str = "OTEL_SERVICE_NAME";

/// Full URL of the OTLP traces endpoint, used verbatim
pub const TRACES_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";

/// Base URL of the OTLP collector; `/v1/traces` is appended
pub const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Comma-separated `key=value` headers sent with every export request; values
/// may be percent-encoded
pub const HEADERS_VAR: &str = "OTEL_EXPORTER_OTLP_HEADERS";

const ENV_PREFIX: &str = "SCANTRACE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Span exporter configuration
    pub exporter: ExporterConfig,

    /// Per-run session configuration
    pub session: SessionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(path, &env)
    }

    /// Load configuration from an optional file and an explicit environment map
    pub fn load_from(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env.clone().into_iter().collect())),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.exporter.apply_otel_env(|key| env.get(key).cloned());
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.session.tracer_name.trim().is_empty() {
            return Err(Error::config("session.tracer_name must not be empty"));
        }
        if self.session.flush_timeout.is_zero() {
            return Err(Error::config("session.flush_timeout must be greater than zero"));
        }
        if self.exporter.timeout.is_zero() {
            return Err(Error::config("exporter.timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Where the resolved service name came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceNameSource {
    /// `OTEL_SERVICE_NAME`
    Environment,
    /// `exporter.service_name` in the config file or `SCANTRACE_*` variables
    Config,
    /// [`DEFAULT_SERVICE_NAME`]
    Default,
}

impl fmt::Display for ServiceNameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "{SERVICE_NAME_VAR}"),
            Self::Config => write!(f, "config"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A service name together with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedServiceName {
    /// The service name spans are exported under
    pub name: String,
    /// Where it came from
    pub source: ServiceNameSource,
}

/// Span exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Service name override
    pub service_name: Option<String>,

    /// Full OTLP/HTTP traces URL; the exporter's default is used when unset
    pub endpoint: Option<String>,

    /// Headers attached to export requests (authentication, dataset)
    pub headers: BTreeMap<String, String>,

    /// Timeout for a single export request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(skip)]
    service_name_from_env: bool,

    #[serde(skip)]
    skipped_headers: usize,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            service_name: None,
            endpoint: None,
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(10),
            service_name_from_env: false,
            skipped_headers: 0,
        }
    }
}

impl ExporterConfig {
    /// Build an exporter configuration from the process environment alone
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_otel_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay the standard `OTEL_*` variables onto this configuration.
    ///
    /// Malformed header entries are logged and skipped; exporter settings never
    /// stop a report from loading.
    pub fn apply_otel_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = non_empty(SERVICE_NAME_VAR) {
            self.service_name = Some(name);
            self.service_name_from_env = true;
        }

        if let Some(endpoint) = non_empty(TRACES_ENDPOINT_VAR) {
            self.endpoint = Some(endpoint);
        } else if let Some(base) = non_empty(ENDPOINT_VAR) {
            self.endpoint = Some(format!("{}/v1/traces", base.trim_end_matches('/')));
        }

        if let Some(raw) = non_empty(HEADERS_VAR) {
            let (parsed, skipped) = parse_header_entries(&raw);
            self.skipped_headers = skipped;
            self.headers.extend(parsed);
        }
    }

    /// Number of `OTEL_EXPORTER_OTLP_HEADERS` entries dropped as malformed
    pub fn skipped_headers(&self) -> usize {
        self.skipped_headers
    }

    /// Resolve the exported service name and record where it came from
    pub fn resolve_service_name(&self) -> ResolvedServiceName {
        match self.service_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => ResolvedServiceName {
                name: name.to_string(),
                source: if self.service_name_from_env {
                    ServiceNameSource::Environment
                } else {
                    ServiceNameSource::Config
                },
            },
            _ => ResolvedServiceName {
                name: DEFAULT_SERVICE_NAME.to_string(),
                source: ServiceNameSource::Default,
            },
        }
    }
}

/// Parse `key1=value1,key2=value2` as used by `OTEL_EXPORTER_OTLP_HEADERS`
///
/// Keys and values are percent-decoded. Entries without `=` or with an empty
/// key are skipped with a warning; the entry text is not logged since values
/// usually carry API keys.
pub fn parse_headers(raw: &str) -> BTreeMap<String, String> {
    parse_header_entries(raw).0
}

fn parse_header_entries(raw: &str) -> (BTreeMap<String, String>, usize) {
    let mut headers = BTreeMap::new();
    let mut skipped = 0;
    for (index, entry) in raw.split(',').map(str::trim).enumerate() {
        if entry.is_empty() {
            continue;
        }
        let Some((key, value)) = entry.split_once('=') else {
            warn!("Skipping {} entry {}: expected key=value", HEADERS_VAR, index);
            skipped += 1;
            continue;
        };
        let key = decode_header_part(key);
        if key.is_empty() {
            warn!("Skipping {} entry {}: empty header name", HEADERS_VAR, index);
            skipped += 1;
            continue;
        }
        headers.insert(key, decode_header_part(value));
    }
    (headers, skipped)
}

fn decode_header_part(part: &str) -> String {
    percent_decode_str(part.trim()).decode_utf8_lossy().trim().to_string()
}

/// Per-run session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pause taken after each control span opens, before its results
    #[serde(with = "humantime_serde")]
    pub control_delay: Duration,

    /// Upper bound on the blocking flush at the end of a run
    #[serde(with = "humantime_serde")]
    pub flush_timeout: Duration,

    /// Instrumentation scope name for report spans
    pub tracer_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_delay: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(30),
            tracer_name: "inspec".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: LogFormat,
    /// Forward the process's own `tracing` spans to the span exporter
    pub export_host_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            export_host_spans: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_from(None, &HashMap::new()).unwrap();
        assert_eq!(config.session.control_delay, Duration::from_secs(5));
        assert_eq!(config.session.flush_timeout, Duration::from_secs(30));
        assert_eq!(config.session.tracer_name, "inspec");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.exporter.endpoint.is_none());
        assert_eq!(
            config.exporter.resolve_service_name(),
            ResolvedServiceName {
                name: DEFAULT_SERVICE_NAME.to_string(),
                source: ServiceNameSource::Default,
            }
        );
    }

    #[test]
    fn test_service_name_env_overrides_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[exporter]\nservice_name = \"from-file\"").unwrap();

        let config = Config::load_from(Some(file.path()), &HashMap::new()).unwrap();
        let resolved = config.exporter.resolve_service_name();
        assert_eq!(resolved.name, "from-file");
        assert_eq!(resolved.source, ServiceNameSource::Config);

        let config = Config::load_from(
            Some(file.path()),
            &env(&[(SERVICE_NAME_VAR, "compliance-nightly")]),
        )
        .unwrap();
        let resolved = config.exporter.resolve_service_name();
        assert_eq!(resolved.name, "compliance-nightly");
        assert_eq!(resolved.source, ServiceNameSource::Environment);
    }

    #[test]
    fn test_blank_service_name_falls_back() {
        let config = Config::load_from(None, &env(&[(SERVICE_NAME_VAR, "  ")])).unwrap();
        assert_eq!(
            config.exporter.resolve_service_name().source,
            ServiceNameSource::Default
        );
    }

    #[test]
    fn test_file_settings() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[session]
control_delay = "250ms"
flush_timeout = "2s"

[logging]
level = "debug"
format = "json"
export_host_spans = false
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path()), &HashMap::new()).unwrap();
        assert_eq!(config.session.control_delay, Duration::from_millis(250));
        assert_eq!(config.session.flush_timeout, Duration::from_secs(2));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.export_host_spans);
    }

    #[test]
    fn test_prefixed_env_overrides() {
        let config = Config::load_from(
            None,
            &env(&[
                ("SCANTRACE_SESSION__CONTROL_DELAY", "0s"),
                ("SCANTRACE_LOGGING__LEVEL", "warn"),
            ]),
        )
        .unwrap();
        assert!(config.session.control_delay.is_zero());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_endpoint_resolution() {
        let config =
            Config::load_from(None, &env(&[(ENDPOINT_VAR, "https://api.honeycomb.io/")])).unwrap();
        assert_eq!(
            config.exporter.endpoint.as_deref(),
            Some("https://api.honeycomb.io/v1/traces")
        );

        let config = Config::load_from(
            None,
            &env(&[
                (ENDPOINT_VAR, "https://api.honeycomb.io"),
                (TRACES_ENDPOINT_VAR, "https://collector.internal:4318/custom"),
            ]),
        )
        .unwrap();
        assert_eq!(
            config.exporter.endpoint.as_deref(),
            Some("https://collector.internal:4318/custom")
        );
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers("x-honeycomb-team=abc123, x-honeycomb-dataset = scans ,");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-honeycomb-team"], "abc123");
        assert_eq!(headers["x-honeycomb-dataset"], "scans");
    }

    #[test]
    fn test_parse_headers_percent_decodes() {
        let headers = parse_headers("authorization=Basic%20dXNlcjpwYXNz,x-team%2Did=a%3Db%2Cc");
        assert_eq!(headers["authorization"], "Basic dXNlcjpwYXNz");
        assert_eq!(headers["x-team-id"], "a=b,c");
    }

    #[test]
    fn test_parse_headers_skips_malformed_entries() {
        let headers = parse_headers("no-equals-sign,=value, x-honeycomb-team=abc123");
        assert_eq!(
            headers,
            BTreeMap::from([("x-honeycomb-team".to_string(), "abc123".to_string())])
        );
    }

    #[test]
    fn test_malformed_headers_do_not_block_loading() {
        let config =
            Config::load_from(None, &env(&[(HEADERS_VAR, "x-honeycomb-team")])).unwrap();
        assert!(config.exporter.headers.is_empty());
        assert_eq!(config.exporter.skipped_headers(), 1);

        let config = Config::load_from(
            None,
            &env(&[(HEADERS_VAR, "x-honeycomb-team,x-honeycomb-dataset=scans")]),
        )
        .unwrap();
        assert_eq!(config.exporter.headers.len(), 1);
        assert_eq!(config.exporter.headers["x-honeycomb-dataset"], "scans");
        assert_eq!(config.exporter.skipped_headers(), 1);
    }

    #[test]
    fn test_zero_flush_timeout_rejected() {
        let result = Config::load_from(None, &env(&[("SCANTRACE_SESSION__FLUSH_TIMEOUT", "0s")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
