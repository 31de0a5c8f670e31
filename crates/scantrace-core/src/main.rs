//! ScanTrace CLI
//!
//! Reads a scan report, exports it as a span tree, and writes the report back out.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, info_span, warn};

use scantrace::config::Config;
use scantrace::models::ScanReport;
use scantrace::{logging, telemetry, TraceSession};

/// ScanTrace - compliance scan reports as distributed traces
#[derive(Parser)]
#[command(name = "scantrace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SCANTRACE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scan report as spans and write it back out
    Report {
        /// Report JSON file, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the pause taken after each control span opens (e.g. "0s", "500ms")
        #[arg(long, value_parser = humantime::parse_duration)]
        control_delay: Option<Duration>,
    },

    /// Print the resolved configuration
    Config,
}

fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Report {
            input,
            output,
            control_delay,
        } => run_report(config, cli.verbose, &input, output.as_deref(), control_delay),
        Commands::Config => run_config(&config, cli.verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_report(
    mut config: Config,
    verbose: bool,
    input: &Path,
    output: Option<&Path>,
    control_delay: Option<Duration>,
) -> anyhow::Result<()> {
    // telemetry setup failures must not cost the caller its report
    let provider = telemetry::install(&config.exporter);
    logging::init(&config.logging, verbose, provider.as_ref().ok())?;
    if config.exporter.skipped_headers() > 0 {
        warn!(
            skipped = config.exporter.skipped_headers(),
            "Ignored malformed OTEL_EXPORTER_OTLP_HEADERS entries"
        );
    }

    let report = read_report(input)?;

    let report = match provider {
        Ok(provider) => {
            let service = config.exporter.resolve_service_name();
            info!(
                service_name = %service.name,
                source = %service.source,
                endpoint = config.exporter.endpoint.as_deref().unwrap_or("default"),
                "Span exporter configured"
            );

            if let Some(delay) = control_delay {
                config.session.control_delay = delay;
            }
            let session = TraceSession::new(provider.clone(), service.name, config.session);
            let report = info_span!(target: logging::DRIVER_TARGET, "scantrace.report")
                .in_scope(|| session.run(report));

            if let Err(e) = provider.shutdown() {
                warn!("Tracer provider shutdown failed: {}", e);
            }
            report
        }
        Err(e) => {
            warn!("Telemetry disabled for this run: {}", e);
            report
        }
    };

    write_report(&report, output)
}

fn run_config(config: &Config, verbose: bool) -> anyhow::Result<()> {
    logging::init(&config.logging, verbose, None)?;

    let mut shown = serde_json::to_value(config)?;
    // header values carry API keys
    if let Some(headers) = shown
        .pointer_mut("/exporter/headers")
        .and_then(|h| h.as_object_mut())
    {
        for value in headers.values_mut() {
            *value = json!("<redacted>");
        }
    }

    let resolved = json!({
        "service_name": config.exporter.resolve_service_name(),
        "config": shown,
    });
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn read_report(input: &Path) -> anyhow::Result<ScanReport> {
    let reader: Box<dyn Read> = if input == Path::new("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(
            File::open(input)
                .with_context(|| format!("failed to open report {}", input.display()))?,
        )
    };

    serde_json::from_reader(BufReader::new(reader)).context("failed to parse scan report")
}

fn write_report(report: &ScanReport, output: Option<&Path>) -> anyhow::Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let mut writer = BufWriter::new(writer);
    serde_json::to_writer(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
