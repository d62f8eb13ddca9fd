use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regresshion_check::ports::parse_ports_str;
use regresshion_check::report::Report;
use regresshion_check::scanner::{self, ScanOptions, SharedProgress, DEFAULT_CONCURRENCY};
use regresshion_check::targets;
use regresshion_check::types::ProbeResult;
use regresshion_check::versions::VersionTables;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// regresshion-check — check SSH servers for OpenSSH builds affected by CVE-2024-6387.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "regresshion-check",
    version,
    about = "Check if servers are running a vulnerable version of OpenSSH (CVE-2024-6387).",
    long_about = None
)]
struct Cli {
    /// IP addresses, domain names, file paths containing IP addresses, or CIDR network ranges.
    targets: Vec<String>,

    /// Comma-separated list of port numbers (or ranges) to check.
    #[arg(short, long, default_value = "22")]
    ports: String,

    /// Connection timeout in seconds.
    #[arg(short, long, default_value_t = 1.0, value_parser = parse_timeout)]
    timeout: f64,

    /// File containing a list of targets to check.
    #[arg(short, long)]
    list: Option<PathBuf>,

    /// Seconds to wait after identifying the version to check for LoginGraceTime mitigation.
    #[arg(short, long, num_args = 0..=1, default_missing_value = "120", value_name = "SECONDS")]
    grace_time_check: Option<u64>,

    /// Resolve and display hostnames for IP addresses.
    #[arg(short, long, default_value_t = false)]
    dns_resolve: bool,

    /// Send a HELP request if the initial SSH banner retrieval returns nothing.
    #[arg(short, long, default_value_t = false)]
    use_help_request: bool,

    /// Max concurrent checks.
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// JSON file with `vulnerable_prefixes` and `patched_banners` replacing the built-in tables.
    #[arg(long, value_name = "FILE")]
    versions: Option<PathBuf>,

    /// Write results as pretty JSON to this path (optional).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {s}"));
    }
    Ok(v)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(level))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ports = parse_ports_str(&cli.ports).context("invalid --ports")?;
    let tables = match cli.versions.as_deref() {
        Some(path) => VersionTables::load(path)?,
        None => VersionTables::default(),
    };
    let grace_period = cli
        .grace_time_check
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs);

    let hosts = targets::collect_targets(&cli.targets, cli.list.as_deref()).await;
    if hosts.is_empty() {
        bail!("no targets to scan");
    }
    info!(hosts = hosts.len(), ports = ?ports, "starting scan");

    let opts = ScanOptions {
        timeout: Duration::from_secs_f64(cli.timeout),
        grace_period,
        use_help_request: cli.use_help_request,
        dns_resolve: cli.dns_resolve,
        concurrency: cli.concurrency,
    };

    let progress = SharedProgress::new();
    let reporter = tokio::spawn(report_progress(progress.clone()));
    let results = scanner::scan_targets_with_shared(
        &hosts,
        &ports,
        &opts,
        Arc::new(tables),
        progress.clone(),
    )
    .await?;
    reporter.abort();
    println!(
        "\rProgress: {}/{} checks performed",
        progress.completed(),
        progress.total()
    );

    let report = Report::from_results(&results, hosts.len(), grace_period.is_some());
    print!("{}", report.render());

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_results_json(path, &results) {
            eprintln!("Failed to write JSON to {}: {:#}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }

    Ok(())
}

async fn report_progress(progress: SharedProgress) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tick.tick().await;
        print!(
            "\rProgress: {}/{} checks performed",
            progress.completed(),
            progress.total()
        );
        let _ = std::io::stdout().flush();
    }
}

fn write_results_json(path: &std::path::Path, results: &[ProbeResult]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
