use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use proxy_probe::candidates::load_candidates_from_path;
use proxy_probe::config::{
    CheckerConfig, DEFAULT_BATCH_SIZE, DEFAULT_PROBE_HOST, DEFAULT_PROBE_PATH, DEFAULT_TIMEOUT_MS,
};
use proxy_probe::evaluator::LivenessEvaluator;
use proxy_probe::pool::Coordinator;
use proxy_probe::probe::TlsProber;

/// proxy-probe — check TLS proxies by comparing the egress address seen through them with your own.
#[derive(Debug, Clone, Parser)]
#[command(name = "proxy-probe", version, long_about = None)]
struct Cli {
    /// Candidate list, one `host[:port]` per line.
    #[arg(long, default_value = "proxy/ProxyList.txt")]
    input: PathBuf,

    /// Incrementally appended list of live proxies.
    #[arg(long, default_value = "prxip.txt")]
    output: PathBuf,

    /// Final JSON report, written once when every worker has finished.
    #[arg(long, default_value = "prxip.json")]
    json: PathBuf,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Candidates checked concurrently by one worker.
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Worker count (defaults to available CPUs).
    #[arg(long)]
    workers: Option<usize>,

    /// Host that reports the caller's address as JSON.
    #[arg(long = "probe-host", default_value = DEFAULT_PROBE_HOST)]
    probe_host: String,

    /// Path requested on the probe host.
    #[arg(long = "probe-path", default_value = DEFAULT_PROBE_PATH)]
    probe_path: String,

    /// Skip TLS certificate verification.
    #[arg(long, default_value_t = false)]
    insecure: bool,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("reading candidate list {}", cli.input.display());
    let tokens = load_candidates_from_path(&cli.input)?;
    info!("loaded {} unique candidates", tokens.len());

    let mut config = CheckerConfig::new()
        .with_probe_host(cli.probe_host)
        .with_probe_path(cli.probe_path)
        .with_timeout(Duration::from_millis(cli.timeout_ms))
        .with_batch_size(cli.batch_size)
        .with_accept_invalid_certs(cli.insecure)
        .with_append_log(&cli.output)
        .with_report_path(&cli.json);
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }

    let prober = Arc::new(TlsProber::new(config.accept_invalid_certs)?);
    let evaluator = Arc::new(LivenessEvaluator::new(prober, config));

    // Ctrl-C stops workers between batches; the report is still written.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let report = Coordinator::new(evaluator)
        .with_cancel(cancel)
        .run(tokens)
        .await?;

    info!(
        "found {} working proxies; results saved to {} and {}",
        report.summary.total_live,
        cli.output.display(),
        cli.json.display()
    );
    Ok(())
}
