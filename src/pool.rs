//! Worker pool: contiguous partitions, batched checks, explicit join barrier.

use std::num::NonZeroUsize;
use std::sync::Arc;

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{Discovery, ResultAggregator};
use crate::config::FALLBACK_WORKERS;
use crate::evaluator::LivenessEvaluator;
use crate::output::{format_duration, write_records_json, AppendLog, RecordSink};
use crate::types::{RunSummary, ScanReport};

/// Capacity of the discovery channel between workers and the aggregator.
const DISCOVERY_CHANNEL_CAPACITY: usize = 1024;

/// Parallel execution units of this machine, if the platform reports them.
pub fn available_workers() -> Option<usize> {
    std::thread::available_parallelism()
        .ok()
        .map(NonZeroUsize::get)
}

/// `min(units, candidates)`, with `FALLBACK_WORKERS` standing in for unknown units.
pub fn worker_count(units: Option<usize>, candidates: usize) -> usize {
    units.unwrap_or(FALLBACK_WORKERS).max(1).min(candidates)
}

/// Split into contiguous chunks of `ceil(len / workers)`; only non-empty chunks are returned.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() || workers == 0 {
        return Vec::new();
    }
    let chunk = items.len().div_ceil(workers);
    let mut out = Vec::with_capacity(workers);
    let mut rest = items;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk.min(rest.len()));
        out.push(rest);
        rest = tail;
    }
    out
}

/// What one worker did before it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub checked: usize,
    pub live: usize,
}

#[derive(Clone)]
struct WorkerContext {
    evaluator: Arc<LivenessEvaluator>,
    batch_size: usize,
    tx: mpsc::Sender<Discovery>,
    log: Option<Arc<dyn RecordSink>>,
    cancel: CancellationToken,
}

/// Supervises one run: spawns workers, waits for every one of them, then
/// finalises the aggregated report.
pub struct Coordinator {
    evaluator: Arc<LivenessEvaluator>,
    cancel: CancellationToken,
    sink: Option<Arc<dyn RecordSink>>,
}

impl Coordinator {
    pub fn new(evaluator: Arc<LivenessEvaluator>) -> Self {
        Self {
            evaluator,
            cancel: CancellationToken::new(),
            sink: None,
        }
    }

    /// Cancelling the token stops workers before their next batch.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use `sink` for discovered records instead of opening `append_log`.
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Check every token and return the final report.
    ///
    /// Only setup failures (append log, report file) are errors; per-candidate
    /// and per-worker failures are absorbed into the summary. The report file
    /// holds the array of live records; the summary is logged.
    pub async fn run(&self, tokens: Vec<String>) -> Result<ScanReport> {
        let start = Instant::now();
        let config = self.evaluator.config();
        let total = tokens.len();
        let workers = worker_count(config.workers.or_else(available_workers), total);

        let log: Option<Arc<dyn RecordSink>> = match (&self.sink, &config.append_log) {
            (Some(sink), _) => Some(sink.clone()),
            (None, Some(path)) => Some(Arc::new(AppendLog::create(path).await?)),
            (None, None) => None,
        };

        info!(candidates = total, workers, "starting proxy check");

        let (tx, rx) = mpsc::channel(DISCOVERY_CHANNEL_CAPACITY);
        let collector = ResultAggregator::spawn(rx);

        let ctx = WorkerContext {
            evaluator: self.evaluator.clone(),
            batch_size: config.batch_size.max(1),
            tx,
            log,
            cancel: self.cancel.clone(),
        };

        let mut set = JoinSet::new();
        for (worker, chunk) in partition(tokens, workers).into_iter().enumerate() {
            let ctx = ctx.clone();
            set.spawn(async move { (worker, run_worker(worker, chunk, ctx).await) });
        }
        let spawned = set.len();
        // Workers hold the remaining senders; the collector ends when the last one exits.
        drop(ctx);

        let mut failed = 0usize;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(report))) => {
                    debug!(
                        worker = report.worker,
                        checked = report.checked,
                        live = report.live,
                        "worker finished"
                    );
                }
                Ok((worker, Err(e))) => {
                    failed += 1;
                    let error = format!("{e:#}");
                    warn!(worker, %error, "worker failed");
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "worker task aborted");
                }
            }
        }

        let aggregator = collector
            .await
            .map_err(|e| anyhow!("result aggregator task failed: {e}"))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let summary = RunSummary {
            total_candidates: total as u64,
            total_live: aggregator.len() as u64,
            elapsed_ms,
            workers: spawned,
            failed_workers: failed,
            finished_at: now_rfc3339(),
        };
        let report = aggregator.into_report(summary);

        if let Some(path) = &config.report_path {
            write_records_json(path, &report.proxies)
                .with_context(|| format!("failed to write report {}", path.display()))?;
        }

        info!(
            live = report.summary.total_live,
            failed_workers = failed,
            "check completed in {}",
            format_duration(elapsed_ms)
        );
        Ok(report)
    }
}

/// Check one partition batch by batch; batch N+1 starts only after batch N resolved.
async fn run_worker(worker: usize, tokens: Vec<String>, ctx: WorkerContext) -> Result<WorkerReport> {
    let mut report = WorkerReport {
        worker,
        checked: 0,
        live: 0,
    };

    for batch in tokens.chunks(ctx.batch_size) {
        if ctx.cancel.is_cancelled() {
            debug!(worker, "cancelled before next batch");
            break;
        }

        let mut set = JoinSet::new();
        for token in batch {
            let evaluator = ctx.evaluator.clone();
            let token = token.clone();
            set.spawn(async move { evaluator.evaluate(&token).await });
        }

        while let Some(joined) = set.join_next().await {
            report.checked += 1;
            let record = match joined {
                Ok(record) => record,
                Err(e) => {
                    warn!(worker, error = %e, "candidate check aborted");
                    continue;
                }
            };
            if !record.is_live {
                continue;
            }

            info!(
                host = record.proxy_host.as_deref().unwrap_or(""),
                port = record.proxy_port.unwrap_or_default(),
                country = record.country().unwrap_or("-"),
                org = record.organization().unwrap_or("-"),
                "found live proxy"
            );
            report.live += 1;
            let line = record.clone();
            ctx.tx
                .send(Discovery { worker, record })
                .await
                .map_err(|_| anyhow!("result aggregator closed"))?;
            if let Some(log) = &ctx.log {
                log.append(&line).await?;
            }
        }
    }

    Ok(report)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
