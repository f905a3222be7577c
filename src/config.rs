//! Checker configuration with builder-style setters.

use std::path::PathBuf;
use std::time::Duration;

/// Default host queried for the caller's apparent address.
pub const DEFAULT_PROBE_HOST: &str = "myip.bexcode.us.to";

/// Default request path on the probe host.
pub const DEFAULT_PROBE_PATH: &str = "/";

/// Default TLS port of the probe host for direct probes.
pub const DEFAULT_PROBE_PORT: u16 = 443;

/// Default per-probe timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default number of candidates checked concurrently by one worker.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Worker count used when available parallelism cannot be determined.
pub const FALLBACK_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub probe_host: String,
    pub probe_path: String,
    pub probe_port: u16,
    /// Hard deadline for one probe, connect through EOF.
    pub timeout: Duration,
    pub batch_size: usize,
    /// Fixed worker count; `None` derives it from available parallelism.
    pub workers: Option<usize>,
    pub accept_invalid_certs: bool,
    /// Incrementally appended line log of live proxies.
    pub append_log: Option<PathBuf>,
    /// Final JSON report written once after all workers finish.
    pub report_path: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            probe_host: DEFAULT_PROBE_HOST.to_string(),
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            probe_port: DEFAULT_PROBE_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: None,
            accept_invalid_certs: false,
            append_log: None,
            report_path: None,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe_host(mut self, host: impl Into<String>) -> Self {
        self.probe_host = host.into();
        self
    }

    pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    pub fn with_probe_port(mut self, port: u16) -> Self {
        self.probe_port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Zero is clamped to one so a worker always makes progress.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_append_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.append_log = Some(path.into());
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }
}
