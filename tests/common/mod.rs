#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proxy_probe::probe::{ProbeError, ProbeTarget, Prober};
use proxy_probe::types::ProbeResult;

pub const PROBE_HOST: &str = "probe.test";
pub const OWN_IP: &str = "9.9.9.9";

#[derive(Debug, Clone)]
pub enum Reply {
    Body(&'static str, u64),
    Json(String, u64),
    Refused,
    Hang,
    Panic,
}

/// In-memory prober: replies are looked up by connect host, the probe host
/// answers with `OWN_IP`, unknown hosts are refused.
pub struct ScriptedProber {
    replies: HashMap<String, Reply>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn reply(mut self, host: impl Into<String>, reply: Reply) -> Self {
        self.replies.insert(host.into(), reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of concurrent proxied probes observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
    ) -> Result<ProbeResult, ProbeError> {
        if target.connect_host == PROBE_HOST {
            return Ok(ProbeResult {
                body: format!("{{\"myip\":\"{OWN_IP}\"}}"),
                latency_ms: 3,
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.replies.get(&target.connect_host).cloned() {
            Some(Reply::Body(body, latency_ms)) => Ok(ProbeResult {
                body: body.to_string(),
                latency_ms,
            }),
            Some(Reply::Json(body, latency_ms)) => Ok(ProbeResult { body, latency_ms }),
            Some(Reply::Hang) => {
                tokio::time::sleep(timeout).await;
                Err(ProbeError::Timeout(timeout))
            }
            Some(Reply::Panic) => panic!("scripted panic for {}", target.connect_host),
            Some(Reply::Refused) | None => Err(ProbeError::Connect {
                addr: format!("{}:{}", target.connect_host, target.connect_port),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

pub fn live_reply(ip: &str) -> Reply {
    Reply::Json(
        format!("{{\"myip\":\"{ip}\",\"countryCode\":\"DE\",\"org\":\"Relay GmbH\"}}"),
        25,
    )
}

pub fn as_prober(p: ScriptedProber) -> (Arc<ScriptedProber>, Arc<dyn Prober>) {
    let p = Arc::new(p);
    let dynp: Arc<dyn Prober> = p.clone();
    (p, dynp)
}

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("proxy-probe-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
