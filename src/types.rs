use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One proxy entry from the input list, parsed from a `host[:port]` token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Body and wall-clock latency of one completed probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub body: String,
    pub latency_ms: u64,
}

/// Outcome of checking one candidate.
///
/// When `is_live` is false every other field is empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LivenessRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    pub is_live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl LivenessRecord {
    pub fn live(
        candidate: &Candidate,
        observed_ip: String,
        latency_ms: u64,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            proxy_host: Some(candidate.host.clone()),
            proxy_port: Some(candidate.port),
            is_live: true,
            observed_ip: Some(observed_ip),
            latency_ms: Some(latency_ms),
            metadata,
        }
    }

    pub fn not_live() -> Self {
        Self::default()
    }

    pub fn country(&self) -> Option<&str> {
        self.metadata.get("countryCode").map(String::as_str)
    }

    pub fn organization(&self) -> Option<&str> {
        self.metadata.get("org").map(String::as_str)
    }
}

/// Terminal counters for a finished run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_candidates: u64,
    pub total_live: u64,
    pub elapsed_ms: u64,
    pub workers: usize,
    pub failed_workers: usize,
    pub finished_at: String,
}

/// Outcome of a run: summary plus every live record in discovery order.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub summary: RunSummary,
    pub proxies: Vec<LivenessRecord>,
}
