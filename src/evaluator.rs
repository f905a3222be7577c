//! Liveness decision for one candidate: a direct and a proxied probe, joined.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::candidates::parse_candidate;
use crate::config::CheckerConfig;
use crate::probe::{ProbeError, ProbeTarget, Prober};
use crate::types::{Candidate, LivenessRecord};

/// Report fields that may carry the caller's apparent address, in lookup order.
pub const ADDRESS_FIELDS: &[&str] = &["myip", "ip"];

#[derive(Debug, Error)]
enum CheckError {
    #[error("{which} probe failed: {source}")]
    Probe {
        which: &'static str,
        #[source]
        source: ProbeError,
    },

    #[error("{which} body is not JSON: {source}")]
    Parse {
        which: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{which} body is not a JSON object")]
    NotAnObject { which: &'static str },
}

pub struct LivenessEvaluator {
    prober: Arc<dyn Prober>,
    config: CheckerConfig,
}

impl LivenessEvaluator {
    pub fn new(prober: Arc<dyn Prober>, config: CheckerConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check one raw candidate token. Never fails: every error is a not-live record.
    pub async fn evaluate(&self, token: &str) -> LivenessRecord {
        let Some(candidate) = parse_candidate(token) else {
            debug!(token, "malformed candidate");
            return LivenessRecord::not_live();
        };
        self.evaluate_candidate(&candidate).await
    }

    pub async fn evaluate_candidate(&self, candidate: &Candidate) -> LivenessRecord {
        match self.check(candidate).await {
            Ok(record) => record,
            Err(e) => {
                debug!(%candidate, error = %e, "candidate rejected");
                LivenessRecord::not_live()
            }
        }
    }

    async fn check(&self, candidate: &Candidate) -> Result<LivenessRecord, CheckError> {
        let proxied_target = ProbeTarget {
            connect_host: candidate.host.clone(),
            connect_port: candidate.port,
            request_host: self.config.probe_host.clone(),
            path: self.config.probe_path.clone(),
        };
        let direct_target = ProbeTarget {
            connect_host: self.config.probe_host.clone(),
            connect_port: self.config.probe_port,
            ..proxied_target.clone()
        };

        // Join, not race: both outcomes are needed, and the total wait is one timeout.
        let (proxied, direct) = tokio::join!(
            self.prober.probe(&proxied_target, self.config.timeout),
            self.prober.probe(&direct_target, self.config.timeout),
        );
        let proxied = proxied.map_err(|source| CheckError::Probe {
            which: "proxied",
            source,
        })?;
        let direct = direct.map_err(|source| CheckError::Probe {
            which: "direct",
            source,
        })?;

        let mut report = parse_report(&proxied.body, "proxied")?;
        let own = parse_report(&direct.body, "direct")?;

        let Some((field, observed)) = address_of(&report) else {
            debug!(%candidate, "proxied report has no address");
            return Ok(LivenessRecord::not_live());
        };
        if address_of(&own).map(|(_, ip)| ip) == Some(observed.clone()) {
            debug!(%candidate, ip = %observed, "proxy did not change egress address");
            return Ok(LivenessRecord::not_live());
        }

        report.remove(field);
        Ok(LivenessRecord::live(
            candidate,
            observed,
            proxied.latency_ms,
            flatten_metadata(report),
        ))
    }
}

fn parse_report(body: &str, which: &'static str) -> Result<Map<String, Value>, CheckError> {
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CheckError::NotAnObject { which }),
        Err(source) => Err(CheckError::Parse { which, source }),
    }
}

/// First non-empty string address field of a report.
fn address_of(report: &Map<String, Value>) -> Option<(&'static str, String)> {
    ADDRESS_FIELDS.iter().find_map(|&field| match report.get(field) {
        Some(Value::String(ip)) if !ip.is_empty() => Some((field, ip.clone())),
        _ => None,
    })
}

/// Strings stay as-is, nulls are dropped, anything else keeps its JSON text.
fn flatten_metadata(report: Map<String, Value>) -> BTreeMap<String, String> {
    report
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect()
}
