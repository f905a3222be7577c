//! Collects discovery events from workers into one append-only result set.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{LivenessRecord, RunSummary, ScanReport};

/// Message sent by a worker for each newly confirmed live proxy.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub worker: usize,
    pub record: LivenessRecord,
}

#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<LivenessRecord>,
    events: u64,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a live record. Returns `false` for non-live records.
    ///
    /// Partitions are disjoint, so each discovery already stands for one
    /// distinct input line; nothing is deduplicated here.
    pub fn record(&mut self, record: LivenessRecord) -> bool {
        self.events += 1;
        if !record.is_live {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Drain the channel until every sender is dropped, then hand back the collection.
    ///
    /// Completion is tied to the senders, so the collection resolves exactly
    /// once no matter how or in which order workers exit.
    pub fn spawn(mut rx: mpsc::Receiver<Discovery>) -> JoinHandle<ResultAggregator> {
        tokio::spawn(async move {
            let mut agg = ResultAggregator::new();
            while let Some(Discovery { record, .. }) = rx.recv().await {
                agg.record(record);
            }
            agg
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discovery messages received.
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn records(&self) -> &[LivenessRecord] {
        &self.records
    }

    pub fn into_report(self, summary: RunSummary) -> ScanReport {
        ScanReport {
            summary,
            proxies: self.records,
        }
    }
}
