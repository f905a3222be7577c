use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::LivenessRecord;

pub const APPEND_LOG_HEADER: &str = "Proxy,Port,Country,Organization";

/// Durable destination for live records as workers discover them.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &LivenessRecord) -> Result<()>;
}

/// Line-per-proxy log shared by all workers.
///
/// Each line goes out in one `write_all` under the lock, so concurrent
/// workers never interleave partial lines.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl AppendLog {
    /// Truncate (or create) the log and write the header row.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::fs::write(&path, format!("{APPEND_LOG_HEADER}\n"))
            .await
            .with_context(|| format!("failed to create append log: {}", path.display()))?;
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open append log: {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for AppendLog {
    async fn append(&self, record: &LivenessRecord) -> Result<()> {
        let line = format_log_line(record);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// `host,port,country,organization` plus newline; absent fields are empty.
pub fn format_log_line(record: &LivenessRecord) -> String {
    let port = record.proxy_port.map(|p| p.to_string()).unwrap_or_default();
    let fields = [
        record.proxy_host.as_deref().unwrap_or(""),
        port.as_str(),
        record.country().unwrap_or(""),
        record.organization().unwrap_or(""),
    ];
    let mut line = fields.map(escape_field).join(",");
    line.push('\n');
    line
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write the final array of live records as pretty JSON.
pub fn write_records_json(path: &Path, records: &[LivenessRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}

/// Human duration such as `1 hours 2 minutes 3 seconds`; zero parts are skipped.
pub fn format_duration(elapsed_ms: u64) -> String {
    let total = elapsed_ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} hours"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minutes"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds} seconds"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candidate;
    use std::collections::BTreeMap;

    fn live(org: &str) -> LivenessRecord {
        let mut meta = BTreeMap::new();
        meta.insert("countryCode".to_string(), "US".to_string());
        meta.insert("org".to_string(), org.to_string());
        let c = Candidate {
            host: "1.2.3.4".into(),
            port: 443,
        };
        LivenessRecord::live(&c, "1.2.3.4".into(), 120, meta)
    }

    #[test]
    fn log_line_fields() {
        assert_eq!(format_log_line(&live("Acme")), "1.2.3.4,443,US,Acme\n");
    }

    #[test]
    fn log_line_quotes_commas() {
        assert_eq!(
            format_log_line(&live("Cloudflare, Inc.")),
            "1.2.3.4,443,US,\"Cloudflare, Inc.\"\n"
        );
    }

    #[test]
    fn log_line_missing_metadata_is_empty() {
        let c = Candidate {
            host: "5.6.7.8".into(),
            port: 8443,
        };
        let rec = LivenessRecord::live(&c, "5.6.7.8".into(), 10, BTreeMap::new());
        assert_eq!(format_log_line(&rec), "5.6.7.8,8443,,\n");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(999), "0 seconds");
        assert_eq!(format_duration(61_000), "1 minutes 1 seconds");
        assert_eq!(format_duration(3_600_000), "1 hours");
        assert_eq!(format_duration(3_723_000), "1 hours 2 minutes 3 seconds");
    }
}
