//! Single-shot TLS probe: one HTTP/1.1 GET per connection, read to EOF.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::trace;

use crate::types::ProbeResult;

/// Where to connect and which virtual host to ask for.
///
/// `connect_host:connect_port` is the TCP peer (the probe host itself or a
/// candidate proxy); `request_host` is sent both as TLS SNI and as the HTTP
/// `Host` header so a TLS-terminating relay can route to the right backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub connect_host: String,
    pub connect_port: u16,
    pub request_host: String,
    pub path: String,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("probe timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Performs one probe request. Implementations must release the connection
/// on every exit path, including when the returned future is dropped.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration)
        -> Result<ProbeResult, ProbeError>;
}

/// `Prober` backed by a TCP socket wrapped in native TLS.
#[derive(Clone)]
pub struct TlsProber {
    connector: tokio_native_tls::TlsConnector,
}

impl TlsProber {
    pub fn new(accept_invalid_certs: bool) -> Result<Self, ProbeError> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            connector: tokio_native_tls::TlsConnector::from(connector),
        })
    }

    async fn exchange(&self, target: &ProbeTarget) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();
        let addr = format!("{}:{}", target.connect_host, target.connect_port);
        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|source| ProbeError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let mut stream = self.connector.connect(&target.request_host, tcp).await?;

        stream
            .write_all(build_request(&target.request_host, &target.path).as_bytes())
            .await?;
        stream.flush().await?;

        let raw = read_to_close(&mut stream).await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let text = String::from_utf8_lossy(&raw);
        Ok(ProbeResult {
            body: split_body(&text).to_string(),
            latency_ms,
        })
    }
}

#[async_trait]
impl Prober for TlsProber {
    async fn probe(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
    ) -> Result<ProbeResult, ProbeError> {
        // Dropping the inner future on expiry closes the socket.
        match time::timeout(timeout, self.exchange(target)).await {
            Ok(res) => res,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}

/// Read until the peer closes.
///
/// A peer that drops the connection without close_notify after sending data
/// surfaces as `UnexpectedEof`; that counts as end of stream. Any other error,
/// or an abrupt close before the first byte, is returned.
pub async fn read_to_close<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(1024);
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return Ok(raw),
            Ok(n) => raw.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !raw.is_empty() => {
                trace!(received = raw.len(), "peer closed without close_notify");
                return Ok(raw);
            }
            Err(e) => return Err(e),
        }
    }
}

/// The fixed request shape: GET with `Connection: close`, one request per connection.
pub fn build_request(host: &str, path: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: Mozilla/5.0\r\n\
         Connection: close\r\n\r\n"
    )
}

/// Everything after the first blank line, or an empty body if there is none.
pub fn split_body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}
