use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::types::Candidate;

/// Port used when a token carries no port part.
pub const DEFAULT_PROXY_PORT: u16 = 443;

/// Parse one candidate token into host and port.
///
/// The token is split on every run of characters that are not ASCII
/// alphanumerics or `.`, so `1.2.3.4:8443`, `1.2.3.4 8443` and `1.2.3.4,8443`
/// all yield the same candidate. Pieces after the port are ignored.
/// Returns `None` for empty tokens, a missing host, or a port that is not a
/// non-zero `u16`.
pub fn parse_candidate(token: &str) -> Option<Candidate> {
    let is_sep = |c: char| !(c.is_ascii_alphanumeric() || c == '.');

    // A leading separator means the host part is missing, not shifted.
    if token.starts_with(is_sep) {
        return None;
    }

    let mut parts = token.split(is_sep).filter(|p| !p.is_empty());
    let host = parts.next()?;
    let port = match parts.next() {
        Some(p) => p.parse::<u16>().ok().filter(|&p| p != 0)?,
        None => DEFAULT_PROXY_PORT,
    };

    Some(Candidate {
        host: host.to_string(),
        port,
    })
}

/// Split list content into unique candidate tokens.
///
/// Lines are trimmed; blank lines and `#` comments are skipped. Literal
/// duplicates are dropped, keeping the order of first appearance. Tokens are
/// not validated here: malformed ones are rejected per candidate at check time.
pub fn parse_candidates_str(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for raw_line in s.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if seen.insert(line) {
            out.push(line.to_string());
        }
    }

    out
}

/// Load unique candidate tokens from a file path. Errors if the file cannot be read.
pub fn load_candidates_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref()).with_context(|| {
        format!(
            "failed to read candidate list: {}",
            path.as_ref().display()
        )
    })?;
    Ok(parse_candidates_str(&content))
}
