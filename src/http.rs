//! Outbound HTTP seam.
//!
//! Every third-party lookup (IP providers, reverse geocoding, feeds) goes
//! through [`HttpClient`], so the fallback chain can be driven by a scripted
//! client in tests and by `ureq` in production.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why a single GET did not produce a JSON document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Body(String),
    #[error("request worker failed: {0}")]
    Worker(String),
}

/// One JSON GET, no retry.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Blocking `ureq` agent driven from tokio's blocking pool.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(user_agent)
            .timeout(timeout)
            .build();
        Self { agent }
    }
}

#[async_trait]
impl HttpClient for UreqClient {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let agent = self.agent.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url))
            .await
            .map_err(|e| FetchError::Worker(e.to_string()))?
    }
}

fn fetch_blocking(agent: &ureq::Agent, url: &str) -> Result<Value, FetchError> {
    let response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => FetchError::Status(code),
        ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
    })?;

    response
        .into_json::<Value>()
        .map_err(|e| FetchError::Body(e.to_string()))
}

/// Append query parameters to `base`, percent-encoding the values.
pub fn with_query(base: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}{}{}", base, sep, query)
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_appends() {
        let url = with_query(
            "https://example.test/reverse",
            &[("latitude", "37.77".into()), ("longitude", "-122.42".into())],
        );
        assert_eq!(url, "https://example.test/reverse?latitude=37.77&longitude=-122.42");
    }

    #[test]
    fn test_with_query_existing_params() {
        let url = with_query("https://example.test/r?x=1", &[("q", "a b&c".into())]);
        assert_eq!(url, "https://example.test/r?x=1&q=a%20b%26c");
    }

    #[test]
    fn test_with_query_empty() {
        assert_eq!(with_query("https://example.test/", &[]), "https://example.test/");
    }
}
