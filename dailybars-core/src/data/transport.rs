//! HTTP transport seam.
//!
//! The client talks to the service only through [`Transport`], so it can be
//! driven by canned replies in tests. [`BlockingTransport`] is the production
//! implementation on top of `reqwest::blocking`.

use thiserror::Error;

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The request did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// One synchronous GET with query parameters.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply, TransportError> {
        (**self).get(url, query)
    }
}

/// `reqwest::blocking` transport. Uses the library's default timeout; no retries.
#[derive(Debug, Clone)]
pub struct BlockingTransport {
    client: reqwest::blocking::Client,
}

impl BlockingTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("dailybars/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for BlockingTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply, TransportError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| TransportError(describe(e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| TransportError(format!("failed to read response body: {e}")))?;
        Ok(HttpReply { status, body })
    }
}

/// `reqwest` errors embed the full URL, query string included. Strip it so the
/// API key never ends up in an error message or log line.
fn describe(err: reqwest::Error) -> String {
    let what = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "could not connect to service"
    } else if err.is_request() {
        "request could not be sent"
    } else {
        "request failed"
    };
    let detail = err.without_url().to_string();
    format!("{what}: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range_is_2xx() {
        assert!(HttpReply::ok("{}").is_success());
        assert!(HttpReply::with_status(204, "").is_success());
        assert!(!HttpReply::with_status(301, "").is_success());
        assert!(!HttpReply::with_status(429, "").is_success());
        assert!(!HttpReply::with_status(503, "").is_success());
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        let transport = BlockingTransport::new().unwrap();
        // Port 9 (discard) is closed on any sane test host.
        let err = transport
            .get("http://127.0.0.1:9/query", &[("apikey", "secret-key")])
            .unwrap_err();
        assert!(!err.0.contains("secret-key"), "key leaked: {}", err.0);
    }
}
