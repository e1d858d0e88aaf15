//! Resolution of a live-stream's canonical address into a freshly tokenized
//! fetch URL.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::common::http::DEFAULT_USER_AGENT;
use crate::error::ResolveError;

/// Budget for one resolver round trip, in seconds.
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 10;

/// External service that maps a live-stream's canonical address to a URL
/// carrying the currently valid token.
pub trait LiveUrlResolver: Send + Sync {
    fn resolve(&self, live_url: &str) -> Result<String, ResolveError>;
}

impl<R: LiveUrlResolver + ?Sized> LiveUrlResolver for std::sync::Arc<R> {
    fn resolve(&self, live_url: &str) -> Result<String, ResolveError> {
        (**self).resolve(live_url)
    }
}

/// Blocking HTTP resolver.
///
/// Expects a JSON payload carrying the tokenized stream URL at `data.url`,
/// falling back to a top-level `url` field.
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolver with its own client and timeout, independent of the
    /// transport's budget.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl LiveUrlResolver for HttpResolver {
    fn resolve(&self, live_url: &str) -> Result<String, ResolveError> {
        let res = self.client.get(live_url).send()?;

        let status = res.status();
        if matches!(status.as_u16(), 403 | 429) {
            return Err(ResolveError::AccessChallenge {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ResolveError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = res
            .json()
            .map_err(|e| ResolveError::Format(e.to_string()))?;

        let fresh = stream_url(&body).ok_or_else(|| {
            ResolveError::Format("no stream url in resolver response".to_string())
        })?;

        debug!("resolved live url: {} -> {}", live_url, fresh);
        Ok(fresh.to_string())
    }
}

fn stream_url(body: &Value) -> Option<&str> {
    body.get("data")
        .and_then(|d| d.get("url"))
        .or_else(|| body.get("url"))
        .and_then(|v| v.as_str())
}
