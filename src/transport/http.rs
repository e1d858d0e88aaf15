//! Blocking HTTP delegate transport.

use std::sync::Arc;

use reqwest::blocking::Client;
use tracing::debug;

use super::{FetchSpec, StreamTransport};
use crate::error::TransportError;

/// Accepts or rejects a response content type before the payload is consumed.
pub type ContentTypePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Streaming HTTP delegate backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: Client,
    content_type_predicate: Option<ContentTypePredicate>,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            content_type_predicate: None,
        }
    }

    /// Reject responses whose content type fails `predicate`.
    pub fn with_content_type_predicate(mut self, predicate: ContentTypePredicate) -> Self {
        self.content_type_predicate = Some(predicate);
        self
    }
}

impl StreamTransport for HttpTransport {
    fn open(&self, spec: &FetchSpec) -> Result<u64, TransportError> {
        let mut req = self
            .client
            .request(spec.method.clone(), spec.url.as_str())
            .headers(spec.headers.clone())
            .header("Accept", "*/*")
            .header("Accept-Encoding", "identity");

        if let Some(range) = spec.range_header() {
            req = req.header("Range", range);
        }
        if let Some(body) = &spec.body {
            req = req.body(body.to_vec());
        }

        let res = req.send()?;
        let status = res.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: spec.url.clone(),
            });
        }

        if let Some(predicate) = &self.content_type_predicate {
            let content_type = res
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            if !predicate(&content_type) {
                return Err(TransportError::InvalidContentType { content_type });
            }
        }

        // Resolve the byte count of this open: the requested length when the
        // caller bounded the read, else Content-Length, else the drained body.
        let byte_count = match spec.length {
            Some(len) => len,
            None => match res.content_length() {
                Some(n) => n,
                None => res.bytes()?.len() as u64,
            },
        };

        debug!("HttpTransport: opened {} ({} bytes)", spec.url, byte_count);
        Ok(byte_count)
    }
}
