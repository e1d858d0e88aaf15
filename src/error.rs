//! Crate-level error types.
//!
//! The proxy performs no local recovery: every failure is translated into a
//! caller-visible error for that single fetch invocation. A refresh failure
//! looks to the playback layer exactly like a failed segment fetch, and the
//! playback layer's own retry policy governs what happens next.

use thiserror::Error;

/// Result type returned by the refresh proxy.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors surfaced by [`RefreshProxy::fetch`](crate::RefreshProxy::fetch)
/// and [`SourceFactory::build`](crate::SourceFactory::build).
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request URL carries no token marker, so no key can be extracted.
    #[error("request URL is missing the token marker: {url}")]
    MalformedRequest {
        /// The offending request URL.
        url: String,
    },

    /// The factory was handed an empty live-stream URL.
    #[error("live-stream URL must not be empty")]
    EmptyLiveUrl,

    /// Building the underlying HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Token re-resolution failed. Fatal for the in-flight fetch; the
    /// delegate transport is never invoked.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] ResolveError),

    /// Delegate transport failure, surfaced unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of the external URL-resolution service.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-level failure reaching the resolver.
    #[error("resolver request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Resolver answered with a non-success status.
    #[error("resolver returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Bot-check / rate-limit style rejection (403, 429).
    #[error("resolver access challenge: HTTP {status}")]
    AccessChallenge {
        /// HTTP status code.
        status: u16,
    },

    /// Resolver response body was not the expected JSON shape.
    #[error("malformed resolver response: {0}")]
    Format(String),

    /// The resolved URL carries no extractable token key.
    #[error("no token key in resolved URL: {url}")]
    Parse {
        /// The URL the resolver handed back.
        url: String,
    },
}

/// Failures of the delegate transport once a request is dispatched.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure.
    #[error("transport request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Origin answered with a non-success status.
    #[error("transport HTTP {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// Response content type was rejected by the configured predicate.
    #[error("rejected content type: {content_type}")]
    InvalidContentType {
        /// The content type the origin sent.
        content_type: String,
    },
}
