//! Delegate transport seam.
//!
//! [`FetchSpec`] is the request descriptor the playback pipeline hands to
//! [`StreamTransport::open`]; the refresh proxy rewrites only its URL and
//! passes every other field through untouched.
//!
//! # Module layout
//!
//! ```text
//! src/transport/
//! ├── mod.rs   ← FetchSpec + StreamTransport trait
//! └── http.rs  ← HttpTransport (blocking reqwest delegate)
//! ```

pub mod http;

pub use http::HttpTransport;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::error::TransportError;

/// Allow the server to send a gzipped response body.
pub const FLAG_ALLOW_GZIP: u32 = 1;
/// Allow caching the payload even when its length cannot be resolved up
/// front.
pub const FLAG_ALLOW_CACHING_UNKNOWN_LENGTH: u32 = 1 << 1;

/// A single segment/manifest fetch, as issued by the playback pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSpec {
    /// Absolute request URL, token key included.
    pub url: String,
    pub method: Method,
    /// Request body, if any.
    pub body: Option<Bytes>,
    /// Position of the first requested byte within the full stream.
    pub absolute_stream_position: u64,
    /// Position of the first requested byte within the addressed resource.
    pub position: u64,
    /// Number of bytes to read, `None` to read to the end.
    pub length: Option<u64>,
    /// Cache/storage key for the fetched data, if any.
    pub key: Option<String>,
    /// Bitwise OR of the `FLAG_*` constants.
    pub flags: u32,
    /// Per-request headers, merged over the client's defaults.
    pub headers: HeaderMap,
}

impl FetchSpec {
    /// A plain GET of `url` from position 0 to the end.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
            absolute_stream_position: 0,
            position: 0,
            length: None,
            key: None,
            flags: 0,
            headers: HeaderMap::new(),
        }
    }

    /// Copy of this descriptor with only the URL replaced.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    /// `Range` header value for this request, if it addresses a sub-range.
    pub fn range_header(&self) -> Option<String> {
        match (self.position, self.length) {
            (0, None) => None,
            (pos, None) => Some(format!("bytes={}-", pos)),
            (pos, Some(len)) => Some(format!("bytes={}-{}", pos, pos + len - 1)),
        }
    }
}

/// Contract of the underlying network-fetch implementation the refresh proxy
/// wraps.
///
/// `open` dispatches the request and resolves the payload byte count;
/// partial content is addressed through the descriptor's
/// `position`/`length`. Implementations surface their own error taxonomy
/// unchanged; the proxy never remaps a transport failure.
pub trait StreamTransport: Send + Sync {
    fn open(&self, spec: &FetchSpec) -> Result<u64, TransportError>;
}

impl<T: StreamTransport + ?Sized> StreamTransport for std::sync::Arc<T> {
    fn open(&self, spec: &FetchSpec) -> Result<u64, TransportError> {
        (**self).open(spec)
    }
}
