//! livelink — live-stream URL refresh proxy.
//!
//! Live-video origins rotate the ephemeral access token embedded in segment
//! and manifest URLs on a fixed cadence; continuing to fetch with a stale
//! token stalls playback. livelink sits between a player's transport layer
//! and the origin: it intercepts every outgoing fetch, detects when the
//! embedded token has gone stale, synchronously re-resolves the stream
//! through an external URL-resolution service, and hands the rewritten
//! request to the delegate transport. Request semantics (method, body, byte
//! range, headers) pass through untouched; only the URL changes.
//!
//! ```no_run
//! use livelink::{FetchSpec, SourceFactory};
//!
//! # fn main() -> Result<(), livelink::ProxyError> {
//! let proxy = SourceFactory::new("https://live.example/api/watch/12345").build()?;
//!
//! let spec = FetchSpec::get("https://origin.example/seg/1.ts?anonymous-user-AB12CD&quality=720");
//! let _byte_count = proxy.fetch(&spec)?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod refresh;
pub mod resolver;
pub mod transport;

pub use config::RefreshConfig;
pub use error::{ProxyError, ProxyResult, ResolveError, TransportError};
pub use refresh::token::{TOKEN_MARKER, TokenCache, extract_token_key};
pub use refresh::{DEFAULT_REFRESH_INTERVAL, RefreshProxy, SourceFactory};
pub use resolver::{HttpResolver, LiveUrlResolver};
pub use transport::{FetchSpec, HttpTransport, StreamTransport};
