//! Token-key extraction and the per-session token cache.

use std::collections::HashMap;

/// Marker literal preceding the token key inside tokenized live URLs.
pub const TOKEN_MARKER: &str = "anonymous-user-";

/// Extract the token key from a tokenized URL: the substring immediately
/// after [`TOKEN_MARKER`], up to (but not including) the next `&`.
///
/// Returns `None` when the marker is absent or followed by nothing.
pub fn extract_token_key(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once(TOKEN_MARKER)?;
    let key = rest.split('&').next()?;
    if key.is_empty() {
        return None;
    }
    Some(key)
}

/// Last-refresh bookkeeping for every token key observed during one playback
/// session.
///
/// Entries are never evicted; a superseded key simply stops being consulted.
/// Growth is bounded by the session's rotation cadence, so a map is fine for
/// the lifetime of one stream.
#[derive(Debug, Default)]
pub struct TokenCache {
    history: HashMap<String, u64>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting of `key` at `now_ms`.
    ///
    /// Returns `None` when the key was not yet tracked (a first sighting is
    /// trusted as fresh), otherwise the elapsed milliseconds since its last
    /// refresh.
    pub fn observe(&mut self, key: &str, now_ms: u64) -> Option<u64> {
        match self.history.get(key) {
            Some(&last) => Some(now_ms.saturating_sub(last)),
            None => {
                self.history.insert(key.to_string(), now_ms);
                None
            }
        }
    }

    /// Insert or update `key` with `now_ms` as its refresh time.
    pub fn mark_refreshed(&mut self, key: &str, now_ms: u64) {
        self.history.insert(key.to_string(), now_ms);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
