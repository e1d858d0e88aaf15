//! Live-stream URL refresh proxy.
//!
//! Live origins rotate the access token embedded in segment/manifest URLs on
//! a fixed cadence; requesting with a stale token stalls playback.
//! [`RefreshProxy`] wraps one delegate [`StreamTransport`] `open` call: it
//! extracts the token key from each outgoing URL, checks its age against the
//! session's [`TokenCache`], re-resolves the stream through a
//! [`LiveUrlResolver`] only when the key has gone stale, and rewrites the URL
//! before delegating. Everything else in the request passes through
//! byte-for-byte.
//!
//! The refresh is synchronous: the calling thread suspends until resolution
//! completes or fails. A resolver failure is fatal for that fetch, with no
//! retry at this layer; the playback pipeline owns retry policy.

pub mod token;

pub use token::{TOKEN_MARKER, TokenCache, extract_token_key};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::common::http::{ClientSettings, build_blocking_client};
use crate::config::RefreshConfig;
use crate::error::{ProxyError, ProxyResult, ResolveError};
use crate::resolver::{DEFAULT_RESOLVER_TIMEOUT_SECS, HttpResolver, LiveUrlResolver};
use crate::transport::http::ContentTypePredicate;
use crate::transport::{FetchSpec, HttpTransport, StreamTransport};

/// How long a token key is trusted before a fetch forces re-resolution.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(50_000);

struct Session {
    current_key: Option<String>,
    cache: TokenCache,
}

/// Interposes between the playback pipeline and a delegate transport,
/// keeping the token embedded in fetch URLs valid for the duration of one
/// playback session.
///
/// One instance per live-stream open; all session state is discarded with
/// the instance. Generic over the resolver and transport seams so either can
/// be substituted in tests.
pub struct RefreshProxy<R, T> {
    live_url: String,
    refresh_interval_ms: u64,
    resolver: R,
    transport: T,
    session: Mutex<Session>,
}

impl<R: LiveUrlResolver, T: StreamTransport> RefreshProxy<R, T> {
    pub fn new(live_url: impl Into<String>, resolver: R, transport: T) -> Self {
        Self::with_refresh_interval(live_url, resolver, transport, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(
        live_url: impl Into<String>,
        resolver: R,
        transport: T,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            live_url: live_url.into(),
            refresh_interval_ms: refresh_interval.as_millis() as u64,
            resolver,
            transport,
            session: Mutex::new(Session {
                current_key: None,
                cache: TokenCache::new(),
            }),
        }
    }

    /// Execute one fetch, refreshing the embedded token first when it has
    /// gone stale. Returns exactly what the delegate returns.
    pub fn fetch(&self, spec: &FetchSpec) -> ProxyResult<u64> {
        self.fetch_at(spec, epoch_ms())
    }

    /// The believed-current token key, once one has been observed.
    pub fn current_key(&self) -> Option<String> {
        self.session.lock().current_key.clone()
    }

    fn fetch_at(&self, spec: &FetchSpec, now_ms: u64) -> ProxyResult<u64> {
        let fetch_key = extract_token_key(&spec.url)
            .ok_or_else(|| ProxyError::MalformedRequest {
                url: spec.url.clone(),
            })?
            .to_string();

        // Observation, refresh and key swap run under one lock: overlapping
        // fetches cannot observe-then-overwrite the current key, and a
        // triggered refresh is single-flight.
        let current_key = {
            let mut session = self.session.lock();

            let key = session
                .current_key
                .get_or_insert_with(|| fetch_key.clone())
                .clone();

            match session.cache.observe(&key, now_ms) {
                // First sighting is trusted as fresh.
                None => key,
                Some(elapsed) if elapsed >= self.refresh_interval_ms => {
                    debug!(
                        "live token stale: key={}, elapsed={}ms, history={}",
                        key,
                        elapsed,
                        session.cache.len()
                    );
                    let fresh_url = self.resolver.resolve(&self.live_url)?;
                    let fresh_key = extract_token_key(&fresh_url)
                        .ok_or_else(|| ResolveError::Parse {
                            url: fresh_url.clone(),
                        })?
                        .to_string();
                    session.cache.mark_refreshed(&fresh_key, now_ms);
                    session.current_key = Some(fresh_key.clone());
                    debug!("live token refreshed: {} -> {}", key, fresh_key);
                    fresh_key
                }
                Some(_) => key,
            }
        };

        let rewritten = spec.url.replacen(&fetch_key, &current_key, 1);
        debug!("fetch url: {} -> {}", spec.url, rewritten);

        let delegated = spec.with_url(rewritten);
        Ok(self.transport.open(&delegated)?)
    }
}

/// Builder for a fully wired proxy: blocking HTTP delegate plus HTTP
/// resolver.
pub struct SourceFactory {
    live_url: String,
    client: ClientSettings,
    refresh_interval: Duration,
    resolver_timeout: Duration,
    content_type_predicate: Option<ContentTypePredicate>,
}

impl SourceFactory {
    pub fn new(live_url: impl Into<String>) -> Self {
        Self {
            live_url: live_url.into(),
            client: ClientSettings::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            resolver_timeout: Duration::from_secs(DEFAULT_RESOLVER_TIMEOUT_SECS),
            content_type_predicate: None,
        }
    }

    /// Factory pre-populated from a [`RefreshConfig`].
    pub fn from_config(live_url: impl Into<String>, config: &RefreshConfig) -> Self {
        let mut factory = Self::new(live_url);
        if let Some(ua) = &config.user_agent {
            factory.client.user_agent = ua.clone();
        }
        factory.client.connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        factory.client.read_timeout = Duration::from_secs(config.read_timeout_secs);
        factory.client.allow_cross_protocol_redirects = config.allow_cross_protocol_redirects;
        factory.refresh_interval = Duration::from_millis(config.refresh_interval_ms);
        factory.resolver_timeout = Duration::from_secs(config.resolver_timeout_secs);
        factory
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.client.user_agent = user_agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.client.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.client.read_timeout = timeout;
        self
    }

    /// Headers attached to every delegated request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.client.default_headers = headers;
        self
    }

    pub fn allow_cross_protocol_redirects(mut self, allow: bool) -> Self {
        self.client.allow_cross_protocol_redirects = allow;
        self
    }

    /// Reject responses whose content type fails `predicate`.
    pub fn content_type_predicate(mut self, predicate: ContentTypePredicate) -> Self {
        self.content_type_predicate = Some(predicate);
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Budget for one resolver round trip, separate from the transport's
    /// timeout.
    pub fn resolver_timeout(mut self, timeout: Duration) -> Self {
        self.resolver_timeout = timeout;
        self
    }

    pub fn build(self) -> ProxyResult<RefreshProxy<HttpResolver, HttpTransport>> {
        if self.live_url.is_empty() {
            return Err(ProxyError::EmptyLiveUrl);
        }

        let client = build_blocking_client(&self.client).map_err(ProxyError::Client)?;
        let mut transport = HttpTransport::new(client);
        if let Some(predicate) = self.content_type_predicate {
            transport = transport.with_content_type_predicate(predicate);
        }

        let resolver =
            HttpResolver::with_timeout(self.resolver_timeout).map_err(ProxyError::Client)?;

        Ok(RefreshProxy::with_refresh_interval(
            self.live_url,
            resolver,
            transport,
            self.refresh_interval,
        ))
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use parking_lot::Mutex;
    use reqwest::Method;

    use super::*;
    use crate::error::{ResolveError, TransportError};

    const INTERVAL_MS: u64 = 50_000;
    const LIVE_URL: &str = "https://live.example/api/watch/12345";

    struct ScriptedResolver {
        responses: Mutex<Vec<Result<String, ResolveError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedResolver {
        fn new(responses: Vec<Result<String, ResolveError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    impl LiveUrlResolver for ScriptedResolver {
        fn resolve(&self, _live_url: &str) -> Result<String, ResolveError> {
            *self.calls.lock() += 1;
            self.responses.lock().remove(0)
        }
    }

    struct RecordingTransport {
        opened: Mutex<Vec<FetchSpec>>,
        result_len: u64,
    }

    impl RecordingTransport {
        fn new(result_len: u64) -> Arc<Self> {
            Arc::new(Self {
                opened: Mutex::new(Vec::new()),
                result_len,
            })
        }

        fn opened(&self) -> Vec<FetchSpec> {
            self.opened.lock().clone()
        }
    }

    impl StreamTransport for RecordingTransport {
        fn open(&self, spec: &FetchSpec) -> Result<u64, TransportError> {
            self.opened.lock().push(spec.clone());
            Ok(self.result_len)
        }
    }

    fn segment_url(key: &str) -> String {
        format!("https://origin.example/seg/1.ts?bitrate=96&anonymous-user-{key}&quality=720")
    }

    fn resolved_url(key: &str) -> String {
        format!("https://origin.example/master.m3u8?anonymous-user-{key}&quality=720")
    }

    fn proxy_with(
        resolver: &Arc<ScriptedResolver>,
        transport: &Arc<RecordingTransport>,
    ) -> RefreshProxy<Arc<ScriptedResolver>, Arc<RecordingTransport>> {
        RefreshProxy::with_refresh_interval(
            LIVE_URL,
            Arc::clone(resolver),
            Arc::clone(transport),
            Duration::from_millis(INTERVAL_MS),
        )
    }

    #[test]
    fn test_first_fetch_never_resolves() {
        let resolver = ScriptedResolver::new(vec![]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);

        // Arbitrarily large timestamp: age never matters on the first fetch.
        let spec = FetchSpec::get(segment_url("AAA"));
        proxy.fetch_at(&spec, 999_999_999).expect("fetch");

        assert_eq!(resolver.calls(), 0);
        assert_eq!(proxy.current_key().as_deref(), Some("AAA"));
        assert_eq!(transport.opened().len(), 1);
    }

    #[test]
    fn test_refresh_triggers_only_at_interval() {
        let resolver = ScriptedResolver::new(vec![Ok(resolved_url("BBB"))]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);
        let spec = FetchSpec::get(segment_url("AAA"));

        proxy.fetch_at(&spec, 0).expect("bootstrap fetch");
        assert_eq!(resolver.calls(), 0);

        proxy.fetch_at(&spec, 10_000).expect("fresh fetch");
        assert_eq!(resolver.calls(), 0);

        // Exactly at the boundary: elapsed >= interval refreshes.
        proxy.fetch_at(&spec, INTERVAL_MS).expect("stale fetch");
        assert_eq!(resolver.calls(), 1);
        assert_eq!(proxy.current_key().as_deref(), Some("BBB"));

        // The fresh key was stamped at refresh time, so shortly after no
        // further resolver call is made.
        proxy.fetch_at(&spec, INTERVAL_MS + 10_000).expect("fetch");
        assert_eq!(resolver.calls(), 1);
    }

    #[test]
    fn test_rewrite_replaces_first_occurrence_only() {
        let resolver = ScriptedResolver::new(vec![Ok(resolved_url("BBB"))]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);

        let url = "https://origin.example/seg/1.ts?anonymous-user-AAA&echo=AAA";
        let spec = FetchSpec::get(url);

        proxy.fetch_at(&spec, 0).expect("bootstrap fetch");
        proxy.fetch_at(&spec, 60_000).expect("stale fetch");

        let opened = transport.opened();
        assert_eq!(opened[0].url, url);
        assert_eq!(
            opened[1].url,
            "https://origin.example/seg/1.ts?anonymous-user-BBB&echo=AAA"
        );
    }

    #[test]
    fn test_delegated_fields_match_original() {
        let resolver = ScriptedResolver::new(vec![]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);

        let mut spec = FetchSpec::get(segment_url("AAA"));
        spec.method = Method::POST;
        spec.body = Some(Bytes::from_static(b"init"));
        spec.absolute_stream_position = 4096;
        spec.position = 2048;
        spec.length = Some(512);
        spec.key = Some("seg-1".to_string());
        spec.flags = crate::transport::FLAG_ALLOW_GZIP;
        spec.headers
            .insert("x-playback-session", "s1".parse().expect("header value"));

        proxy.fetch_at(&spec, 0).expect("fetch");

        let opened = transport.opened();
        assert_eq!(opened.len(), 1);
        // Key matches the current key, so even the URL is unchanged here.
        assert_eq!(opened[0], spec);
    }

    #[test]
    fn test_resolver_failure_is_fatal_and_skips_delegate() {
        let resolver =
            ScriptedResolver::new(vec![Err(ResolveError::AccessChallenge { status: 429 })]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);
        let spec = FetchSpec::get(segment_url("AAA"));

        proxy.fetch_at(&spec, 0).expect("bootstrap fetch");

        let err = proxy.fetch_at(&spec, 60_000).expect_err("stale fetch must fail");
        assert!(matches!(
            err,
            ProxyError::Refresh(ResolveError::AccessChallenge { status: 429 })
        ));
        // Only the bootstrap fetch reached the delegate.
        assert_eq!(transport.opened().len(), 1);
    }

    #[test]
    fn test_unparseable_resolved_url_is_a_refresh_failure() {
        let resolver =
            ScriptedResolver::new(vec![Ok("https://origin.example/plain".to_string())]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);
        let spec = FetchSpec::get(segment_url("AAA"));

        proxy.fetch_at(&spec, 0).expect("bootstrap fetch");

        let err = proxy.fetch_at(&spec, 60_000).expect_err("stale fetch must fail");
        assert!(matches!(
            err,
            ProxyError::Refresh(ResolveError::Parse { .. })
        ));
        assert_eq!(transport.opened().len(), 1);
    }

    #[test]
    fn test_consecutive_fresh_fetches_rewrite_identically() {
        let resolver = ScriptedResolver::new(vec![]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);
        let spec = FetchSpec::get(segment_url("AAA"));

        proxy.fetch_at(&spec, 0).expect("fetch");
        proxy.fetch_at(&spec, 20_000).expect("fetch");

        let opened = transport.opened();
        assert_eq!(opened[0].url, opened[1].url);
        assert_eq!(opened[0].url, segment_url("AAA"));
    }

    #[test]
    fn test_stale_incoming_key_is_rewritten_to_current() {
        let resolver = ScriptedResolver::new(vec![Ok(resolved_url("BBB"))]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);

        proxy
            .fetch_at(&FetchSpec::get(segment_url("AAA")), 0)
            .expect("bootstrap fetch");
        proxy
            .fetch_at(&FetchSpec::get(segment_url("AAA")), 60_000)
            .expect("stale fetch");

        // The player keeps issuing URLs with the old key; within the
        // interval they are rewritten to the refreshed one without another
        // resolver call.
        proxy
            .fetch_at(&FetchSpec::get(segment_url("AAA")), 70_000)
            .expect("fetch");

        let opened = transport.opened();
        assert_eq!(opened[2].url, segment_url("BBB"));
        assert_eq!(resolver.calls(), 1);
    }

    #[test]
    fn test_missing_marker_fails_before_any_collaborator() {
        let resolver = ScriptedResolver::new(vec![]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);

        let spec = FetchSpec::get("https://origin.example/seg/1.ts?quality=720");
        let err = proxy.fetch_at(&spec, 0).expect_err("must fail");

        assert!(matches!(err, ProxyError::MalformedRequest { .. }));
        assert_eq!(resolver.calls(), 0);
        assert!(transport.opened().is_empty());
    }

    #[test]
    fn test_delegate_byte_count_passes_through() {
        let resolver = ScriptedResolver::new(vec![]);
        let transport = RecordingTransport::new(777);
        let proxy = proxy_with(&resolver, &transport);

        let n = proxy
            .fetch_at(&FetchSpec::get(segment_url("AAA")), 0)
            .expect("fetch");
        assert_eq!(n, 777);
    }

    /// The worked example: t=0 bootstrap, t=10s fresh, t=60s refresh to BBB.
    #[test]
    fn test_reference_scenario() {
        let resolver = ScriptedResolver::new(vec![Ok(resolved_url("BBB"))]);
        let transport = RecordingTransport::new(1024);
        let proxy = proxy_with(&resolver, &transport);
        let spec = FetchSpec::get(segment_url("AAA"));

        proxy.fetch_at(&spec, 0).expect("fetch at t=0");
        assert_eq!(resolver.calls(), 0);
        assert_eq!(proxy.current_key().as_deref(), Some("AAA"));

        proxy.fetch_at(&spec, 10_000).expect("fetch at t=10s");
        assert_eq!(resolver.calls(), 0);

        proxy.fetch_at(&spec, 60_000).expect("fetch at t=60s");
        assert_eq!(resolver.calls(), 1);
        assert_eq!(proxy.current_key().as_deref(), Some("BBB"));

        let opened = transport.opened();
        assert_eq!(opened[0].url, segment_url("AAA"));
        assert_eq!(opened[1].url, segment_url("AAA"));
        assert_eq!(opened[2].url, segment_url("BBB"));
    }

    #[test]
    fn test_factory_rejects_empty_live_url() {
        assert!(matches!(
            SourceFactory::new("").build(),
            Err(ProxyError::EmptyLiveUrl)
        ));
    }
}
