use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::redirect;

/// Default user agent for segment and resolver requests.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 8;

const MAX_REDIRECTS: usize = 10;

/// Options for the blocking clients built by this crate.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    /// Separate connect timeout: a slow handshake must not eat the full
    /// request budget.
    pub connect_timeout: Duration,
    /// Total request timeout (headers + body).
    pub read_timeout: Duration,
    /// Headers attached to every request the client sends.
    pub default_headers: HeaderMap,
    /// Whether an `http` → `https` (or reverse) redirect may be followed.
    pub allow_cross_protocol_redirects: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            default_headers: HeaderMap::new(),
            allow_cross_protocol_redirects: false,
        }
    }
}

/// Build a blocking `reqwest::Client` from the given settings.
pub fn build_blocking_client(settings: &ClientSettings) -> Result<Client, reqwest::Error> {
    let policy = if settings.allow_cross_protocol_redirects {
        redirect::Policy::limited(MAX_REDIRECTS)
    } else {
        redirect::Policy::custom(|attempt| {
            let same_scheme = attempt
                .previous()
                .last()
                .map(|prev| prev.scheme() == attempt.url().scheme())
                .unwrap_or(true);

            if !same_scheme {
                attempt.error("cross-protocol redirect")
            } else if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        })
    };

    Client::builder()
        .user_agent(settings.user_agent.clone())
        .default_headers(settings.default_headers.clone())
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.read_timeout)
        .redirect(policy)
        .build()
}
