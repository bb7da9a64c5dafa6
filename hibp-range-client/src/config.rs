//! Client configuration, from code or from the environment.

use std::time::Duration;

use http::header::{HeaderMap, USER_AGENT};
use http::{HeaderValue, Request};

use crate::error::Error;
use crate::hash::Prefix;

/// Base URL of the Pwned Passwords range API.
pub const DEFAULT_BASE_URL: &str = "https://api.pwnedpasswords.com/range";

/// User-Agent sent when none is configured. The API rules ask clients to
/// identify themselves, so set your own with [`ClientConfig::with_user_agent`].
pub const DEFAULT_USER_AGENT: &str =
    concat!("hibp-range-client/", env!("CARGO_PKG_VERSION"), " (+https://github.com/PrismaPhonic/hibp-rs)");

/// Environment variable overriding [`ClientConfig::base_url`].
pub const HIBP_RANGE_URL_ENV: &str = "HIBP_RANGE_URL";

/// Environment variable overriding [`ClientConfig::user_agent`].
pub const HIBP_USER_AGENT_ENV: &str = "HIBP_USER_AGENT";

/// Environment variable setting [`ClientConfig::timeout`] in whole seconds.
pub const HIBP_TIMEOUT_SECS_ENV: &str = "HIBP_TIMEOUT_SECS";

/// Returns the range URL for `prefix` on the public API.
pub fn pwned_passwords_url(prefix: &Prefix) -> String {
    format!("{DEFAULT_BASE_URL}/{prefix}")
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Range endpoint; the prefix is appended as the last path segment.
    pub base_url: String,
    /// Sent as the `User-Agent` header. Empty falls back to [`DEFAULT_USER_AGENT`].
    pub user_agent: String,
    /// Extra headers added to every request after `User-Agent`.
    pub headers: HeaderMap,
    /// Whole-request timeout applied by transports that support one.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HeaderMap::new(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds a config from [`HIBP_RANGE_URL_ENV`], [`HIBP_USER_AGENT_ENV`]
    /// and [`HIBP_TIMEOUT_SECS_ENV`], defaulting whatever is unset.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(base_url) = lookup(HIBP_RANGE_URL_ENV).filter(|v| !v.is_empty()) {
            config.base_url = base_url;
        }

        if let Some(user_agent) = lookup(HIBP_USER_AGENT_ENV).filter(|v| !v.is_empty()) {
            config.user_agent = user_agent;
        }

        if let Some(secs) = lookup(HIBP_TIMEOUT_SECS_ENV).filter(|v| !v.is_empty()) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("{HIBP_TIMEOUT_SECS_ENV} must be whole seconds, got {secs:?}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn range_url(&self, prefix: &Prefix) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), prefix)
    }

    /// Builds the `GET` request for one prefix.
    pub fn range_request(&self, prefix: &Prefix) -> Result<Request<()>, Error> {
        let user_agent = match self.user_agent.as_str() {
            "" => DEFAULT_USER_AGENT,
            user_agent => user_agent,
        };

        let mut request =
            Request::get(self.range_url(prefix)).header(USER_AGENT, user_agent).body(())?;
        request.headers_mut().extend(self.headers.clone());

        Ok(request)
    }
}
