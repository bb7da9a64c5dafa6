use std::sync::Arc;

use http::{HeaderMap, Method, StatusCode, Uri};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::buffer::ResponseBuffer;
use crate::cache::{NoCache, PwnedCache};
use crate::coalescer::RequestCoalescer;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::hash::{PasswordHash, Prefix};
use crate::transport::Transport;

/// Outcome of one coalesced range request, shared by every caller on it.
pub type FetchOutcome = Result<Arc<RangeResponse>, Error>;

/// A range API response. The body is parsed only for `200 OK`; otherwise
/// it keeps the raw bytes for diagnosis.
#[derive(Debug)]
pub struct RangeResponse {
    method: Method,
    url: Uri,
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBuffer,
}

impl RangeResponse {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBuffer {
        &self.body
    }
}

struct Inner<T, C> {
    config: ClientConfig,
    transport: T,
    cache: Option<C>,
}

/// Checks passwords against the Pwned Passwords range API.
///
/// Only the first 5 hex characters of the password's SHA1 leave the process.
/// Concurrent checks whose hashes share a prefix are coalesced into a single
/// request, and an optional [`PwnedCache`] lets repeated prefixes skip the
/// network entirely.
///
/// The client is `Send + Sync`; share it by reference or behind an `Arc`.
pub struct PwnedClient<T, C = NoCache> {
    inner: Arc<Inner<T, C>>,
    requests: RequestCoalescer<Prefix, FetchOutcome>,
}

#[cfg(feature = "reqwest")]
impl PwnedClient<crate::transport::ReqwestTransport> {
    /// Creates a client for the public API with the default configuration.
    pub fn new() -> Result<Self, Error> {
        Self::from_config(ClientConfig::default())
    }

    /// Creates a reqwest-backed client for `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self, Error> {
        let transport = crate::transport::ReqwestTransport::from_config(&config)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(PwnedClient::builder(transport).config(config).build())
    }
}

impl<T: Transport> PwnedClient<T> {
    pub fn builder(transport: T) -> PwnedClientBuilder<T> {
        PwnedClientBuilder { config: ClientConfig::default(), transport, cache: None }
    }
}

impl<T, C> PwnedClient<T, C>
where
    T: Transport,
    C: PwnedCache,
{
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> Option<&C> {
        self.inner.cache.as_ref()
    }

    /// Number of prefixes with a request currently in flight.
    pub fn in_flight(&self) -> usize {
        self.requests.in_flight()
    }

    /// Checks whether `password` appears in the breach dataset.
    ///
    /// Returns `Ok(true)` if it was found, `Ok(false)` if it was not. A
    /// response other than `200 OK` is [`Error::UnexpectedResponse`]. Nothing
    /// is retried.
    pub async fn check(&self, password: &str) -> Result<bool, Error> {
        self.check_hash_with_cancellation(&PasswordHash::new(password), &CancellationToken::new())
            .await
    }

    /// Like [`check`](Self::check), with a token that cancels the request.
    ///
    /// If this call starts the request for its prefix, cancelling `cancel`
    /// fails that request with [`Error::Cancelled`] for every caller sharing
    /// it. If it joined a request someone else started, the token has no
    /// effect on it; drop the future to stop waiting instead.
    pub async fn check_with_cancellation(
        &self,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        self.check_hash_with_cancellation(&PasswordHash::new(password), cancel).await
    }

    /// Checks an already computed SHA1 hash.
    pub async fn check_hash(&self, hash: &PasswordHash) -> Result<bool, Error> {
        self.check_hash_with_cancellation(hash, &CancellationToken::new()).await
    }

    pub async fn check_hash_with_cancellation(
        &self,
        hash: &PasswordHash,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        let prefix = hash.prefix();
        let suffix = hash.suffix();

        if let Some(cache) = &self.inner.cache {
            if cache.contains(&prefix, &suffix).await.map_err(Error::cache)? {
                debug!(%prefix, "cache hit");
                return Ok(true);
            }
        }

        let lease = self
            .requests
            .join_or_start(prefix, || Self::fetch(Arc::clone(&self.inner), prefix, cancel.clone()));
        let response = lease.value().await?;

        if response.status() != StatusCode::OK {
            return Err(Error::UnexpectedResponse(response));
        }

        Ok(response.body().lookup(&suffix))
    }

    // Runs once per coalesced group.
    async fn fetch(inner: Arc<Inner<T, C>>, prefix: Prefix, cancel: CancellationToken) -> FetchOutcome {
        let request = inner.config.range_request(&prefix)?;
        let method = request.method().clone();
        let url = request.uri().clone();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled { prefix }),
            response = inner.transport.send(request) => {
                response.map_err(|source| Error::transport(prefix, source))?
            }
        };

        let (parts, bytes) = response.into_parts();
        let mut body = ResponseBuffer::with_capacity(bytes.len());
        body.extend_from_slice(&bytes);

        if parts.status == StatusCode::OK {
            body.parse();
            trace!(
                %prefix,
                suffixes = body.suffixes().len(),
                sorted = body.suffixes_sorted(),
                "parsed range response"
            );

            if let Some(cache) = inner.cache.as_ref().filter(|_| !body.suffixes().is_empty()) {
                cache.add(&prefix, body.suffixes()).await.map_err(Error::cache)?;
            }
        } else {
            warn!(%prefix, status = %parts.status, "unexpected range response");
        }

        Ok(Arc::new(RangeResponse {
            method,
            url,
            status: parts.status,
            headers: parts.headers,
            body,
        }))
    }
}

/// Assembles a [`PwnedClient`] from a transport, a config and an optional cache.
pub struct PwnedClientBuilder<T, C = NoCache> {
    config: ClientConfig,
    transport: T,
    cache: Option<C>,
}

impl<T, C> PwnedClientBuilder<T, C>
where
    T: Transport,
    C: PwnedCache,
{
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Consults `cache` before the network and fills it after each fetch.
    pub fn cache<C2: PwnedCache>(self, cache: C2) -> PwnedClientBuilder<T, C2> {
        PwnedClientBuilder { config: self.config, transport: self.transport, cache: Some(cache) }
    }

    pub fn build(self) -> PwnedClient<T, C> {
        PwnedClient {
            inner: Arc::new(Inner {
                config: self.config,
                transport: self.transport,
                cache: self.cache,
            }),
            requests: RequestCoalescer::new(),
        }
    }
}
