use std::sync::Arc;

use crate::cache::CacheError;
use crate::client::RangeResponse;
use crate::hash::Prefix;
use crate::transport::TransportError;

/// Errors returned by [`PwnedClient`](crate::PwnedClient).
///
/// One failed request is shared by every caller that was coalesced onto it,
/// so the error is `Clone` and keeps its sources behind `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed for prefix {prefix}: {source}")]
    Transport {
        prefix: Prefix,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error("request for prefix {prefix} was cancelled")]
    Cancelled { prefix: Prefix },

    #[error(
        "unexpected HTTP response \"{}\" from {} \"{}\"",
        .0.status(),
        .0.method(),
        .0.url()
    )]
    UnexpectedResponse(Arc<RangeResponse>),

    #[error("cache error: {0}")]
    Cache(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("invalid request: {0}")]
    Request(#[source] Arc<http::Error>),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn transport(prefix: Prefix, source: TransportError) -> Self {
        Self::Transport { prefix, source: Arc::from(source) }
    }

    pub(crate) fn cache(source: CacheError) -> Self {
        Self::Cache(Arc::from(source))
    }

    /// The response that did not carry a `200 OK`, if that is what failed.
    pub fn response(&self) -> Option<&RangeResponse> {
        match self {
            Self::UnexpectedResponse(response) => Some(response.as_ref()),
            _ => None,
        }
    }
}

impl From<http::Error> for Error {
    fn from(source: http::Error) -> Self {
        Self::Request(Arc::new(source))
    }
}
