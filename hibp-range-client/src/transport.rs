//! The HTTP capability the client sends range requests through.

use std::future::Future;

use bytes::Bytes;
use http::{Request, Response};

/// Failure to send a request or read its body.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Sends one request and returns the response with its body fully read.
///
/// Implementations should not retry; the client makes a single attempt per
/// coalesced group and leaves retry policy to its callers.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: Request<()>,
    ) -> impl Future<Output = Result<Response<Bytes>, TransportError>> + Send;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use bytes::Bytes;
    use http::{Request, Response};

    use super::{Transport, TransportError};
    use crate::config::ClientConfig;

    /// [`Transport`] backed by a [`reqwest::Client`].
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Builds a client honouring [`ClientConfig::timeout`].
        pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
            let mut builder = reqwest::Client::builder();
            if let Some(timeout) = config.timeout {
                builder = builder.timeout(timeout);
            }

            Ok(Self { client: builder.build()? })
        }

        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl Transport for ReqwestTransport {
        async fn send(&self, request: Request<()>) -> Result<Response<Bytes>, TransportError> {
            let (parts, ()) = request.into_parts();

            let response = self
                .client
                .request(parts.method, parts.uri.to_string())
                .headers(parts.headers)
                .send()
                .await?;

            let status = response.status();
            let version = response.version();
            let headers = response.headers().clone();
            let body = response.bytes().await?;

            let mut out = Response::new(body);
            *out.status_mut() = status;
            *out.version_mut() = version;
            *out.headers_mut() = headers;

            Ok(out)
        }
    }
}
