//! Breached password checker using the Have I Been Pwned range API.
//!
//! Passwords are hashed locally with SHA1. Only the first 5 hex characters of
//! the hash are sent to `https://api.pwnedpasswords.com/range/{prefix}`, which
//! answers with every breached hash suffix sharing that prefix; the match
//! against the remaining 35 characters happens locally.
//!
//! Three things make this cheaper than a request per check:
//!
//! - Concurrent checks whose hashes share a prefix are coalesced into a single
//!   in-flight request ([`RequestCoalescer`], [`RefcountedTask`]).
//! - Each response is parsed once into fixed-width suffixes, binary searched
//!   when the server returned them sorted ([`ResponseBuffer`]).
//! - An optional [`PwnedCache`] answers repeated prefixes without the network.
//!
//! There are no retries. A failed request fails every check that shared it.
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), hibp_range_client::Error> {
//! use hibp_range_client::{ClientConfig, PwnedClient};
//!
//! let config = ClientConfig::default().with_user_agent("my-service/1.0");
//! let client = PwnedClient::from_config(config)?;
//!
//! if client.check("password123").await? {
//!     println!("choose another password");
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod cache;
pub mod client;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod hash;
pub mod task;
pub mod transport;

pub use buffer::ResponseBuffer;
pub use cache::{CacheError, MemoryCache, NoCache, PwnedCache};
pub use client::{FetchOutcome, PwnedClient, PwnedClientBuilder, RangeResponse};
pub use coalescer::RequestCoalescer;
pub use config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT, HIBP_RANGE_URL_ENV, HIBP_TIMEOUT_SECS_ENV,
    HIBP_USER_AGENT_ENV, pwned_passwords_url,
};
pub use error::Error;
pub use hash::{PREFIX_LEN, PasswordHash, Prefix, SUFFIX_LEN, Suffix};
pub use task::{RefcountedTask, TaskLease};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, TransportError};
