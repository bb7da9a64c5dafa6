//! Caching of range results so repeated prefixes skip the network.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;

use crate::hash::{Prefix, Suffix};

/// Failure reported by a cache backend.
pub type CacheError = Box<dyn std::error::Error + Send + Sync>;

/// Storage for breached suffixes, keyed by prefix.
///
/// The client reads with [`contains`](Self::contains) before going to the
/// network and writes with [`add`](Self::add) after a successful parse. Any
/// error from either fails the check; there is no fallback to an uncached
/// lookup.
pub trait PwnedCache: Send + Sync + 'static {
    /// Records every breached suffix found for `prefix`.
    fn add(
        &self,
        prefix: &Prefix,
        suffixes: &[Suffix],
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Checks whether `prefix` + `suffix` was recorded.
    fn contains(
        &self,
        prefix: &Prefix,
        suffix: &Suffix,
    ) -> impl Future<Output = Result<bool, CacheError>> + Send;
}

impl<C: PwnedCache> PwnedCache for Arc<C> {
    fn add(
        &self,
        prefix: &Prefix,
        suffixes: &[Suffix],
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        (**self).add(prefix, suffixes)
    }

    fn contains(
        &self,
        prefix: &Prefix,
        suffix: &Suffix,
    ) -> impl Future<Output = Result<bool, CacheError>> + Send {
        (**self).contains(prefix, suffix)
    }
}

/// Placeholder for a client without a cache. It has no values, so a client
/// typed with it can never hold one.
#[derive(Debug, Clone, Copy)]
pub enum NoCache {}

impl PwnedCache for NoCache {
    async fn add(&self, _prefix: &Prefix, _suffixes: &[Suffix]) -> Result<(), CacheError> {
        match *self {}
    }

    async fn contains(&self, _prefix: &Prefix, _suffix: &Suffix) -> Result<bool, CacheError> {
        match *self {}
    }
}

/// In-process cache. Entries live as long as the cache; there is no eviction.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<Prefix, HashSet<Suffix>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prefixes with at least one recorded suffix.
    pub fn prefixes(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl PwnedCache for MemoryCache {
    async fn add(&self, prefix: &Prefix, suffixes: &[Suffix]) -> Result<(), CacheError> {
        self.entries.entry(*prefix).or_default().extend(suffixes.iter().copied());
        Ok(())
    }

    async fn contains(&self, prefix: &Prefix, suffix: &Suffix) -> Result<bool, CacheError> {
        Ok(self.entries.get(prefix).is_some_and(|suffixes| suffixes.contains(suffix)))
    }
}
