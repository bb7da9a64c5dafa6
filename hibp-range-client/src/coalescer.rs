//! Deduplicates concurrent requests that share a key.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use crate::task::{RefcountedTask, ReleaseFn, TaskLease};

type Table<K, T> = Mutex<HashMap<K, Entry<T>>>;

struct Entry<T: Clone> {
    generation: u64,
    task: Arc<RefcountedTask<T>>,
}

/// Table of in-flight computations, at most one per key.
///
/// The lock only guards table membership and acquiring a task. It is never
/// held while a computation runs.
pub struct RequestCoalescer<K, T: Clone> {
    table: Arc<Table<K, T>>,
    next_generation: AtomicU64,
}

impl<K, T> Default for RequestCoalescer<K, T>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> RequestCoalescer<K, T>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self { table: Arc::new(Mutex::new(HashMap::new())), next_generation: AtomicU64::new(0) }
    }

    /// Joins the in-flight computation for `key`, or starts one with `start`.
    ///
    /// `start` only builds the future; nothing runs until a holder awaits
    /// [`TaskLease::value`]. The returned lease is acquired before the lock is
    /// released, so the task cannot be torn down in between. Dropping the
    /// last lease for a key removes its entry.
    pub fn join_or_start<F, Fut>(&self, key: K, start: F) -> TaskLease<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut table = self.lock();

        if let Some(entry) = table.get(&key) {
            if let Some(lease) = entry.task.try_lease() {
                debug!(?key, generation = entry.generation, "joined in-flight request");
                return lease;
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(RefcountedTask::new(start(), self.remover(key.clone(), generation)));
        let lease = task.lease();

        debug!(?key, generation, "started request");
        table.insert(key, Entry { generation, task });

        lease
    }

    /// Number of keys with a live computation.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    // Removes the entry for `key` only while it still belongs to `generation`.
    fn remover(&self, key: K, generation: u64) -> ReleaseFn {
        let table: Weak<Table<K, T>> = Arc::downgrade(&self.table);

        Box::new(move || {
            let Some(table) = table.upgrade() else {
                return;
            };
            let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);

            if table.get(&key).is_some_and(|entry| entry.generation == generation) {
                table.remove(&key);
                debug!(?key, generation, "released request");
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<T>>> {
        // Only map operations and future construction happen under the lock, so
        // a poisoned table is still consistent.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::*;

    fn counted(calls: &Arc<AtomicU32>, value: u32) -> impl Future<Output = u32> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            value
        }
    }

    #[tokio::test]
    async fn test_same_key_shares_task() {
        let coalescer: RequestCoalescer<&'static str, u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        let first = coalescer.join_or_start("E38AD", || counted(&calls, 1));
        let second = coalescer.join_or_start("E38AD", || counted(&calls, 2));

        assert!(Arc::ptr_eq(first.task(), second.task()));
        assert_eq!(first.task().refcount(), 2);
        assert_eq!(coalescer.in_flight(), 1);

        assert_eq!(first.value().await, 1);
        assert_eq!(second.value().await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_removed_after_last_release() {
        let coalescer: RequestCoalescer<&'static str, u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        let first = coalescer.join_or_start("E38AD", || counted(&calls, 1));
        let second = coalescer.join_or_start("E38AD", || counted(&calls, 2));
        assert_eq!(first.value().await, 1);

        drop(first);
        assert!(coalescer.contains(&"E38AD"));

        drop(second);
        assert!(!coalescer.contains(&"E38AD"));
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fresh_task_after_release() {
        let coalescer: RequestCoalescer<&'static str, u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        let first = coalescer.join_or_start("E38AD", || counted(&calls, 1));
        assert_eq!(first.value().await, 1);
        drop(first);

        let second = coalescer.join_or_start("E38AD", || counted(&calls, 2));
        assert_eq!(second.value().await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let coalescer: RequestCoalescer<&'static str, u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        let a = coalescer.join_or_start("00000", || counted(&calls, 1));
        let b = coalescer.join_or_start("FFFFF", || counted(&calls, 2));

        assert!(!Arc::ptr_eq(a.task(), b.task()));
        assert_eq!(coalescer.in_flight(), 2);
        assert_eq!((a.value().await, b.value().await), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(a);
        assert!(!coalescer.contains(&"00000"));
        assert!(coalescer.contains(&"FFFFF"));
    }

    #[tokio::test]
    async fn test_stale_release_keeps_newer_entry() {
        let coalescer: RequestCoalescer<&'static str, u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        let old = coalescer.join_or_start("E38AD", || counted(&calls, 1));
        let stale = coalescer.remover("E38AD", 0);
        drop(old);

        let new = coalescer.join_or_start("E38AD", || counted(&calls, 2));

        // A late release of the old generation must not evict the new one.
        stale();
        assert!(coalescer.contains(&"E38AD"));

        assert_eq!(new.value().await, 2);
    }

    #[tokio::test]
    async fn test_dead_entry_is_replaced() {
        let coalescer: RequestCoalescer<&'static str, u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        // An entry whose count already hit zero but whose callback has not run yet.
        let dead = Arc::new(RefcountedTask::new(counted(&calls, 1), Box::new(|| {})));
        coalescer.lock().insert("E38AD", Entry { generation: 99, task: dead });

        let lease = coalescer.join_or_start("E38AD", || counted(&calls, 2));
        assert_eq!(lease.task().refcount(), 1);
        assert_eq!(lease.value().await, 2);

        drop(lease);
        assert!(!coalescer.contains(&"E38AD"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_start_once() {
        const HOLDERS: usize = 16;

        let coalescer: Arc<RequestCoalescer<&'static str, u32>> = Arc::new(RequestCoalescer::new());
        let calls = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(HOLDERS));

        let mut handles = Vec::new();
        for i in 0..HOLDERS as u32 {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                let lease = coalescer.join_or_start("E38AD", || counted(&calls, i));
                // Every holder joins before anyone can release.
                barrier.wait().await;
                lease.value().await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }
}
