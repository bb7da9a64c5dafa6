//! A reference counted, run-once deferred computation.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::warn;

/// Callback invoked when the last holder releases a task.
pub type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Wraps a deferred computation behind a reference count.
///
/// The computation is not started until [`value`](Self::value) is first
/// awaited, runs at most once no matter how many holders await it, and every
/// holder observes a clone of the same output. If a holder stops awaiting
/// midway, the remaining holders keep driving the same computation.
///
/// `on_release` runs exactly once, when the count drops from 1 to 0.
pub struct RefcountedTask<T: Clone> {
    refcount: AtomicUsize,
    on_release: Mutex<Option<ReleaseFn>>,
    value: Shared<BoxFuture<'static, T>>,
}

impl<T> RefcountedTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(computation: F, on_release: ReleaseFn) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            refcount: AtomicUsize::new(0),
            on_release: Mutex::new(Some(on_release)),
            value: computation.boxed().shared(),
        }
    }

    /// Increases the reference count by 1.
    pub fn acquire(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Increases the reference count by 1 unless it already dropped to 0.
    ///
    /// A task at 0 has fired (or is about to fire) its release callback and
    /// must not gain new holders.
    pub fn try_acquire(&self) -> bool {
        self.refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count > 0).then(|| count + 1)
            })
            .is_ok()
    }

    /// Decreases the reference count by 1 and calls the release callback when
    /// it drops to 0.
    pub fn release(&self) {
        let previous = self.refcount.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            count.checked_sub(1)
        });

        match previous {
            Ok(1) => {
                let on_release = self.on_release.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(on_release) = on_release {
                    on_release();
                }
            }
            Ok(_) => {}
            Err(_) => warn!("released a task that has no holders"),
        }
    }

    /// Waits for the computation, starting it if no holder has yet.
    pub async fn value(&self) -> T {
        self.value.clone().await
    }

    /// Returns the memoized output if the computation already finished.
    pub fn peek(&self) -> Option<T> {
        self.value.peek().cloned()
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    /// Acquires the task and wraps it in a lease that releases on drop.
    pub fn lease(self: &Arc<Self>) -> TaskLease<T> {
        self.acquire();
        TaskLease { task: Arc::clone(self) }
    }

    /// Like [`lease`](Self::lease), but fails for a task whose count is 0.
    pub fn try_lease(self: &Arc<Self>) -> Option<TaskLease<T>> {
        self.try_acquire().then(|| TaskLease { task: Arc::clone(self) })
    }
}

impl<T: Clone> fmt::Debug for RefcountedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefcountedTask")
            .field("refcount", &self.refcount.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// One holder's share of a [`RefcountedTask`]. Dropping it releases the task.
#[derive(Debug)]
pub struct TaskLease<T>
where
    T: Clone + Send + Sync + 'static,
{
    task: Arc<RefcountedTask<T>>,
}

impl<T> TaskLease<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub async fn value(&self) -> T {
        self.task.value().await
    }

    pub fn task(&self) -> &Arc<RefcountedTask<T>> {
        &self.task
    }
}

impl<T> Drop for TaskLease<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.task.release();
    }
}
