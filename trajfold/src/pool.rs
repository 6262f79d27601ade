//! Worker pools that execute block tasks.
//!
//! A pool only has to accept a boxed job and hand back a future that resolves
//! to the job's value. Ordering, folding and error attribution are handled by
//! the caller; a pool reports panics and cancellations as
//! [`TrajError::Worker`].

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, try_join_all, BoxFuture};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::error::{TrajError, TrajResult};

/// A unit of blocking work.
pub type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Future for a submitted job.
pub type JobFuture<T> = BoxFuture<'static, TrajResult<T>>;

/// Executes jobs, possibly in parallel.
pub trait WorkerPool<T: Send + 'static>: Send + Sync {
    /// Schedules `job` and returns a future resolving to its value.
    fn submit(&self, job: Job<T>) -> JobFuture<T>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Runs jobs on tokio's blocking thread pool, at most `max_workers` at a time.
#[derive(Debug, Clone)]
pub struct TokioPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl TokioPool {
    /// Creates a pool on the current tokio runtime.
    ///
    /// `max_workers` defaults to the number of logical CPUs.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime or with `max_workers == 0`.
    pub fn new(max_workers: Option<usize>) -> TrajResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| TrajError::worker(format!("no tokio runtime available: {e}")))?;
        Self::with_handle(handle, max_workers)
    }

    /// Creates a pool that spawns onto `handle`.
    pub fn with_handle(handle: Handle, max_workers: Option<usize>) -> TrajResult<Self> {
        let max_workers = max_workers.unwrap_or_else(num_cpus::get);
        if max_workers == 0 {
            return Err(TrajError::invalid_argument("max_workers must be > 0"));
        }
        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        })
    }

    /// Concurrency cap of the pool.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

impl<T: Send + 'static> WorkerPool<T> for TokioPool {
    fn submit(&self, job: Job<T>) -> JobFuture<T> {
        let task = AbortOnDrop(
            self.handle
                .spawn(run_blocking(Arc::clone(&self.permits), job)),
        );

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(join_error(e)),
            }
        }
        .boxed()
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

/// Runs each job to completion inside `submit`, on the caller's thread.
///
/// Useful for debugging and as the serial baseline in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl<T: Send + 'static> WorkerPool<T> for InlinePool {
    fn submit(&self, job: Job<T>) -> JobFuture<T> {
        let result = catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
            TrajError::worker(format!("task panicked: {}", panic_message(&*payload)))
        });
        future::ready(result).boxed()
    }

    fn name(&self) -> &str {
        "inline"
    }
}

/// Waits for every future, returning their values in submission order.
///
/// Resolves to the first error observed; the remaining futures are dropped.
pub async fn gather<F, T>(jobs: impl IntoIterator<Item = F>) -> TrajResult<Vec<T>>
where
    F: Future<Output = TrajResult<T>>,
{
    let jobs: Vec<F> = jobs.into_iter().collect();
    debug!(jobs = jobs.len(), "Waiting on block tasks");
    try_join_all(jobs).await
}

/// Join handle that cancels its task when the awaiting future is dropped.
///
/// `gather` drops the remaining futures after the first error, so tasks still
/// waiting for a permit never start their block. A job already running on a
/// blocking thread finishes, but its result is discarded.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_blocking<T: Send + 'static>(permits: Arc<Semaphore>, job: Job<T>) -> TrajResult<T> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| TrajError::worker(format!("worker pool closed: {e}")))?;
    tokio::task::spawn_blocking(job).await.map_err(join_error)
}

fn join_error(err: JoinError) -> TrajError {
    if err.is_panic() {
        let payload = err.into_panic();
        TrajError::worker(format!("task panicked: {}", panic_message(&*payload)))
    } else {
        TrajError::worker(format!("task cancelled: {err}"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_tokio_pool_preserves_submission_order() {
        let pool = TokioPool::new(Some(2)).unwrap();
        let futures: Vec<_> = (0..8usize)
            .map(|i| {
                let job: Job<usize> = Box::new(move || i * i);
                pool.submit(job)
            })
            .collect();

        let values = gather(futures).await.unwrap();
        assert_eq!(values, vec![0, 1, 4, 9, 16, 25, 36, 49]);
    }

    #[tokio::test]
    async fn test_tokio_pool_caps_concurrency() {
        let pool = TokioPool::new(Some(2)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..6)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                let job: Job<()> = Box::new(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                });
                pool.submit(job)
            })
            .collect();

        gather(futures).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_tokio_pool_reports_panics() {
        let pool = TokioPool::new(Some(1)).unwrap();
        let job: Job<()> = Box::new(|| panic!("boom"));
        let fut = pool.submit(job);

        let err = fut.await.unwrap_err();
        assert!(matches!(err, TrajError::Worker(ref msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_inline_pool_runs_eagerly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let job: Job<usize> = Box::new(move || c.fetch_add(1, Ordering::SeqCst));
        let fut = InlinePool.submit(job);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(fut.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inline_pool_reports_panics() {
        let job: Job<u8> = Box::new(|| -> u8 { panic!("inline boom") });
        let fut = InlinePool.submit(job);
        let err = fut.await.unwrap_err();
        assert!(err.to_string().contains("inline boom"));
    }

    #[tokio::test]
    async fn test_cancelled_task_is_a_worker_error() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let err = join_error(task.await.unwrap_err());
        assert!(matches!(err, TrajError::Worker(ref msg) if msg.contains("cancelled")));
    }

    #[tokio::test]
    async fn test_dropped_future_never_runs_its_job() {
        // Current-thread runtime: the spawned task is not polled before the drop.
        let pool = TokioPool::new(Some(1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let job: Job<()> = Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(pool.submit(job));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gather_stops_queued_jobs_after_failure() {
        let pool = TokioPool::new(Some(1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let failing = async { Err::<(), _>(TrajError::worker("first block failed")) }.boxed();
        let queued = (0..4).map(|_| {
            let c = Arc::clone(&counter);
            let job: Job<()> = Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            pool.submit(job)
        });
        let jobs: Vec<JobFuture<()>> = std::iter::once(failing).chain(queued).collect();

        assert!(gather(jobs).await.is_err());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = TokioPool::with_handle(runtime.handle().clone(), Some(0)).unwrap_err();
        assert!(matches!(err, TrajError::InvalidArgument(_)));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(TokioPool::new(None), Err(TrajError::Worker(_))));
    }
}
