//! Bounded worker pool with an explicit overflow policy
//!
//! Two semaphores bound the pool: `admission` holds `workers + queue_capacity`
//! slots (running plus waiting tasks) and `execution` holds `workers` permits.
//! A task keeps its admission slot until it finishes, so a timed-out task that
//! is still running continues to count against the pool.

use crate::config::PoolConfig;
use crate::domain::{BridgeError, PoolError, Result};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// What `submit` does when every admission slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// The submitting caller runs the task itself
    #[default]
    RunInline,
    /// Wait for a free slot
    Block,
    /// Fail with `PoolError::Saturated`
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "run_inline" | "caller_runs" => Ok(Self::RunInline),
            "block" => Ok(Self::Block),
            "reject" => Ok(Self::Reject),
            _ => Err(BridgeError::Configuration(format!(
                "Invalid overflow policy: {s}. Expected 'run_inline', 'block' or 'reject'"
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::RunInline => f.write_str("run_inline"),
            OverflowPolicy::Block => f.write_str("block"),
            OverflowPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Handle to a submitted task
///
/// Resolves to the task's value, or `PoolError::TaskFailed` if it panicked.
/// Dropping the handle detaches the task; it is never cancelled.
pub struct TaskHandle<T> {
    inner: HandleInner<T>,
}

enum HandleInner<T> {
    Spawned(JoinHandle<std::result::Result<T, PoolError>>),
    Ready(Option<std::result::Result<T, PoolError>>),
}

// The value is moved out, never pinned in place
impl<T> Unpin for TaskHandle<T> {}

impl<T> TaskHandle<T> {
    fn ready(result: std::result::Result<T, PoolError>) -> Self {
        Self {
            inner: HandleInner::Ready(Some(result)),
        }
    }

    fn spawned(handle: JoinHandle<std::result::Result<T, PoolError>>) -> Self {
        Self {
            inner: HandleInner::Spawned(handle),
        }
    }

    /// True if the task ran inline on the submitting caller
    pub fn ran_inline(&self) -> bool {
        matches!(self.inner, HandleInner::Ready(_))
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = std::result::Result<T, PoolError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            HandleInner::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(PoolError::TaskFailed(panic_message(e.into_panic()))),
                Err(e) => Err(PoolError::TaskFailed(e.to_string())),
            }),
            HandleInner::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(PoolError::TaskFailed("handle polled twice".into()))),
            ),
        }
    }
}

/// A named, bounded pool of workers
pub struct WorkerPool {
    name: String,
    workers: usize,
    queue_capacity: usize,
    policy: OverflowPolicy,
    admission: Arc<Semaphore>,
    execution: Arc<Semaphore>,
    inline_runs: AtomicU64,
}

impl WorkerPool {
    pub fn new(
        name: impl Into<String>,
        workers: usize,
        queue_capacity: usize,
        policy: OverflowPolicy,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            name: name.into(),
            workers,
            queue_capacity,
            policy,
            admission: Arc::new(Semaphore::new(workers + queue_capacity)),
            execution: Arc::new(Semaphore::new(workers)),
            inline_runs: AtomicU64::new(0),
        }
    }

    /// Builds a pool from its configuration section
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Configuration` for an unknown overflow policy.
    pub fn from_config(name: impl Into<String>, config: &PoolConfig) -> Result<Self> {
        let policy = config.overflow_policy.parse()?;
        Ok(Self::new(name, config.workers, config.queue_capacity, policy))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Tasks that ran on the submitting caller because the pool was full
    pub fn inline_runs(&self) -> u64 {
        self.inline_runs.load(Ordering::Relaxed)
    }

    /// Submits CPU-bound work to run on the blocking thread pool
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Saturated` when the pool is full and the policy is
    /// `Reject`.
    pub async fn submit_blocking<F, T>(&self, task: F) -> std::result::Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let admission = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => match self.overflow().await? {
                Some(permit) => permit,
                None => {
                    let result = std::panic::catch_unwind(AssertUnwindSafe(task))
                        .map_err(|p| PoolError::TaskFailed(panic_message(p)));
                    return Ok(TaskHandle::ready(result));
                }
            },
        };

        let execution = Arc::clone(&self.execution);
        let handle = tokio::spawn(async move {
            let _admission = admission;
            let _permit = execution
                .acquire_owned()
                .await
                .map_err(|e| PoolError::TaskFailed(e.to_string()))?;
            tokio::task::spawn_blocking(task)
                .await
                .map_err(|e| match e.try_into_panic() {
                    Ok(payload) => PoolError::TaskFailed(panic_message(payload)),
                    Err(e) => PoolError::TaskFailed(e.to_string()),
                })
        });
        Ok(TaskHandle::spawned(handle))
    }

    /// Submits async work
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Saturated` when the pool is full and the policy is
    /// `Reject`.
    pub async fn spawn<Fut, T>(&self, task: Fut) -> std::result::Result<TaskHandle<T>, PoolError>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let admission = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => match self.overflow().await? {
                Some(permit) => permit,
                None => {
                    let result = AssertUnwindSafe(task)
                        .catch_unwind()
                        .await
                        .map_err(|p| PoolError::TaskFailed(panic_message(p)));
                    return Ok(TaskHandle::ready(result));
                }
            },
        };

        let execution = Arc::clone(&self.execution);
        let handle = tokio::spawn(async move {
            let _admission = admission;
            let _permit = execution
                .acquire_owned()
                .await
                .map_err(|e| PoolError::TaskFailed(e.to_string()))?;
            Ok(task.await)
        });
        Ok(TaskHandle::spawned(handle))
    }

    /// Applies the overflow policy; `None` means run inline
    async fn overflow(
        &self,
    ) -> std::result::Result<Option<tokio::sync::OwnedSemaphorePermit>, PoolError> {
        match self.policy {
            OverflowPolicy::RunInline => {
                self.inline_runs.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(pool = %self.name, "Pool saturated, running task inline");
                Ok(None)
            }
            OverflowPolicy::Block => {
                tracing::debug!(pool = %self.name, "Pool saturated, waiting for a slot");
                self.admission
                    .clone()
                    .acquire_owned()
                    .await
                    .map(Some)
                    .map_err(|e| PoolError::Saturated(format!("{}: {e}", self.name)))
            }
            OverflowPolicy::Reject => {
                tracing::warn!(
                    pool = %self.name,
                    workers = self.workers,
                    queue_capacity = self.queue_capacity,
                    "Pool saturated, rejecting task"
                );
                Err(PoolError::Saturated(self.name.clone()))
            }
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("policy", &self.policy)
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!(
            "run_inline".parse::<OverflowPolicy>().unwrap(),
            OverflowPolicy::RunInline
        );
        assert_eq!("BLOCK".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Block);
        assert!("drop".parse::<OverflowPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_submit_blocking_returns_value() {
        let pool = WorkerPool::new("test", 2, 2, OverflowPolicy::RunInline);
        let handle = pool.submit_blocking(|| 21 * 2).await.unwrap();
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_panic_becomes_task_failed() {
        let pool = WorkerPool::new("test", 1, 0, OverflowPolicy::RunInline);
        let handle = pool
            .submit_blocking(|| -> u32 { panic!("boom") })
            .await
            .unwrap();
        match handle.await {
            Err(PoolError::TaskFailed(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_saturated_pool_runs_inline() {
        let pool = WorkerPool::new("test", 1, 0, OverflowPolicy::RunInline);
        let (release, gate) = oneshot::channel::<()>();
        let busy = pool
            .spawn(async move {
                gate.await.ok();
            })
            .await
            .unwrap();

        let inline = pool.submit_blocking(|| "inline").await.unwrap();
        assert!(inline.ran_inline());
        assert_eq!(inline.await.unwrap(), "inline");
        assert_eq!(pool.inline_runs(), 1);

        release.send(()).ok();
        busy.await.unwrap();
    }

    #[tokio::test]
    async fn test_saturated_pool_rejects() {
        let pool = WorkerPool::new("test", 1, 0, OverflowPolicy::Reject);
        let (release, gate) = oneshot::channel::<()>();
        let busy = pool
            .spawn(async move {
                gate.await.ok();
            })
            .await
            .unwrap();

        assert!(matches!(
            pool.spawn(async {}).await,
            Err(PoolError::Saturated(_))
        ));

        release.send(()).ok();
        busy.await.unwrap();
    }

    #[tokio::test]
    async fn test_saturated_pool_blocks_until_slot_frees() {
        let pool = Arc::new(WorkerPool::new("test", 1, 0, OverflowPolicy::Block));
        let busy = pool
            .spawn(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();

        let waited = pool.submit_blocking(|| 5).await.unwrap();
        assert!(!waited.ran_inline());
        assert_eq!(waited.await.unwrap(), 5);
        busy.await.unwrap();
    }
}
