//! Fan-out/fan-in batch transformation
//!
//! Every item becomes one pool task. Results come back index-aligned with the
//! input; a task still running at the deadline is reported as
//! [`TransformationResult::Timeout`] and left to finish in the background.

use super::pool::WorkerPool;
use crate::core::transform::{ForwardTransformer, ReverseTransformer};
use crate::domain::{
    FhirPatient, FhirResource, TransformError, TransformedResource, UcsClient,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one item in a batch
#[derive(Debug, Clone)]
pub enum TransformationResult<T> {
    Success(T),
    Failure(TransformError),
    Timeout,
}

impl<T> TransformationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TransformationResult::Success(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransformationResult::Timeout)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            TransformationResult::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransformError> {
        match self {
            TransformationResult::Failure(e) => Some(e),
            _ => None,
        }
    }
}

/// Counters over one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub successes: usize,
    pub failures: usize,
    pub timeouts: usize,
}

impl BatchOutcome {
    pub fn from_results<T>(results: &[TransformationResult<T>]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match r {
                TransformationResult::Success(_) => acc.successes += 1,
                TransformationResult::Failure(_) => acc.failures += 1,
                TransformationResult::Timeout => acc.timeouts += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.successes + self.failures + self.timeouts
    }
}

/// Runs batches of transformations on a shared pool
pub struct TransformationExecutor {
    pool: Arc<WorkerPool>,
    default_timeout: Duration,
    forward: ForwardTransformer,
    reverse: ReverseTransformer,
}

impl TransformationExecutor {
    pub fn new(pool: Arc<WorkerPool>, default_timeout: Duration) -> Self {
        Self {
            pool,
            default_timeout,
            forward: ForwardTransformer::new(),
            reverse: ReverseTransformer::new(),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Applies `f` to every item concurrently and waits at most `timeout`
    ///
    /// A failing or panicking item never affects its siblings.
    pub async fn execute_batch<I, O, F>(
        &self,
        items: Vec<I>,
        f: F,
        timeout: Duration,
    ) -> Vec<TransformationResult<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Result<O, TransformError> + Send + Sync + 'static,
    {
        let deadline = Instant::now() + timeout;
        let f = Arc::new(f);

        let mut submitted = Vec::with_capacity(items.len());
        for item in items {
            let f = Arc::clone(&f);
            submitted.push(self.pool.submit_blocking(move || f(item)).await);
        }

        let mut results = Vec::with_capacity(submitted.len());
        for (index, task) in submitted.into_iter().enumerate() {
            let result = match task {
                Err(e) => TransformationResult::Failure(TransformError::wrap(
                    "Worker pool rejected the transformation",
                    e,
                )),
                Ok(handle) => match tokio::time::timeout_at(deadline, handle).await {
                    Ok(Ok(Ok(value))) => TransformationResult::Success(value),
                    Ok(Ok(Err(e))) => TransformationResult::Failure(e),
                    Ok(Err(e)) => TransformationResult::Failure(TransformError::wrap(
                        "Transformation task failed",
                        e,
                    )),
                    Err(_) => {
                        tracing::warn!(
                            pool = %self.pool.name(),
                            index = index,
                            timeout_ms = timeout.as_millis() as u64,
                            "Transformation timed out"
                        );
                        TransformationResult::Timeout
                    }
                },
            };
            results.push(result);
        }

        let outcome = BatchOutcome::from_results(&results);
        tracing::debug!(
            pool = %self.pool.name(),
            successes = outcome.successes,
            failures = outcome.failures,
            timeouts = outcome.timeouts,
            "Batch transformation finished"
        );
        results
    }

    /// UCS to FHIR over a batch, with the configured timeout
    pub async fn transform_forward_batch(
        &self,
        clients: Vec<UcsClient>,
    ) -> Vec<TransformationResult<TransformedResource<FhirPatient>>> {
        let transformer = self.forward.clone();
        self.execute_batch(
            clients,
            move |client| transformer.transform(&client),
            self.default_timeout,
        )
        .await
    }

    /// FHIR to UCS over a batch, with the configured timeout
    pub async fn transform_reverse_batch(
        &self,
        resources: Vec<FhirResource>,
        source: Option<String>,
    ) -> Vec<TransformationResult<UcsClient>> {
        let transformer = self.reverse.clone();
        self.execute_batch(
            resources,
            move |resource| transformer.transform(&resource, source.as_deref()),
            self.default_timeout,
        )
        .await
    }
}
