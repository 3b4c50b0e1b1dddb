//! Lock-free circuit breaker
//!
//! State and the time the circuit last opened share one `AtomicU64`, so each
//! transition is a single compare-and-swap and exactly one caller performs it.
//!
//! ```text
//! CLOSED --failure_threshold consecutive failures--> OPEN
//! OPEN --open_timeout elapsed, first caller probes--> HALF_OPEN
//! HALF_OPEN --success_threshold successes--> CLOSED
//! HALF_OPEN --any failure--> OPEN
//! ```

use crate::config::CircuitBreakerConfig;
use crate::domain::{CircuitOpenError, Retryable};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

/// Low bits hold the state, the rest the open time in millis since `epoch`
fn pack(state: u8, opened_at_ms: u64) -> u64 {
    (opened_at_ms << STATE_BITS) | u64::from(state)
}

fn unpack(word: u64) -> (u8, u64) {
    ((word & STATE_MASK) as u8, word >> STATE_BITS)
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("CLOSED"),
            CircuitState::Open => f.write_str("OPEN"),
            CircuitState::HalfOpen => f.write_str("HALF_OPEN"),
        }
    }
}

/// Circuit breaker guarding one external system
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    open_timeout: Duration,
    /// See [`pack`]
    state: AtomicU64,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    epoch: Instant,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        success_threshold: u32,
        open_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            open_timeout,
            state: AtomicU64::new(pack(CLOSED, 0)),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            config.success_threshold,
            Duration::from_secs(config.open_timeout_seconds),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        match unpack(self.state.load(Ordering::Acquire)).0 {
            OPEN => CircuitState::Open,
            HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Consecutive failures counted while closed
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    /// Runs `operation` through the breaker
    ///
    /// The future is not polled when the circuit rejects the call. Only
    /// transient errors count as failures; a non-transient error means the
    /// backend answered and is recorded as a success.
    pub async fn call<Fut, T, E>(&self, operation: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError> + Retryable,
    {
        if !self.try_acquire() {
            tracing::debug!(circuit = %self.name, "Circuit open, rejecting call");
            return Err(E::from(CircuitOpenError {
                name: self.name.clone(),
            }));
        }

        let result = operation.await;
        match &result {
            Err(e) if e.is_retryable() => self.on_failure(),
            _ => self.on_success(),
        }
        result
    }

    fn try_acquire(&self) -> bool {
        let word = self.state.load(Ordering::Acquire);
        match unpack(word) {
            (CLOSED | HALF_OPEN, _) => true,
            (_, opened_at) => {
                if self.now_ms().saturating_sub(opened_at) < self.open_timeout.as_millis() as u64 {
                    return false;
                }
                match self.state.compare_exchange(
                    word,
                    pack(HALF_OPEN, opened_at),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        self.success_count.store(0, Ordering::Release);
                        tracing::info!(circuit = %self.name, "Circuit half-open, probing");
                        true
                    }
                    // Another caller already transitioned; follow its outcome
                    Err(current) => unpack(current).0 != OPEN,
                }
            }
        }
    }

    fn on_success(&self) {
        let word = self.state.load(Ordering::Acquire);
        match unpack(word) {
            (HALF_OPEN, opened_at) => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.success_threshold
                    && self
                        .state
                        .compare_exchange(
                            word,
                            pack(CLOSED, opened_at),
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    self.failure_count.store(0, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                    tracing::info!(circuit = %self.name, "Circuit closed");
                }
            }
            (CLOSED, _) => self.failure_count.store(0, Ordering::Release),
            _ => {}
        }
    }

    fn on_failure(&self) {
        let word = self.state.load(Ordering::Acquire);
        match unpack(word).0 {
            CLOSED => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.failure_threshold {
                    self.trip(word, failures);
                }
            }
            HALF_OPEN => self.trip(word, self.failure_count()),
            _ => {}
        }
    }

    /// Opens the circuit if it still is in the `observed` state; a lost race
    /// leaves state and open time untouched
    fn trip(&self, observed: u64, failures: u32) {
        if self
            .state
            .compare_exchange(
                observed,
                pack(OPEN, self.now_ms()),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.success_count.store(0, Ordering::Release);
            tracing::warn!(
                circuit = %self.name,
                failures = failures,
                open_timeout_ms = self.open_timeout.as_millis() as u64,
                "Circuit opened"
            );
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UcsError;

    fn breaker(open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new("ucs", 3, 2, open_timeout)
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), UcsError> {
        cb.call(async { Err::<(), _>(UcsError::ConnectionFailed("down".into())) })
            .await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), UcsError> {
        cb.call(async { Ok::<(), UcsError>(()) }).await
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..3 {
            assert!(fail(&cb).await.is_err());
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let rejected = succeed(&cb).await;
        assert!(matches!(rejected, Err(UcsError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(Duration::from_secs(60));
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        succeed(&cb).await.unwrap();
        assert_eq!(cb.failure_count(), 0);
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_successes() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..3 {
            fail(&cb).await.ok();
        }
        tokio::time::sleep(Duration::from_millis(40)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..3 {
            fail(&cb).await.ok();
        }
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_losing_trip_keeps_open_time() {
        let cb = breaker(Duration::from_secs(60));
        let closed = cb.state.load(Ordering::Acquire);
        for _ in 0..3 {
            fail(&cb).await.ok();
        }
        let opened = cb.state.load(Ordering::Acquire);
        assert_eq!(unpack(opened).0, OPEN);

        // A caller that saw CLOSED before the circuit opened
        tokio::time::sleep(Duration::from_millis(5)).await;
        cb.trip(closed, 3);

        assert_eq!(cb.state.load(Ordering::Acquire), opened);
    }

    #[test]
    fn test_pack_round_trip() {
        assert_eq!(unpack(pack(HALF_OPEN, 123_456)), (HALF_OPEN, 123_456));
        assert_eq!(unpack(pack(CLOSED, 0)), (CLOSED, 0));
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..5 {
            let result = cb
                .call(async { Err::<(), _>(UcsError::NotFound("OPENSRP-1".into())) })
                .await;
            assert!(matches!(result, Err(UcsError::NotFound(_))));
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
