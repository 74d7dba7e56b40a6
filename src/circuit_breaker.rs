use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Breaker states. Closed passes calls through and counts consecutive
/// failures; Open rejects calls without invoking them; HalfOpen allows a
/// single trial call after the cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error + 'static> {
    #[error("circuit breaker is open (last failure {since:?} ago)")]
    Open { since: Duration },

    #[error(transparent)]
    Service(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
}

/// Tracks consecutive failures across separate fetch invocations (e.g.
/// repeated daily runs against the same publisher). Retries inside a single
/// `Fetcher::fetch` call do not touch the breaker; wrap the whole call.
///
/// The Open → HalfOpen transition is evaluated lazily at call time; there is
/// no background timer. Calls serialize through the internal lock, so one
/// breaker instance is safe to share across threads.
pub struct CircuitBreaker {
    max_failures: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, cooldown: Duration) -> Self {
        Self {
            max_failures,
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
            }),
        }
    }

    pub fn call<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error + 'static,
    {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");

        if inner.state == CircuitState::Open {
            let since = inner
                .last_failure
                .map(|t| t.elapsed())
                .unwrap_or_default();
            if since > self.cooldown {
                inner.state = CircuitState::HalfOpen;
                inner.failures = 0;
            } else {
                return Err(BreakerError::Open { since });
            }
        }

        match f() {
            Ok(value) => {
                if inner.state == CircuitState::HalfOpen {
                    inner.state = CircuitState::Closed;
                }
                inner.failures = 0;
                Ok(value)
            }
            Err(e) => {
                inner.failures += 1;
                inner.last_failure = Some(Instant::now());
                if inner.failures >= self.max_failures {
                    inner.state = CircuitState::Open;
                }
                Err(BreakerError::Service(e))
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker lock poisoned").state
    }

    pub fn failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("circuit breaker lock poisoned")
            .failures
    }

    /// Manually return to Closed with a clean failure counter.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.state = CircuitState::Closed;
        inner.failures = 0;
    }
}
