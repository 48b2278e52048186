use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state.
///
/// - `Closed`: operations allowed, failures counted.
/// - `Open`: operations rejected until the open window elapses.
/// - `HalfOpen`: limited trial; the probing call itself is the recovery
///   attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker policy. The defaults are platform policy for the payout network.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive-failure count that trips the breaker open.
    pub failure_threshold: u32,
    /// How long the breaker stays open before the next call may probe.
    pub open_window: Duration,
    /// Successes required in half-open to close the breaker.
    pub half_open_successes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_window: Duration::from_secs(300),
            half_open_successes: 3,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Observable snapshot, for tests and operator diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
}

/// Process-wide fault detector for the external payout dependency.
///
/// Constructed once per process and shared by reference across concurrent
/// orchestration calls; the state sits behind a narrow mutex that is never
/// held across an await point. Uses `tokio::time::Instant` so paused-clock
/// tests can drive the open window deterministically.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Decide whether an operation may proceed.
    ///
    /// While open, returns the remaining wait. Once the open window has
    /// elapsed, the breaker moves to half-open and the call that observed
    /// the transition is allowed through as the probe.
    pub fn check(&self) -> Result<(), Duration> {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let last = inner
                    .last_failure
                    .expect("open breaker always stamps last_failure");
                let elapsed = last.elapsed();
                if elapsed >= self.config.open_window {
                    inner.state = BreakerState::HalfOpen;
                    inner.success_count = 0;
                    info!("circuit breaker half-open, probing payout network");
                    Ok(())
                } else {
                    Err(self.config.open_window - elapsed)
                }
            }
        }
    }

    /// Record a successful attempt. Called exactly once per orchestration
    /// attempt that reached the executor.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_successes {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.last_failure = None;
                    info!("circuit breaker closed, payout network recovered");
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed attempt (including timeouts).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.last_failure = Some(Instant::now());
                    warn!(
                        failure_count = inner.failure_count,
                        "circuit breaker opened"
                    );
                } else {
                    inner.last_failure = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.failure_count = 1;
                inner.last_failure = Some(Instant::now());
                warn!("circuit breaker reopened after failed probe");
            }
            BreakerState::Open => {
                inner.last_failure = Some(Instant::now());
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker mutex poisoned");
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
