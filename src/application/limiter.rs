use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

pub const DEFAULT_CONCURRENCY_LIMIT: u32 = 10;

/// Bounds the number of simultaneous in-flight payout transactions in this
/// process.
///
/// `acquire` fails fast with the observed count instead of queueing. The
/// counter is a compare-and-swap loop so concurrent completions cannot lose
/// updates, and a corrupted (negative) count self-heals to zero instead of
/// propagating.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    active: AtomicI64,
    limit: u32,
}

impl ConcurrencyLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            active: AtomicI64::new(0),
            limit,
        }
    }

    /// Try to claim an operation slot. On success the counter is incremented
    /// before any expensive work begins; the returned guard releases the slot
    /// when dropped, on every exit path.
    pub fn acquire(self: &Arc<Self>) -> Result<OperationSlot, u32> {
        let limit = self.limit as i64;
        let claimed = self.active.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            let current = current.max(0);
            if current >= limit { None } else { Some(current + 1) }
        });
        match claimed {
            Ok(previous) => {
                debug!(active = previous.max(0) + 1, limit = self.limit, "operation slot acquired");
                Ok(OperationSlot {
                    limiter: Arc::clone(self),
                })
            }
            Err(current) => {
                warn!(active = current, limit = self.limit, "concurrency limit reached");
                Err(current.max(0) as u32)
            }
        }
    }

    /// Currently active operations, clamped so corruption is never reported
    /// as a negative count.
    pub fn active_operations(&self) -> u32 {
        self.active.load(Ordering::SeqCst).max(0) as u32
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn release(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some((current - 1).max(0))
            });
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY_LIMIT)
    }
}

/// RAII slot: dropping it releases the operation, so a transaction that
/// fails, panics, or times out never permanently leaks capacity.
#[derive(Debug)]
pub struct OperationSlot {
    limiter: Arc<ConcurrencyLimiter>,
}

impl Drop for OperationSlot {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
