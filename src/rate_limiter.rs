//! Request pacing for the photo source
//!
//! The RequestLimiter spaces out fetches across all concurrent jobs so the
//! process as a whole never exceeds a fixed number of requests per second.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide request pacer shared across all jobs
///
/// # Algorithm
///
/// Every caller reserves the next free time slot with a lock-free
/// compare-and-swap on `next_slot`, then sleeps until that slot arrives.
/// Slots are `1 / requests_per_second` apart, so concurrent jobs interleave
/// instead of bursting. A caller arriving after a quiet period gets a slot
/// immediately.
///
/// Dropping the `acquire` future after the reservation (e.g. on cancellation)
/// simply leaves a gap in the schedule.
#[derive(Clone, Debug)]
pub struct RequestLimiter {
    /// Requests per second (0 = unlimited)
    per_second: Arc<AtomicU64>,
    /// Earliest start of the next free slot (nanoseconds since process epoch)
    next_slot: Arc<AtomicU64>,
}

impl RequestLimiter {
    /// Create a limiter allowing `per_second` requests (None = unlimited)
    ///
    /// ```
    /// use flickr_dl::rate_limiter::RequestLimiter;
    ///
    /// let limiter = RequestLimiter::new(Some(1));
    /// assert_eq!(limiter.get_limit(), Some(1));
    /// assert_eq!(RequestLimiter::new(None).get_limit(), None);
    /// ```
    #[must_use]
    pub fn new(per_second: Option<u32>) -> Self {
        Self {
            per_second: Arc::new(AtomicU64::new(u64::from(per_second.unwrap_or(0)))),
            next_slot: Arc::new(AtomicU64::new(Self::now_nanos())),
        }
    }

    /// Change the rate; takes effect for the next reservation
    pub fn set_limit(&self, per_second: Option<u32>) {
        self.per_second
            .store(u64::from(per_second.unwrap_or(0)), Ordering::SeqCst);
    }

    /// Current rate, None if unlimited
    pub fn get_limit(&self) -> Option<u32> {
        match self.per_second.load(Ordering::Relaxed) {
            0 => None,
            limit => Some(limit as u32),
        }
    }

    /// Wait for permission to send one request
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Reserve the next slot and return how long to wait for it
    fn reserve(&self) -> Duration {
        let limit = self.per_second.load(Ordering::Relaxed);
        if limit == 0 {
            return Duration::ZERO;
        }
        let interval = 1_000_000_000 / limit;

        loop {
            let now = Self::now_nanos();
            let next = self.next_slot.load(Ordering::SeqCst);
            let slot = next.max(now);

            if self
                .next_slot
                .compare_exchange(next, slot + interval, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Duration::from_nanos(slot - now);
            }
            // another caller took this slot, try the one after it
        }
    }

    /// Monotonic nanoseconds since the first call in this process
    fn now_nanos() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}
