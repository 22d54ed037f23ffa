use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use winescout_common::Config;

/// Tracks a single request's spend against its hard resource caps.
/// Thread-safe via atomic operations so parallel search arms share one budget.
///
/// Reservations are check-and-increment: a counter never exceeds its max, and
/// once a cap is hit every further reservation of that kind returns false for
/// the rest of the request. Exhaustion is a skip signal, not an error.
pub struct Budget {
    max_search_calls: u64,
    max_document_fetches: u64,
    max_total_bytes: u64,
    search_calls: AtomicU64,
    document_fetches: AtomicU64,
    bytes: AtomicU64,
    started_at: Instant,
    max_wall_clock: Duration,
}

impl Budget {
    pub fn new(config: &Config) -> Self {
        Self::with_caps(
            config.max_search_calls,
            config.max_document_fetches,
            config.max_total_bytes,
            Duration::from_millis(config.max_wall_clock_ms),
        )
    }

    pub fn with_caps(
        max_search_calls: u64,
        max_document_fetches: u64,
        max_total_bytes: u64,
        max_wall_clock: Duration,
    ) -> Self {
        Self {
            max_search_calls,
            max_document_fetches,
            max_total_bytes,
            search_calls: AtomicU64::new(0),
            document_fetches: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            started_at: Instant::now(),
            max_wall_clock,
        }
    }

    /// Reserve one search-engine call. False means the cap is spent.
    pub fn reserve_search_call(&self) -> bool {
        let ok = reserve(&self.search_calls, self.max_search_calls, 1);
        if !ok {
            info!(max = self.max_search_calls, "Search call budget exhausted");
        }
        ok
    }

    /// Reserve one document fetch (pdf/doc/xls downloads).
    pub fn reserve_document_fetch(&self) -> bool {
        let ok = reserve(&self.document_fetches, self.max_document_fetches, 1);
        if !ok {
            info!(max = self.max_document_fetches, "Document fetch budget exhausted");
        }
        ok
    }

    /// Reserve `n` bytes of page content.
    pub fn reserve_bytes(&self, n: u64) -> bool {
        let ok = reserve(&self.bytes, self.max_total_bytes, n);
        if !ok {
            info!(requested = n, max = self.max_total_bytes, "Byte budget exhausted");
        }
        ok
    }

    /// Is there wall-clock time left? Advisory: in-flight operations finish,
    /// later stages skip.
    pub fn has_wall_clock_budget(&self) -> bool {
        self.started_at.elapsed() < self.max_wall_clock
    }

    pub fn search_calls_used(&self) -> u64 {
        self.search_calls.load(Ordering::Relaxed)
    }

    pub fn document_fetches_used(&self) -> u64 {
        self.document_fetches.load(Ordering::Relaxed)
    }

    pub fn bytes_used(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Log budget status at the end of a run.
    pub fn log_status(&self) {
        info!(
            search_calls = self.search_calls_used(),
            max_search_calls = self.max_search_calls,
            document_fetches = self.document_fetches_used(),
            bytes = self.bytes_used(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Budget status"
        );
    }
}

/// Atomically add `amount` to `counter` only if the result stays within `max`.
fn reserve(counter: &AtomicU64, max: u64, amount: u64) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
            used.checked_add(amount).filter(|next| *next <= max)
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(searches: u64, fetches: u64, bytes: u64) -> Budget {
        Budget::with_caps(searches, fetches, bytes, Duration::from_secs(60))
    }

    #[test]
    fn counters_never_exceed_max() {
        let b = budget(3, 1, 1000);
        assert!(b.reserve_search_call());
        assert!(b.reserve_search_call());
        assert!(b.reserve_search_call());
        assert!(!b.reserve_search_call());
        assert_eq!(b.search_calls_used(), 3);
    }

    #[test]
    fn exhausted_budget_stays_exhausted() {
        let b = budget(1, 1, 1000);
        assert!(b.reserve_search_call());
        for _ in 0..10 {
            assert!(!b.reserve_search_call());
        }
        assert_eq!(b.search_calls_used(), 1);
    }

    #[test]
    fn byte_reservation_rejects_overflowing_amounts() {
        let b = budget(1, 1, 1000);
        assert!(b.reserve_bytes(800));
        // 800 + 300 would exceed the cap; counter is unchanged.
        assert!(!b.reserve_bytes(300));
        assert_eq!(b.bytes_used(), 800);
        // A smaller reservation still fits.
        assert!(b.reserve_bytes(200));
        assert!(!b.reserve_bytes(1));
    }

    #[test]
    fn independent_counters() {
        let b = budget(1, 1, 100);
        assert!(b.reserve_search_call());
        assert!(!b.reserve_search_call());
        assert!(b.reserve_document_fetch());
        assert!(b.reserve_bytes(100));
    }

    #[test]
    fn wall_clock_budget_expires() {
        let b = Budget::with_caps(1, 1, 1, Duration::ZERO);
        assert!(!b.has_wall_clock_budget());

        let b = Budget::with_caps(1, 1, 1, Duration::from_secs(60));
        assert!(b.has_wall_clock_budget());
    }
}
