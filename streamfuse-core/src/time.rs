//! Clock abstraction for the pipeline
//!
//! Record timestamps are wall-clock milliseconds on the wire, but nothing in
//! the core schedules itself: ticks are driven externally and carry their own
//! `now`. The clock injected into the aggregator is only used to stamp
//! incoming readings for the optional max-age eviction, so it must be the
//! same source the tick driver reads. `FixedTime` covers tests and manual
//! driving; real deployments use [`SystemTime`] or a platform-specific
//! implementation.

use core::sync::atomic::{AtomicU64, Ordering};

/// Timestamp in milliseconds since epoch (or device boot for monotonic sources)
pub type Timestamp = u64;

/// Source of time for the pipeline
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;
}

/// System time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone, Default)]
pub struct SystemTime;

#[cfg(feature = "std")]
impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Monotonic time source anchored at construction (requires std)
///
/// Reports milliseconds elapsed since the source was created. Timestamps are
/// session relative rather than epoch relative and never go backwards when
/// the host wall clock is stepped.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicTime {
    /// Create a source whose zero point is the moment of the call
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Manually driven time source for tests and deterministic replay
///
/// Interior mutability so the same instance can be shared (e.g. behind an
/// `Arc`) between the test body and the component under test while the test
/// advances it.
#[derive(Debug, Default)]
pub struct FixedTime {
    ms: AtomicU64,
}

impl FixedTime {
    /// Create a source pinned at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            ms: AtomicU64::new(timestamp),
        }
    }

    /// Jump to an absolute timestamp
    pub fn set(&self, timestamp: Timestamp) {
        self.ms.store(timestamp, Ordering::Release);
    }

    /// Advance by `ms` milliseconds
    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.ms.load(Ordering::Acquire)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_advances() {
        let time = FixedTime::new(1000);
        assert_eq!(time.now(), 1000);

        time.advance(500);
        assert_eq!(time.now(), 1500);
    }

    #[test]
    fn fixed_time_set_overrides() {
        let time = FixedTime::new(5000);
        time.set(100);
        assert_eq!(time.now(), 100);
    }

    #[cfg(feature = "std")]
    #[test]
    fn system_time_is_wall_clock() {
        let time = SystemTime;
        assert!(time.is_wall_clock());
        assert!(time.now() > 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn monotonic_time_moves_forward() {
        let time = MonotonicTime::new();
        assert!(!time.is_wall_clock());

        let first = time.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(time.now() > first);
    }
}
