//! Batch Accumulation and the Completed-Batch Queue
#![allow(unsafe_code)] // Required for the lock-free completed-batch ring
//!
//! ## Overview
//!
//! Unified records accumulate in an in-progress buffer owned by the
//! scheduler thread. The moment the buffer reaches the configured batch
//! size, [`BatchAccumulator::add`] seals it synchronously (not on a timer)
//! and moves it onto the [`CompletedQueue`], where the drainer picks it
//! up. The state machine per batch is strictly linear:
//!
//! ```text
//! ACCUMULATING ──(size reached)──► COMPLETED ──(drain)──► consumed
//! ```
//!
//! Completed batches are immutable and must never be lost: a dropped
//! completed batch is a correctness bug, not an accepted failure mode. That
//! rule shapes every overflow decision in this module:
//!
//! 1. A full queue makes the swap *defer*: the sealed records stay in the
//!    in-progress buffer and the swap retries on the next `add` or on the
//!    safety-flush check. Nothing is dropped.
//! 2. Under a prolonged jam the in-progress buffer is capped at a small
//!    multiple of the batch size; past the cap, *new* records are dropped
//!    and counted. New data is sacrificed before completed data, always.
//!
//! ## Queue
//!
//! The [`CompletedQueue`] is a bounded lock-free ring: one producer (the
//! scheduler thread driving the accumulator) and any number of consumers
//! popping via CAS. Push and pop are O(1) and never block, so the drainer
//! and the accumulator can run on different threads without a lock between
//! them. Capacity is one less than the slot count; one slot stays empty to
//! distinguish full from empty.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use core::cell::UnsafeCell;
use core::mem::{self, MaybeUninit};
use core::ptr;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::config::PipelineConfig;
use crate::constants::{COMPLETED_QUEUE_SLOTS, PENDING_OVERFLOW_FACTOR};
use crate::errors::{BatchError, ConfigResult};
use crate::record::{Batch, UnifiedRecord};
use crate::time::TimeSource;

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Slot count must be a power of two for the masked ring arithmetic
const _: () = assert!(
    COMPLETED_QUEUE_SLOTS.is_power_of_two(),
    "Completed queue slot count must be a power of 2"
);

/// Completed-batch queue health counters
pub struct QueueStats {
    /// Batches pushed onto the queue
    pub pushed: AtomicU32,
    /// Batches popped off the queue
    pub popped: AtomicU32,
    /// Push attempts bounced by a full queue (the batch was handed back,
    /// not dropped)
    pub deferred: AtomicU32,
    /// Maximum queue depth seen
    pub max_depth: AtomicU32,
}

impl QueueStats {
    const fn new() -> Self {
        Self {
            pushed: AtomicU32::new(0),
            popped: AtomicU32::new(0),
            deferred: AtomicU32::new(0),
            max_depth: AtomicU32::new(0),
        }
    }

    /// Update max depth if current is higher
    fn update_max_depth(&self, current: u32) {
        let mut max = self.max_depth.load(Ordering::Relaxed);
        while current > max {
            match self.max_depth.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

/// Bounded lock-free ring of completed batches
///
/// Single producer (the accumulator's owner), multiple consumers. A full
/// queue hands the batch back to the caller instead of dropping it.
pub struct CompletedQueue<const N: usize> {
    /// Ring storage; slots outside [tail, head) are uninitialized
    buffer: UnsafeCell<[MaybeUninit<Batch>; N]>,

    /// Next write position (producer owned)
    head: AtomicUsize,

    /// Next read position (consumer shared)
    tail: AtomicUsize,

    stats: QueueStats,
}

impl<const N: usize> CompletedQueue<N> {
    /// Create a new empty queue
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "slot count must be a power of 2");
        Self {
            buffer: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            stats: QueueStats::new(),
        }
    }

    /// Push a completed batch (single producer)
    ///
    /// A full queue returns the batch to the caller so it can defer and
    /// retry; the batch is never dropped here.
    ///
    /// ## Safety
    /// Only one thread may push at a time.
    pub fn push(&self, batch: Batch) -> Result<(), Batch> {
        let head = self.head.load(Ordering::Acquire);
        let next_head = (head + 1) & (N - 1); // Fast modulo for power of 2

        if next_head == self.tail.load(Ordering::Acquire) {
            self.stats.deferred.fetch_add(1, Ordering::Relaxed);
            return Err(batch);
        }

        // Sole producer: this slot is outside [tail, head) and unreachable
        // by consumers until the head moves
        unsafe {
            let buffer = &mut *self.buffer.get();
            buffer[head].write(batch);
        }

        // Make the slot visible before publishing the new head
        self.head.store(next_head, Ordering::Release);

        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.stats.update_max_depth(self.len() as u32);
        Ok(())
    }

    /// Pop the oldest completed batch (multiple consumers)
    pub fn pop(&self) -> Option<Batch> {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            // Claim the slot before reading it out
            let next_tail = (tail + 1) & (N - 1);
            match self.tail.compare_exchange_weak(
                tail,
                next_tail,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let batch = unsafe {
                        let buffer = &*self.buffer.get();
                        ptr::read(buffer[tail].as_ptr())
                    };
                    self.stats.popped.fetch_add(1, Ordering::Relaxed);
                    return Some(batch);
                }
                Err(_) => {
                    // Another consumer claimed it, retry
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Current number of queued batches
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        if head >= tail {
            head - tail
        } else {
            N - tail + head
        }
    }

    /// True when no batch is queued
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// True when the next push would bounce
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        ((head + 1) & (N - 1)) == tail
    }

    /// Queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Drain all queued batches in FIFO order
    pub fn drain(&self) -> QueueDrain<'_, N> {
        QueueDrain { queue: self }
    }
}

impl<const N: usize> Drop for CompletedQueue<N> {
    fn drop(&mut self) {
        // Batches own heap records; release whatever was never drained
        while self.pop().is_some() {}
    }
}

// The ring synchronizes all slot access through head/tail
unsafe impl<const N: usize> Send for CompletedQueue<N> {}
unsafe impl<const N: usize> Sync for CompletedQueue<N> {}

/// Iterator draining a [`CompletedQueue`] batch by batch
pub struct QueueDrain<'a, const N: usize> {
    queue: &'a CompletedQueue<N>,
}

impl<const N: usize> Iterator for QueueDrain<'_, N> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop()
    }
}

/// Counters describing one accumulator's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccumulatorStats {
    /// Records appended to the in-progress buffer
    pub records_added: u64,
    /// Records dropped at the in-progress cap during a queue jam
    pub records_dropped: u64,
    /// Batches sealed and moved to the completed queue
    pub batches_completed: u64,
    /// Swaps deferred because the completed queue was full
    pub deferred_swaps: u64,
    /// Safety-flush checks that actually sealed a batch
    pub safety_flushes: u64,
}

/// Collects unified records into fixed-size batches
///
/// Owned and driven by a single scheduler context; shares only the
/// [`CompletedQueue`] with the drainer. See the [module docs](self) for the
/// overflow discipline.
pub struct BatchAccumulator {
    batch_size: usize,
    clock: Arc<dyn TimeSource>,
    pending: Vec<UnifiedRecord>,
    completed: Arc<CompletedQueue<COMPLETED_QUEUE_SLOTS>>,
    stats: AccumulatorStats,
}

impl BatchAccumulator {
    /// Build an accumulator from a validated configuration
    pub fn new(config: &PipelineConfig, clock: Arc<dyn TimeSource>) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            batch_size: config.batch_size,
            clock,
            pending: Vec::with_capacity(config.batch_size),
            completed: Arc::new(CompletedQueue::new()),
            stats: AccumulatorStats::default(),
        })
    }

    /// Handle to the completed-batch queue, for wiring up a drainer
    pub fn completed_queue(&self) -> Arc<CompletedQueue<COMPLETED_QUEUE_SLOTS>> {
        self.completed.clone()
    }

    /// Append one record; seals and hands off a batch the moment the
    /// in-progress buffer reaches the batch size
    pub fn add(&mut self, record: UnifiedRecord) {
        let cap = self.batch_size * PENDING_OVERFLOW_FACTOR;
        if self.pending.len() >= cap {
            // Queue jammed and the buffer is at its cap: sacrifice the new
            // record, never a completed batch
            self.stats.records_dropped += 1;
            log_warn!(
                "in-progress buffer at cap ({} records), dropping new record",
                cap
            );
            return;
        }

        self.pending.push(record);
        self.stats.records_added += 1;
        self.swap_full_batches();
    }

    /// Defensive flush check, driven at the nominal batch duration
    ///
    /// A no-op in the steady state (`add` already sealed the batch) and
    /// after a deferred swap the retry that gets the backlog moving again.
    /// Never seals a partial batch. Returns the number of batches sealed.
    pub fn safety_flush(&mut self) -> usize {
        if self.pending.len() < self.batch_size {
            return 0;
        }
        let sealed = self.swap_full_batches();
        self.stats.safety_flushes += sealed as u64;
        sealed
    }

    /// Seal whatever is in progress, regardless of size
    ///
    /// The one deliberate exception to the fixed-size rule, meant for
    /// shutdown so the tail of a session is not silently discarded. Full
    /// batches are sealed first; the remainder goes out as a short batch.
    /// With the queue full nothing is flushed and the records stay pending.
    /// Returns the number of records moved to the completed queue.
    pub fn flush_partial(&mut self) -> Result<usize, BatchError> {
        let mut flushed = self.swap_full_batches() * self.batch_size;

        if !self.pending.is_empty() {
            let records = mem::take(&mut self.pending);
            let count = records.len();
            let batch = Batch::seal(records, self.clock.now());
            match self.completed.push(batch) {
                Ok(()) => {
                    self.stats.batches_completed += 1;
                    flushed += count;
                }
                Err(batch) => {
                    self.pending = batch.into_records();
                    return Err(BatchError::QueueFull {
                        capacity: COMPLETED_QUEUE_SLOTS,
                    });
                }
            }
        }
        Ok(flushed)
    }

    /// Atomically remove and return all completed batches, oldest first
    ///
    /// Never blocks and never touches the in-progress buffer; with nothing
    /// completed it returns an empty vector.
    pub fn drain_completed(&self) -> Vec<Batch> {
        self.completed.drain().collect()
    }

    /// Records currently in the in-progress buffer
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Configured records per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Lifetime counters
    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    /// Seal and enqueue full batches until the buffer holds fewer than
    /// `batch_size` records or the queue refuses; returns batches sealed
    fn swap_full_batches(&mut self) -> usize {
        let mut sealed = 0;
        while self.pending.len() >= self.batch_size {
            let rest = self.pending.split_off(self.batch_size);
            let full = mem::replace(&mut self.pending, rest);
            let batch = Batch::seal(full, self.clock.now());

            match self.completed.push(batch) {
                Ok(()) => {
                    self.stats.batches_completed += 1;
                    sealed += 1;
                }
                Err(batch) => {
                    // Queue full: put the records back in front and defer
                    // the swap to a later add or safety-flush
                    self.stats.deferred_swaps += 1;
                    log_warn!(
                        "completed queue full, deferring swap ({} records pending)",
                        self.pending.len() + self.batch_size
                    );
                    let mut records = batch.into_records();
                    records.append(&mut self.pending);
                    self.pending = records;
                    break;
                }
            }
        }
        sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DeviceId;
    use crate::time::{FixedTime, Timestamp};

    fn record(timestamp: Timestamp) -> UnifiedRecord {
        let mut r = UnifiedRecord::empty(timestamp, DeviceId::new("batch-test").unwrap());
        r.gyro = Some(crate::record::MotionVector::new(1.0, 2.0, 3.0));
        r
    }

    fn accumulator(batch_size: usize) -> (BatchAccumulator, Arc<FixedTime>) {
        let config = PipelineConfig::new(DeviceId::new("batch-test").unwrap())
            .with_cadence(1_000, batch_size);
        let clock = Arc::new(FixedTime::new(0));
        let acc = BatchAccumulator::new(&config, clock.clone()).unwrap();
        (acc, clock)
    }

    #[test]
    fn nth_add_seals_synchronously() {
        let (mut acc, _) = accumulator(3);

        acc.add(record(1));
        acc.add(record(2));
        assert!(acc.drain_completed().is_empty());
        assert_eq!(acc.pending_len(), 2);

        acc.add(record(3));
        let batches = acc.drain_completed();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn extra_records_stay_in_progress() {
        let (mut acc, _) = accumulator(3);
        for i in 0..5 {
            acc.add(record(i));
        }

        let batches = acc.drain_completed();
        assert_eq!(batches.len(), 1);
        assert_eq!(acc.pending_len(), 2);
    }

    #[test]
    fn drain_is_idempotent_when_empty() {
        let (mut acc, _) = accumulator(2);
        acc.add(record(1));
        acc.add(record(2));

        assert_eq!(acc.drain_completed().len(), 1);
        assert!(acc.drain_completed().is_empty());
    }

    #[test]
    fn batches_drain_in_fifo_order() {
        let (mut acc, _) = accumulator(2);
        for i in 0..6 {
            acc.add(record(i));
        }

        let batches = acc.drain_completed();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].records()[0].timestamp, 0);
        assert_eq!(batches[1].records()[0].timestamp, 2);
        assert_eq!(batches[2].records()[0].timestamp, 4);
    }

    #[test]
    fn sealing_stamps_the_clock() {
        let (mut acc, clock) = accumulator(2);
        clock.set(40_000);

        acc.add(record(1));
        acc.add(record(2));
        let batches = acc.drain_completed();
        assert_eq!(batches[0].completed_at(), 40_000);
    }

    #[test]
    fn safety_flush_is_a_steady_state_noop() {
        let (mut acc, _) = accumulator(3);
        acc.add(record(1));

        assert_eq!(acc.safety_flush(), 0);
        assert_eq!(acc.pending_len(), 1);
        assert_eq!(acc.stats().safety_flushes, 0);
    }

    #[test]
    fn full_queue_defers_and_retries() {
        // Batch size 1: every add seals a batch; slots - 1 fit in the ring
        let (mut acc, _) = accumulator(1);
        let usable = COMPLETED_QUEUE_SLOTS - 1;

        for i in 0..usable + 2 {
            acc.add(record(i as u64));
        }
        // The 8th and 9th adds both bounced off the full ring
        assert_eq!(acc.stats().deferred_swaps, 2);
        assert_eq!(acc.pending_len(), 2);

        // Nothing moves while the jam persists
        assert_eq!(acc.safety_flush(), 0);

        // Draining frees slots; the safety flush then clears the backlog
        assert_eq!(acc.drain_completed().len(), usable);
        assert_eq!(acc.safety_flush(), 2);
        assert_eq!(acc.drain_completed().len(), 2);
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn jam_drops_new_records_never_batches() {
        let (mut acc, _) = accumulator(1);
        let usable = COMPLETED_QUEUE_SLOTS - 1;
        let cap = PENDING_OVERFLOW_FACTOR; // batch_size 1

        // Fill the queue, then the pending cap, then beyond
        for i in 0..usable + cap + 3 {
            acc.add(record(i as u64));
        }
        assert_eq!(acc.stats().records_dropped, 3);
        assert_eq!(acc.pending_len(), cap);

        // Every sealed batch survived the jam
        assert_eq!(acc.drain_completed().len(), usable);
        assert_eq!(acc.safety_flush(), cap);
        assert_eq!(acc.drain_completed().len(), cap);
    }

    #[test]
    fn flush_partial_seals_the_tail() {
        let (mut acc, clock) = accumulator(30);
        for i in 0..5 {
            acc.add(record(i));
        }
        clock.set(7_000);

        assert_eq!(acc.flush_partial(), Ok(5));
        let batches = acc.drain_completed();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
        assert_eq!(batches[0].completed_at(), 7_000);
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn flush_partial_with_nothing_pending() {
        let (mut acc, _) = accumulator(10);
        assert_eq!(acc.flush_partial(), Ok(0));
    }

    #[test]
    fn flush_partial_reports_a_full_queue() {
        let (mut acc, _) = accumulator(1);
        for i in 0..COMPLETED_QUEUE_SLOTS {
            acc.add(record(i as u64));
        }
        assert_eq!(acc.pending_len(), 1);

        assert_eq!(
            acc.flush_partial(),
            Err(BatchError::QueueFull {
                capacity: COMPLETED_QUEUE_SLOTS,
            })
        );
        // The tail is still pending, not lost
        assert_eq!(acc.pending_len(), 1);
    }

    #[test]
    fn queue_push_pop_roundtrip() {
        let queue = CompletedQueue::<4>::new();
        assert!(queue.is_empty());

        queue
            .push(Batch::seal(alloc::vec![record(1)], 100))
            .unwrap();
        assert_eq!(queue.len(), 1);

        let batch = queue.pop().unwrap();
        assert_eq!(batch.completed_at(), 100);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn queue_hands_back_on_full() {
        let queue = CompletedQueue::<4>::new();
        for i in 0..3 {
            queue.push(Batch::seal(alloc::vec![record(i)], i)).unwrap();
        }
        assert!(queue.is_full());

        let bounced = queue.push(Batch::seal(alloc::vec![record(99)], 99));
        let batch = bounced.unwrap_err();
        assert_eq!(batch.records()[0].timestamp, 99);
        assert_eq!(queue.stats().deferred.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn queue_drain_iterates_fifo() {
        let queue = CompletedQueue::<8>::new();
        for i in 0..5 {
            queue.push(Batch::seal(alloc::vec![record(i)], i)).unwrap();
        }

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 5);
        assert_eq!(drained[0].completed_at(), 0);
        assert_eq!(drained[4].completed_at(), 4);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().max_depth.load(Ordering::Relaxed), 5);
    }
}
