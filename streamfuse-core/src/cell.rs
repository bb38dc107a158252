//! Lock-Free Latest-Value Cells for Producer/Tick Hand-off
#![allow(unsafe_code)] // Required for the seqlock data window
//!
//! ## Overview
//!
//! Each physical stream owns one [`SampleCell`]: the producer overwrites it
//! at its native rate, the tick thread snapshots it at the aggregation
//! cadence. This is the only structure shared between producers and the
//! ticking thread, and neither side may ever block the other. A sensor
//! callback stalled behind a lock misses its next sample, and a tick stalled
//! behind four locks smears its snapshot in time.
//!
//! ## Why a Seqlock?
//!
//! The values are multi-word (an axis triple plus its arrival stamp), so a
//! single atomic cannot hold them, and per-axis atomics could tear: a
//! snapshot could pair a fresh X with a stale Z. The seqlock keeps writes
//! wait-free for the producer and gives readers torn-free snapshots by
//! retry:
//!
//! ```text
//! Writer (one per cell)            Reader (tick thread)
//!   seq += 1   (now odd)             s1 = seq; retry if odd or 0
//!   write value + stamp              copy value + stamp
//!   seq += 1   (now even)            s2 = seq; retry if s1 != s2
//! ```
//!
//! A reader that overlaps a write observes either an odd sequence or a
//! changed one, discards the torn copy, and retries. With producers at tens
//! of hertz and writes a few dozen nanoseconds long, a retry is rare and a
//! second retry is practically unobservable.
//!
//! ## Memory Ordering
//!
//! - Writer: the odd store is `Relaxed` but followed by a `Release` fence so
//!   the data writes cannot drift before it; the closing even store is
//!   `Release` so the data is visible before the new sequence.
//! - Reader: opening load is `Acquire`; an `Acquire` fence sits between the
//!   data copy and the confirming `Relaxed` load so the copy cannot drift
//!   after it.
//! - `seq == 0` doubles as the "never written" state, so readers never touch
//!   the uninitialized window.
//!
//! ## Safety Considerations
//!
//! 1. **Single writer per cell**: the odd/even protocol assumes one writer;
//!    two producers on one stream are a contract violation upstream and are
//!    caught by a debug assertion here. Results under violation are
//!    undefined (stale snapshots), never memory-unsafe reads of freed data.
//! 2. **`T: Copy`**: the reader copies the window while the writer may be
//!    mid-store; only plain-old-data survives that. The bound makes the
//!    requirement structural.
//! 3. **Volatile data access**: the window is read and written through raw
//!    pointers so no `&mut` aliases a concurrently-read location.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{fence, AtomicU32, Ordering};

use crate::time::Timestamp;

/// Lock-free cell holding one stream's latest sample and its arrival stamp
///
/// ## Example
///
/// ```rust
/// use streamfuse_core::cell::SampleCell;
///
/// static CELL: SampleCell<[f64; 3]> = SampleCell::new();
///
/// // Producer context
/// CELL.store([0.1, -0.2, 9.8], 1_000);
///
/// // Tick context
/// let (triple, stamp) = CELL.load().unwrap();
/// assert_eq!(stamp, 1_000);
/// assert_eq!(triple[2], 9.8);
/// ```
pub struct SampleCell<T: Copy> {
    /// Sequence counter: 0 = never written, odd = write in progress,
    /// even ≥ 2 = stable
    seq: AtomicU32,

    /// Data window: the sample and the timestamp it arrived at
    ///
    /// Guarded by `seq`; accessed only through raw pointers.
    data: UnsafeCell<MaybeUninit<(T, Timestamp)>>,
}

impl<T: Copy> SampleCell<T> {
    /// Create an empty cell
    ///
    /// Can be used in static context.
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Overwrite the cell with a new sample (single writer)
    ///
    /// Wait-free: never loops, never blocks the producer.
    pub fn store(&self, value: T, at: Timestamp) {
        let seq = self.seq.load(Ordering::Relaxed);
        debug_assert_eq!(seq & 1, 0, "second writer on a single-writer cell");

        // Mark the window unstable before touching it
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        // MaybeUninit is repr(transparent), so the window pointer can be
        // written through directly without forming a &mut
        unsafe {
            ptr::write(self.data.get() as *mut (T, Timestamp), (value, at));
        }

        // Publish: data writes ordered before the closing even store
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Snapshot the latest sample and its arrival stamp
    ///
    /// Returns `None` until the first `store`. Retries while a write is in
    /// flight; never blocks the writer.
    pub fn load(&self) -> Option<(T, Timestamp)> {
        loop {
            let seq1 = self.seq.load(Ordering::Acquire);
            if seq1 == 0 {
                return None;
            }
            if seq1 & 1 != 0 {
                core::hint::spin_loop();
                continue;
            }

            // Possibly-torn copy; valid only if the sequence holds below
            let copy = unsafe { ptr::read_volatile(self.data.get() as *const (T, Timestamp)) };

            fence(Ordering::Acquire);
            let seq2 = self.seq.load(Ordering::Relaxed);
            if seq1 == seq2 {
                return Some(copy);
            }
            core::hint::spin_loop();
        }
    }

    /// True once any sample has been stored
    pub fn is_set(&self) -> bool {
        self.seq.load(Ordering::Acquire) != 0
    }
}

impl<T: Copy> Default for SampleCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

// The cell synchronizes all access through `seq`; the data window is plain
// Copy data, so crossing threads is sound whenever T itself may.
unsafe impl<T: Copy + Send> Send for SampleCell<T> {}
unsafe impl<T: Copy + Send> Sync for SampleCell<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_loads_none() {
        let cell: SampleCell<f64> = SampleCell::new();
        assert!(cell.load().is_none());
        assert!(!cell.is_set());
    }

    #[test]
    fn store_then_load() {
        let cell = SampleCell::new();
        cell.store([1.0f64, 2.0, 3.0], 500);

        let (value, at) = cell.load().unwrap();
        assert_eq!(value, [1.0, 2.0, 3.0]);
        assert_eq!(at, 500);
        assert!(cell.is_set());
    }

    #[test]
    fn last_writer_wins() {
        let cell = SampleCell::new();
        cell.store(1.0f64, 100);
        cell.store(2.0, 200);
        cell.store(3.0, 300);

        assert_eq!(cell.load(), Some((3.0, 300)));
    }

    #[test]
    fn value_and_stamp_stay_paired() {
        let cell = SampleCell::new();
        for i in 0..1000u64 {
            cell.store(i as f64, i);
        }

        let (value, at) = cell.load().unwrap();
        assert_eq!(value as u64, at);
    }
}
