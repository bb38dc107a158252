//! Draining Completed Batches into a Transport Sink
//!
//! The drainer is deliberately thin: pop every completed batch, hand each
//! one to the sink, report what happened. It holds only the shared
//! completed-batch queue, so it *cannot* touch the in-progress buffer, and
//! it never re-queues a failed batch: once a batch has been handed to the
//! sink, retry and backoff are the transport's concern, and the core's
//! delivery guarantee ends at that hand-off.
//!
//! [`BatchSink`] is the seam to the outside world: HTTP uploaders, disk
//! spools, and test doubles all implement it. Dispatch is synchronous from
//! the caller's context; callers that must not block schedule the drain on
//! a context of their own.

extern crate alloc;

use alloc::sync::Arc;

use core::fmt;

use crate::batcher::CompletedQueue;
use crate::constants::COMPLETED_QUEUE_SLOTS;
use crate::record::Batch;

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

/// Transport-side consumer of completed batches
///
/// Receives each batch by value: after a hand-off the transport owns the
/// data outright, which is what lets it retry on its own schedule without
/// the core keeping a copy.
pub trait BatchSink {
    /// Transport failure type, logged but never propagated by the drainer
    type Error: fmt::Display;

    /// Deliver one batch as a single logical unit
    fn dispatch(&mut self, batch: Batch) -> Result<(), Self::Error>;
}

/// Outcome of one [`UploadDrainer::drain_and_dispatch`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrainReport {
    /// Batches delivered to the sink successfully
    pub batches_dispatched: usize,
    /// Records inside the dispatched batches
    pub records_dispatched: usize,
    /// Batches the sink refused; consumed, not re-queued
    pub batches_failed: usize,
}

impl DrainReport {
    /// True when the drain found nothing to dispatch
    pub fn is_empty(&self) -> bool {
        self.batches_dispatched == 0 && self.batches_failed == 0
    }
}

/// Pulls completed batches off the shared queue and hands them to a sink
pub struct UploadDrainer<S: BatchSink> {
    queue: Arc<CompletedQueue<COMPLETED_QUEUE_SLOTS>>,
    sink: S,
}

impl<S: BatchSink> UploadDrainer<S> {
    /// Wire a drainer to an accumulator's completed queue
    ///
    /// Get the queue handle from
    /// [`BatchAccumulator::completed_queue`](crate::batcher::BatchAccumulator::completed_queue).
    pub fn new(queue: Arc<CompletedQueue<COMPLETED_QUEUE_SLOTS>>, sink: S) -> Self {
        Self { queue, sink }
    }

    /// Drain every completed batch, oldest first, into the sink
    ///
    /// Each batch is handed off at most once per drain; a sink failure is
    /// logged and counted, and the drain continues with the next batch.
    /// With nothing completed this is a cheap no-op.
    pub fn drain_and_dispatch(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(batch) = self.queue.pop() {
            if batch.is_empty() {
                // The accumulator never seals an empty batch; skip just in
                // case rather than bother the transport with one
                continue;
            }

            let records = batch.len();
            match self.sink.dispatch(batch) {
                Ok(()) => {
                    report.batches_dispatched += 1;
                    report.records_dispatched += records;
                }
                Err(err) => {
                    report.batches_failed += 1;
                    log_warn!("sink refused a batch of {} records: {}", records, err);
                }
            }
        }
        report
    }

    /// Access the sink, e.g. for transport statistics
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the drainer, returning the sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::BatchAccumulator;
    use crate::config::PipelineConfig;
    use crate::record::{DeviceId, MotionVector, UnifiedRecord};
    use crate::time::FixedTime;

    struct RecordingSink {
        delivered: alloc::vec::Vec<usize>,
        refuse_first: bool,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                delivered: alloc::vec::Vec::new(),
                refuse_first: false,
            }
        }
    }

    impl BatchSink for RecordingSink {
        type Error = &'static str;

        fn dispatch(&mut self, batch: Batch) -> Result<(), Self::Error> {
            if self.refuse_first {
                self.refuse_first = false;
                return Err("connection refused");
            }
            self.delivered.push(batch.len());
            Ok(())
        }
    }

    fn record(timestamp: u64) -> UnifiedRecord {
        let mut r = UnifiedRecord::empty(timestamp, DeviceId::new("drain-test").unwrap());
        r.accel = Some(MotionVector::new(0.0, 0.0, 9.8));
        r
    }

    fn accumulator(batch_size: usize) -> BatchAccumulator {
        let config = PipelineConfig::new(DeviceId::new("drain-test").unwrap())
            .with_cadence(1_000, batch_size);
        BatchAccumulator::new(&config, Arc::new(FixedTime::new(0))).unwrap()
    }

    #[test]
    fn dispatches_all_completed_batches() {
        let mut acc = accumulator(2);
        for i in 0..4 {
            acc.add(record(i));
        }

        let mut drainer = UploadDrainer::new(acc.completed_queue(), RecordingSink::new());
        let report = drainer.drain_and_dispatch();

        assert_eq!(report.batches_dispatched, 2);
        assert_eq!(report.records_dispatched, 4);
        assert_eq!(report.batches_failed, 0);
        assert_eq!(drainer.sink().delivered, [2, 2]);
    }

    #[test]
    fn empty_queue_is_a_noop() {
        let acc = accumulator(2);
        let mut drainer = UploadDrainer::new(acc.completed_queue(), RecordingSink::new());

        let report = drainer.drain_and_dispatch();
        assert!(report.is_empty());
        assert!(drainer.sink().delivered.is_empty());
    }

    #[test]
    fn in_progress_records_are_never_drained() {
        let mut acc = accumulator(3);
        acc.add(record(1));
        acc.add(record(2));

        let mut drainer = UploadDrainer::new(acc.completed_queue(), RecordingSink::new());
        assert!(drainer.drain_and_dispatch().is_empty());
        assert_eq!(acc.pending_len(), 2);
    }

    #[test]
    fn failed_batches_are_not_requeued() {
        let mut acc = accumulator(1);
        acc.add(record(1));
        acc.add(record(2));

        let mut sink = RecordingSink::new();
        sink.refuse_first = true;
        let mut drainer = UploadDrainer::new(acc.completed_queue(), sink);

        let report = drainer.drain_and_dispatch();
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.batches_dispatched, 1);

        // The refused batch is gone; a second drain finds nothing
        assert!(drainer.drain_and_dispatch().is_empty());
    }
}
