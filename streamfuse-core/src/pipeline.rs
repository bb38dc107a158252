//! Pipeline Facade: Aggregation, Batching, and Producer Hand-out
//!
//! ## Overview
//!
//! [`SamplingPipeline`] wires the aggregator and the accumulator together
//! and splits the API by caller role:
//!
//! ```text
//! producers ──► Recorder::record ──► StreamAggregator
//!                                         │ tick(now)        scheduler
//! scheduler ──► SamplingPipeline::tick ───┴──► BatchAccumulator
//!                                                   │
//! drainer  ◄── completed_queue() ◄──────────────────┘
//! ```
//!
//! Producers get cheap cloneable [`Recorder`] handles; the scheduler owns
//! the pipeline itself and drives [`tick`](SamplingPipeline::tick) and
//! [`safety_flush`](SamplingPipeline::safety_flush); the drainer attaches
//! to the shared completed queue. The pipeline owns no timer and spawns no
//! thread; every cadence is driven from outside, which keeps the whole
//! thing deterministic under test.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use streamfuse_core::config::PipelineConfig;
//! use streamfuse_core::pipeline::SamplingPipeline;
//! use streamfuse_core::record::DeviceId;
//! use streamfuse_core::time::FixedTime;
//!
//! let config = PipelineConfig::new(DeviceId::new("demo")?).with_cadence(1_000, 2);
//! let clock = Arc::new(FixedTime::new(0));
//! let mut pipeline = SamplingPipeline::new(config, clock)?;
//!
//! let recorder = pipeline.recorder();
//! recorder.pressure(1013.25);
//! recorder.angular_rate(0.01, 0.02, 0.03);
//!
//! pipeline.tick(1_000);
//! pipeline.tick(2_000);
//! assert_eq!(pipeline.drain_completed().len(), 1);
//! # Ok::<(), streamfuse_core::errors::ConfigError>(())
//! ```

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::aggregator::{ReadingObserver, StreamAggregator};
use crate::batcher::{AccumulatorStats, BatchAccumulator, CompletedQueue};
use crate::config::PipelineConfig;
use crate::constants::COMPLETED_QUEUE_SLOTS;
use crate::errors::{BatchError, ConfigError, ConfigResult};
use crate::record::{Batch, DeviceId, MotionVector, PositionFix, Reading, UnifiedRecord};
use crate::time::{TimeSource, Timestamp};

/// Producer-side handle: clone one per sensor context
///
/// Recording never blocks and is safe from concurrent producers, one
/// producer per physical stream.
#[derive(Clone)]
pub struct Recorder {
    aggregator: Arc<StreamAggregator>,
}

impl Recorder {
    /// Absorb one reading into its stream
    pub fn record(&self, reading: Reading) {
        self.aggregator.record(reading);
    }

    /// Record an angular-rate triple (rad/s)
    pub fn angular_rate(&self, x: f64, y: f64, z: f64) {
        self.record(Reading::AngularRate(MotionVector::new(x, y, z)));
    }

    /// Record a linear-acceleration triple (m/s², gravity included)
    pub fn linear_acceleration(&self, x: f64, y: f64, z: f64) {
        self.record(Reading::LinearAcceleration(MotionVector::new(x, y, z)));
    }

    /// Record a barometric pressure sample (hPa)
    pub fn pressure(&self, hpa: f64) {
        self.record(Reading::Pressure { hpa });
    }

    /// Record a position fix (degrees, meters of accuracy)
    pub fn position(&self, latitude: f64, longitude: f64, accuracy: f64) {
        self.record(Reading::Position(PositionFix::new(
            latitude, longitude, accuracy,
        )));
    }
}

/// The assembled core: aggregator plus accumulator behind one surface
pub struct SamplingPipeline {
    aggregator: Arc<StreamAggregator>,
    accumulator: BatchAccumulator,
}

impl SamplingPipeline {
    /// Validate the configuration and assemble the pipeline
    pub fn new(config: PipelineConfig, clock: Arc<dyn TimeSource>) -> ConfigResult<Self> {
        let aggregator = Arc::new(StreamAggregator::new(&config, clock.clone())?);
        let accumulator = BatchAccumulator::new(&config, clock)?;
        Ok(Self {
            aggregator,
            accumulator,
        })
    }

    /// Register a live-value observer
    ///
    /// Only possible while no [`Recorder`] has been handed out; afterwards
    /// the registration window is sealed.
    pub fn add_observer(&mut self, observer: Box<dyn ReadingObserver>) -> ConfigResult<()> {
        match Arc::get_mut(&mut self.aggregator) {
            Some(aggregator) => aggregator.add_observer(observer),
            None => Err(ConfigError::ObserversSealed),
        }
    }

    /// Hand out a producer handle
    pub fn recorder(&self) -> Recorder {
        Recorder {
            aggregator: self.aggregator.clone(),
        }
    }

    /// Snapshot all streams and append the record to the in-progress batch
    ///
    /// Drive this at the configured tick interval. Returns a copy of the
    /// emitted record, or `None` when emission was suppressed.
    pub fn tick(&mut self, now: Timestamp) -> Option<UnifiedRecord> {
        let record = self.aggregator.tick(now)?;
        self.accumulator.add(record);
        Some(record)
    }

    /// Defensive flush check; drive at the nominal batch duration
    pub fn safety_flush(&mut self) -> usize {
        self.accumulator.safety_flush()
    }

    /// Seal the in-progress tail on shutdown; see
    /// [`BatchAccumulator::flush_partial`]
    pub fn flush_partial(&mut self) -> Result<usize, BatchError> {
        self.accumulator.flush_partial()
    }

    /// Remove and return all completed batches, oldest first
    pub fn drain_completed(&self) -> Vec<Batch> {
        self.accumulator.drain_completed()
    }

    /// Completed-batch queue handle for wiring an
    /// [`UploadDrainer`](crate::drainer::UploadDrainer)
    pub fn completed_queue(&self) -> Arc<CompletedQueue<COMPLETED_QUEUE_SLOTS>> {
        self.accumulator.completed_queue()
    }

    /// The aggregator, e.g. for its stats
    pub fn aggregator(&self) -> &StreamAggregator {
        &self.aggregator
    }

    /// Accumulator lifetime counters
    pub fn batch_stats(&self) -> AccumulatorStats {
        self.accumulator.stats()
    }

    /// Identifier stamped into emitted records
    pub fn device_id(&self) -> DeviceId {
        self.aggregator.device_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedTime;
    use core::sync::atomic::{AtomicU32, Ordering};

    fn pipeline(batch_size: usize) -> SamplingPipeline {
        let config = PipelineConfig::new(DeviceId::new("pipe-test").unwrap())
            .with_cadence(1_000, batch_size);
        SamplingPipeline::new(config, Arc::new(FixedTime::new(0))).unwrap()
    }

    #[test]
    fn tick_before_data_feeds_nothing() {
        let mut pipeline = pipeline(2);
        assert!(pipeline.tick(1_000).is_none());
        assert_eq!(pipeline.batch_stats().records_added, 0);
    }

    #[test]
    fn records_flow_from_recorder_to_batches() {
        let mut pipeline = pipeline(2);
        let recorder = pipeline.recorder();

        recorder.angular_rate(0.1, 0.2, 0.3);
        recorder.linear_acceleration(0.0, 0.0, 9.8);
        recorder.position(59.33, 18.07, 5.0);
        recorder.pressure(1013.25);

        let first = pipeline.tick(1_000).unwrap();
        assert!(first.gyro.is_some());
        assert!(first.accel.is_some());
        assert!(first.position.is_some());
        assert!(first.baro.is_some());

        pipeline.tick(2_000);
        let batches = pipeline.drain_completed();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn observer_registration_seals_at_first_recorder() {
        struct Probe(Arc<AtomicU32>);
        impl ReadingObserver for Probe {
            fn on_reading(&self, _: &Reading, _: Timestamp) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let seen = Arc::new(AtomicU32::new(0));
        let mut pipeline = pipeline(2);
        pipeline.add_observer(Box::new(Probe(seen.clone()))).unwrap();

        let recorder = pipeline.recorder();
        assert_eq!(
            pipeline.add_observer(Box::new(Probe(seen.clone()))),
            Err(ConfigError::ObserversSealed)
        );

        recorder.pressure(1000.0);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn shutdown_flush_seals_the_tail() {
        let mut pipeline = pipeline(30);
        let recorder = pipeline.recorder();

        recorder.angular_rate(1.0, 0.0, 0.0);
        for now in (1_000..=3_000).step_by(1_000) {
            pipeline.tick(now);
        }

        assert_eq!(pipeline.flush_partial(), Ok(3));
        let batches = pipeline.drain_completed();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }
}
