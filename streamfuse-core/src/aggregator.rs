//! Stream Aggregation and Tick Snapshots
//!
//! ## Overview
//!
//! Four physical streams arrive on their own clocks: inertial triples at
//! tens of hertz, pressure at a few hertz, position fixes every several
//! seconds. The [`StreamAggregator`] absorbs them all through
//! [`record`](StreamAggregator::record) and, on an externally-driven
//! [`tick`](StreamAggregator::tick), merges the latest known value of every
//! stream into one [`UnifiedRecord`]. A stream's latest value persists
//! across ticks until overwritten, so slow streams are deliberately
//! repeated into every record between their own updates.
//!
//! Pressure gets special treatment: the raw sample is converted to altitude
//! and pushed through the fusion filter together with the current motion
//! evidence, and only the *filtered* altitude is ever stored.
//!
//! ## Concurrency
//!
//! `record` is called concurrently from one producer context per physical
//! sensor and never blocks: each stream owns a [`SampleCell`] seqlock with
//! exactly one writer. `tick` runs on a single external scheduler thread
//! and only ever reads. The aggregator owns no timer and spawns nothing;
//! drive `tick` from a scheduler (or by hand in tests).
//!
//! Writes to different streams carry no ordering guarantee relative to each
//! other; writes to the *same* stream must come from a single producer in
//! delivery order. A second writer on one stream trips a debug assertion in
//! the cell.
//!
//! ## Observers
//!
//! Live-display consumers register a [`ReadingObserver`] before the
//! aggregator is shared; each accepted reading is delivered synchronously
//! in producer context. Observers must therefore be cheap and non-blocking.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::cell::SampleCell;
use crate::config::PipelineConfig;
use crate::constants::{MAX_OBSERVERS, STANDARD_GRAVITY_MS2};
use crate::errors::{ConfigError, ConfigResult};
use crate::fusion::{self, AltitudeFusionConfig, AltitudeFusionState};
use crate::record::{
    BaroSample, DeviceId, MotionVector, PositionFix, Reading, StreamKind, UnifiedRecord,
};
use crate::time::{TimeSource, Timestamp};

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

/// Producer-side admission gates, both off by default
///
/// These reproduce the field heuristics for cutting storage volume at the
/// source: a resting device produces megabytes of near-identical inertial
/// samples per hour that carry no information. Gating happens *before* the
/// stream cell is written, so a rejected sample is invisible to ticks and
/// observers alike.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdmissionConfig {
    /// Drop acceleration readings whose magnitude (gravity included) falls
    /// below this value; `None` admits everything
    pub motion_threshold: Option<f64>,

    /// Drop inertial readings whose every component is within this epsilon
    /// of the stream's current value; `None` admits everything
    pub duplicate_epsilon: Option<f64>,
}

impl AdmissionConfig {
    /// Check that enabled gates carry finite, non-negative thresholds
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(t) = self.motion_threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(ConfigError::NonFiniteThreshold {
                    name: "motion_threshold",
                });
            }
        }
        if let Some(e) = self.duplicate_epsilon {
            if !e.is_finite() || e < 0.0 {
                return Err(ConfigError::NonFiniteThreshold {
                    name: "duplicate_epsilon",
                });
            }
        }
        Ok(())
    }
}

/// Synchronous callback for each accepted reading
///
/// Replaces any globally-reachable "current display" registry: consumers
/// are injected into the aggregator and called in producer context, so
/// implementations must not block or allocate unboundedly.
pub trait ReadingObserver: Send + Sync {
    /// Called after the reading has been stored in its stream cell
    fn on_reading(&self, reading: &Reading, at: Timestamp);
}

/// Counters for accepted, rejected, and snapshotted data
///
/// All counters are relaxed atomics; read them individually, not as a
/// consistent snapshot.
#[derive(Debug, Default)]
pub struct AggregatorStats {
    angular_rate: AtomicU32,
    acceleration: AtomicU32,
    pressure: AtomicU32,
    position: AtomicU32,
    rejected_non_finite: AtomicU32,
    rejected_stationary: AtomicU32,
    rejected_duplicate: AtomicU32,
    ticks_emitted: AtomicU32,
    ticks_suppressed: AtomicU32,
    evicted_stale: AtomicU32,
}

impl AggregatorStats {
    const fn new() -> Self {
        Self {
            angular_rate: AtomicU32::new(0),
            acceleration: AtomicU32::new(0),
            pressure: AtomicU32::new(0),
            position: AtomicU32::new(0),
            rejected_non_finite: AtomicU32::new(0),
            rejected_stationary: AtomicU32::new(0),
            rejected_duplicate: AtomicU32::new(0),
            ticks_emitted: AtomicU32::new(0),
            ticks_suppressed: AtomicU32::new(0),
            evicted_stale: AtomicU32::new(0),
        }
    }

    fn count_accepted(&self, stream: StreamKind) {
        let counter = match stream {
            StreamKind::Gyro => &self.angular_rate,
            StreamKind::Accel => &self.acceleration,
            StreamKind::Baro => &self.pressure,
            StreamKind::Gps => &self.position,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Readings accepted into the given stream's cell
    pub fn accepted(&self, stream: StreamKind) -> u32 {
        let counter = match stream {
            StreamKind::Gyro => &self.angular_rate,
            StreamKind::Accel => &self.acceleration,
            StreamKind::Baro => &self.pressure,
            StreamKind::Gps => &self.position,
        };
        counter.load(Ordering::Relaxed)
    }

    /// Readings dropped for NaN/Inf components
    pub fn rejected_non_finite(&self) -> u32 {
        self.rejected_non_finite.load(Ordering::Relaxed)
    }

    /// Acceleration readings dropped by the motion gate
    pub fn rejected_stationary(&self) -> u32 {
        self.rejected_stationary.load(Ordering::Relaxed)
    }

    /// Inertial readings dropped by the duplicate gate
    pub fn rejected_duplicate(&self) -> u32 {
        self.rejected_duplicate.load(Ordering::Relaxed)
    }

    /// Ticks that produced a record
    pub fn ticks_emitted(&self) -> u32 {
        self.ticks_emitted.load(Ordering::Relaxed)
    }

    /// Ticks suppressed because every stream was empty or stale
    pub fn ticks_suppressed(&self) -> u32 {
        self.ticks_suppressed.load(Ordering::Relaxed)
    }

    /// Stream values dropped from a snapshot for exceeding the max age
    pub fn evicted_stale(&self) -> u32 {
        self.evicted_stale.load(Ordering::Relaxed)
    }
}

/// Merges the latest value of each stream into unified records on demand
///
/// See the [module documentation](self) for the concurrency contract.
pub struct StreamAggregator {
    device_id: DeviceId,
    clock: Arc<dyn TimeSource>,
    altitude_config: AltitudeFusionConfig,
    sea_level_hpa: f64,
    max_reading_age_ms: Option<u64>,
    admission: AdmissionConfig,

    gyro: SampleCell<MotionVector>,
    accel: SampleCell<MotionVector>,
    baro: SampleCell<BaroSample>,
    position: SampleCell<PositionFix>,

    /// Fusion state rides its own cell; the pressure producer is its only
    /// writer, same single-writer rule as the stream cells
    fusion: SampleCell<AltitudeFusionState>,

    /// High-water mark of emitted timestamps, for the monotonicity clamp
    last_tick: AtomicU64,

    observers: heapless::Vec<Box<dyn ReadingObserver>, MAX_OBSERVERS>,
    stats: AggregatorStats,
}

impl StreamAggregator {
    /// Build an aggregator from a validated configuration
    pub fn new(config: &PipelineConfig, clock: Arc<dyn TimeSource>) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            device_id: config.device_id,
            clock,
            altitude_config: config.altitude,
            sea_level_hpa: config.sea_level_hpa,
            max_reading_age_ms: config.max_reading_age_ms,
            admission: config.admission,
            gyro: SampleCell::new(),
            accel: SampleCell::new(),
            baro: SampleCell::new(),
            position: SampleCell::new(),
            fusion: SampleCell::new(),
            last_tick: AtomicU64::new(0),
            observers: heapless::Vec::new(),
            stats: AggregatorStats::new(),
        })
    }

    /// Register a live-value observer; call before sharing the aggregator
    pub fn add_observer(&mut self, observer: Box<dyn ReadingObserver>) -> ConfigResult<()> {
        self.observers
            .push(observer)
            .map_err(|_| ConfigError::ObserverLimit { max: MAX_OBSERVERS })
    }

    /// Identifier stamped into emitted records
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Counters for accepted/rejected readings and tick outcomes
    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    /// Absorb one reading; never blocks, safe from concurrent producers
    ///
    /// Non-finite readings are dropped with a warning. Accepted readings
    /// overwrite only their own stream and are delivered to observers
    /// before returning.
    pub fn record(&self, reading: Reading) {
        let now = self.clock.now();

        if !reading.is_finite() {
            self.stats.rejected_non_finite.fetch_add(1, Ordering::Relaxed);
            log_warn!("dropped non-finite {} reading", reading.stream().name());
            return;
        }

        match reading {
            Reading::AngularRate(v) => {
                if self.is_duplicate(&self.gyro, v) {
                    self.stats.rejected_duplicate.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                self.gyro.store(v, now);
            }
            Reading::LinearAcceleration(v) => {
                if self.is_stationary(v) {
                    self.stats.rejected_stationary.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                if self.is_duplicate(&self.accel, v) {
                    self.stats.rejected_duplicate.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                self.accel.store(v, now);
            }
            Reading::Pressure { hpa } => {
                let raw = fusion::pressure_to_altitude(hpa, self.sea_level_hpa);
                if !raw.is_finite() {
                    self.stats.rejected_non_finite.fetch_add(1, Ordering::Relaxed);
                    log_warn!("pressure {} hPa converts to non-finite altitude", hpa);
                    return;
                }
                let altitude_m = self.advance_fusion(raw, now);
                self.baro.store(
                    BaroSample {
                        pressure_hpa: hpa,
                        altitude_m,
                    },
                    now,
                );
            }
            Reading::Position(fix) => {
                self.position.store(fix, now);
            }
        }

        self.stats.count_accepted(reading.stream());
        self.notify(&reading, now);
    }

    /// Snapshot all streams into one record stamped with `now`
    ///
    /// Returns `None` until some stream has produced data, and again
    /// whenever eviction leaves every field absent; a record with all
    /// optionals absent is never constructed. Emitted timestamps are
    /// clamped monotonically non-decreasing per aggregator instance.
    pub fn tick(&self, now: Timestamp) -> Option<UnifiedRecord> {
        let prev = self.last_tick.fetch_max(now, Ordering::AcqRel);
        let stamped = prev.max(now);

        let record = UnifiedRecord {
            timestamp: stamped,
            gyro: self.fresh(self.gyro.load(), stamped),
            accel: self.fresh(self.accel.load(), stamped),
            position: self.fresh(self.position.load(), stamped),
            baro: self.fresh(self.baro.load(), stamped),
            device_id: self.device_id,
        };

        if record.is_empty() {
            self.stats.ticks_suppressed.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.stats.ticks_emitted.fetch_add(1, Ordering::Relaxed);
        Some(record)
    }

    /// Apply the max-age policy to one loaded cell value
    fn fresh<T: Copy>(&self, loaded: Option<(T, Timestamp)>, now: Timestamp) -> Option<T> {
        let (value, at) = loaded?;
        if let Some(max_age) = self.max_reading_age_ms {
            if now.saturating_sub(at) > max_age {
                self.stats.evicted_stale.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }
        Some(value)
    }

    /// Run the fusion filter for one raw altitude sample, in the pressure
    /// producer's context
    fn advance_fusion(&self, raw_altitude: f64, now: Timestamp) -> f64 {
        // The accelerometer reports gravity too; subtract it so stationary
        // reads as roughly zero vertical acceleration
        let vertical_accel = self
            .accel
            .load()
            .map(|(v, _)| v.magnitude() - STANDARD_GRAVITY_MS2);
        let angular_rate = self.gyro.load().map(|(v, _)| v.magnitude());

        let state = self.fusion.load().map(|(s, _)| s);
        let (next, filtered) = fusion::step(
            &self.altitude_config,
            state,
            raw_altitude,
            vertical_accel,
            angular_rate,
        );
        if let Some(next) = next {
            self.fusion.store(next, now);
        }
        filtered
    }

    fn is_stationary(&self, v: MotionVector) -> bool {
        match self.admission.motion_threshold {
            Some(threshold) => v.magnitude() < threshold,
            None => false,
        }
    }

    fn is_duplicate(&self, cell: &SampleCell<MotionVector>, v: MotionVector) -> bool {
        let eps = match self.admission.duplicate_epsilon {
            Some(eps) => eps,
            None => return false,
        };
        match cell.load() {
            Some((last, _)) => {
                libm::fabs(v.x - last.x) < eps
                    && libm::fabs(v.y - last.y) < eps
                    && libm::fabs(v.z - last.z) < eps
            }
            None => false,
        }
    }

    fn notify(&self, reading: &Reading, at: Timestamp) {
        for observer in self.observers.iter() {
            observer.on_reading(reading, at);
        }
    }
}
