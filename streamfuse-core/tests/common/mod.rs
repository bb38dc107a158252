//! Shared fixtures for pipeline integration tests
//!
//! Deterministic value generators and pipeline constructors so every test
//! can recompute the exact reading a producer emitted at a given instant.

#![allow(dead_code)]

use std::sync::Arc;

use streamfuse_core::config::PipelineConfig;
use streamfuse_core::constants::{BARO_ALTITUDE_SCALE_M, BARO_PRESSURE_EXPONENT};
use streamfuse_core::pipeline::SamplingPipeline;
use streamfuse_core::record::DeviceId;
use streamfuse_core::time::{FixedTime, Timestamp};

/// Device identifier used across the integration suite
pub const TEST_DEVICE: &str = "integration-rig";

/// Pipeline at 1 Hz ticks with the given batch size, on a hand-driven clock
pub fn test_pipeline(batch_size: usize) -> (SamplingPipeline, Arc<FixedTime>) {
    let config = PipelineConfig::new(DeviceId::new(TEST_DEVICE).unwrap())
        .with_cadence(1_000, batch_size);
    let clock = Arc::new(FixedTime::new(0));
    let pipeline = SamplingPipeline::new(config, clock.clone()).unwrap();
    (pipeline, clock)
}

/// Deterministic angular-rate triple for the given instant
///
/// Small enough that the gyro never counts as motion evidence.
pub fn gyro_at(t: Timestamp) -> (f64, f64, f64) {
    let base = t as f64 * 1e-6;
    (base, base * 2.0, base * 3.0)
}

/// Deterministic acceleration triple: device resting flat
pub fn accel_at(_t: Timestamp) -> (f64, f64, f64) {
    (0.0, 0.2, 9.81)
}

/// Slow deterministic pressure drift, a fraction of a hPa over a session
pub fn pressure_at(t: Timestamp) -> f64 {
    1013.25 - t as f64 * 1e-5
}

/// Invert the barometric formula: the pressure that reads as `altitude_m`
/// against the standard atmosphere
pub fn pressure_for_altitude(altitude_m: f64) -> f64 {
    1013.25 * (1.0 - altitude_m / BARO_ALTITUDE_SCALE_M).powf(1.0 / BARO_PRESSURE_EXPONENT)
}
