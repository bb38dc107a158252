//! Constants for the streamfuse pipeline
//!
//! Centralized, documented values used throughout the crate. Every tunable
//! default lives here with its rationale; runtime configuration
//! (`config::PipelineConfig`) starts from these and may override anything
//! that is not a compile-time capacity cap.
//!
//! Organization:
//! - **fusion**: altitude filter thresholds and smoothing defaults
//! - **physics**: barometric formula and gravity constants
//! - **cadence**: tick, batch, and flush timing defaults
//! - **buffers**: compile-time capacity caps

/// Altitude fusion filter thresholds and smoothing defaults.
pub mod fusion;

/// Physical constants for the barometric altitude conversion.
pub mod physics;

/// Timing defaults for ticks, batches, and safety flushes.
pub mod cadence;

/// Compile-time capacity caps for queues and inline storage.
pub mod buffers;

// Re-export commonly used constants for convenience
pub use fusion::{
    DEFAULT_ACCEL_THRESHOLD, DEFAULT_GYRO_THRESHOLD, DEFAULT_JUMP_THRESHOLD_M,
    DEFAULT_SMOOTHING_ALPHA,
};

pub use physics::{
    BARO_ALTITUDE_SCALE_M, BARO_PRESSURE_EXPONENT, STANDARD_ATMOSPHERE_HPA, STANDARD_GRAVITY_MS2,
};

pub use cadence::{
    DEFAULT_BATCH_SIZE, DEFAULT_SAFETY_FLUSH_INTERVAL_MS, DEFAULT_TICK_INTERVAL_MS, MS_PER_SECOND,
};

pub use buffers::{
    COMPLETED_QUEUE_SLOTS, MAX_BATCH_SIZE, MAX_DEVICE_ID_LEN, MAX_OBSERVERS,
    PENDING_OVERFLOW_FACTOR,
};
