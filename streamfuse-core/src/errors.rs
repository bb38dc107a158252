//! Error Types for Pipeline Configuration and Batch Hand-off
//!
//! The pipeline has deliberately few error paths. Malformed numeric input
//! (NaN/Inf readings) is recovered locally: the offending reading is
//! dropped with a warning and the last good value survives, so the hot
//! path never returns a `Result`. What remains:
//!
//! 1. **Configuration errors**: rejected once, at construction time, before
//!    any producer is running.
//! 2. **Batch queue exhaustion**: only surfaced by the explicit shutdown
//!    flush. The steady-state swap never drops a completed batch; it defers
//!    and retries instead (see `batcher`).
//!
//! Errors follow the same constraints as the rest of the core: `Copy`, no
//! heap, `&'static str` reasons only, so they stay cheap to return and to
//! store.

use thiserror_no_std::Error;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors - reported at construction, never at runtime
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Tick interval must be at least one millisecond
    #[error("tick interval must be non-zero")]
    ZeroTickInterval,

    /// Safety-flush interval must be at least one millisecond
    #[error("safety-flush interval must be non-zero")]
    ZeroSafetyFlushInterval,

    /// Batch size outside the supported range
    #[error("batch size {requested} outside 1..={max}")]
    BatchSizeOutOfRange {
        /// Requested records per batch
        requested: usize,
        /// Compile-time cap on records per batch
        max: usize,
    },

    /// Device identifier must not be empty
    #[error("device id must not be empty")]
    DeviceIdEmpty,

    /// Device identifier exceeds the inline storage cap
    #[error("device id length {len} exceeds {max} bytes")]
    DeviceIdTooLong {
        /// Byte length of the rejected identifier
        len: usize,
        /// Maximum inline length
        max: usize,
    },

    /// Smoothing factor must lie in [0, 1]
    #[error("smoothing factor {alpha} outside [0, 1]")]
    InvalidAlpha {
        /// The rejected factor
        alpha: f64,
    },

    /// Filter thresholds must be finite numbers
    #[error("filter threshold `{name}` is not finite")]
    NonFiniteThreshold {
        /// Which threshold was rejected
        name: &'static str,
    },

    /// No free observer slot left
    #[error("observer limit {max} reached")]
    ObserverLimit {
        /// Maximum number of observers
        max: usize,
    },

    /// Sea-level reference pressure must be finite and positive
    #[error("sea-level reference pressure {hpa} hPa must be finite and positive")]
    InvalidReferencePressure {
        /// The rejected reference pressure
        hpa: f64,
    },

    /// Max reading age, when enabled, must be at least one millisecond
    #[error("max reading age must be non-zero when set")]
    ZeroMaxReadingAge,

    /// Observers can only be registered before producers attach
    #[error("observers must be registered before any recorder is created")]
    ObserversSealed,
}

/// Batch hand-off errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BatchError {
    /// Completed-batch queue has no free slot
    ///
    /// Raised only by the explicit shutdown flush; the steady-state swap
    /// defers instead of erroring.
    #[error("completed-batch queue full ({capacity} slots)")]
    QueueFull {
        /// Number of slots in the queue
        capacity: usize,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::ZeroTickInterval => defmt::write!(fmt, "tick interval zero"),
            Self::ZeroSafetyFlushInterval => defmt::write!(fmt, "safety-flush interval zero"),
            Self::BatchSizeOutOfRange { requested, max } => {
                defmt::write!(fmt, "batch size {} outside 1..={}", requested, max)
            }
            Self::DeviceIdEmpty => defmt::write!(fmt, "device id empty"),
            Self::DeviceIdTooLong { len, max } => {
                defmt::write!(fmt, "device id length {} exceeds {}", len, max)
            }
            Self::InvalidAlpha { alpha } => defmt::write!(fmt, "alpha {} outside [0, 1]", alpha),
            Self::NonFiniteThreshold { name } => {
                defmt::write!(fmt, "threshold {} not finite", name)
            }
            Self::ObserverLimit { max } => defmt::write!(fmt, "observer limit {}", max),
            Self::InvalidReferencePressure { hpa } => {
                defmt::write!(fmt, "reference pressure {} invalid", hpa)
            }
            Self::ZeroMaxReadingAge => defmt::write!(fmt, "max reading age zero"),
            Self::ObserversSealed => defmt::write!(fmt, "observer registration sealed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BatchError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::QueueFull { capacity } => {
                defmt::write!(fmt, "completed queue full ({})", capacity)
            }
        }
    }
}
