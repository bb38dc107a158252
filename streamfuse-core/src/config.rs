//! Pipeline Configuration
//!
//! One plain-data struct carries every tunable the pipeline accepts: the
//! device identity, the tick/batch cadence, the altitude-filter thresholds,
//! and the optional hardening knobs (stale-value eviction, admission
//! gating). There are no environment globals and no hidden defaults pulled
//! at runtime: construct, adjust with the `with_*` methods, validate once,
//! then hand the config to the pipeline.
//!
//! ## Cadence
//!
//! The three timing knobs are related: one batch nominally spans
//! `tick_interval × batch_size` of wall-clock time, and the safety-flush
//! check runs at that same nominal batch duration. [`with_cadence`] keeps
//! the three consistent; set [`safety_flush_interval_ms`] afterwards only
//! when the deployment needs a different staleness bound.
//!
//! [`with_cadence`]: PipelineConfig::with_cadence
//! [`safety_flush_interval_ms`]: PipelineConfig::safety_flush_interval_ms
//!
//! ## Example
//!
//! ```rust
//! use streamfuse_core::config::PipelineConfig;
//! use streamfuse_core::record::DeviceId;
//!
//! let config = PipelineConfig::new(DeviceId::new("field-unit-7")?)
//!     .with_cadence(500, 60) // 2 Hz records, 30 s batches
//!     .with_max_reading_age_ms(Some(10_000));
//! config.validate()?;
//! # Ok::<(), streamfuse_core::errors::ConfigError>(())
//! ```

use crate::aggregator::AdmissionConfig;
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_SAFETY_FLUSH_INTERVAL_MS, DEFAULT_TICK_INTERVAL_MS,
    MAX_BATCH_SIZE, STANDARD_ATMOSPHERE_HPA,
};
use crate::errors::{ConfigError, ConfigResult};
use crate::fusion::AltitudeFusionConfig;
use crate::record::DeviceId;

/// Every tunable the pipeline accepts, as plain parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Identifier stamped into every unified record
    pub device_id: DeviceId,

    /// Fixed cadence (ms) at which stream snapshots become records
    pub tick_interval_ms: u64,

    /// Records per batch; a full batch is released synchronously on the
    /// record that fills it
    pub batch_size: usize,

    /// Interval (ms) of the defensive flush check; nominally one batch
    /// duration
    pub safety_flush_interval_ms: u64,

    /// Drop a stream's latest value from snapshots once it is older than
    /// this many milliseconds; `None` keeps values forever
    pub max_reading_age_ms: Option<u64>,

    /// Sea-level reference pressure (hPa) for the altitude conversion
    pub sea_level_hpa: f64,

    /// Altitude fusion thresholds
    pub altitude: AltitudeFusionConfig,

    /// Optional producer-side admission gates
    pub admission: AdmissionConfig,
}

impl PipelineConfig {
    /// Start from the defaults: 1 Hz ticks, 30-record batches, 30 s safety
    /// interval, no eviction, no admission gating
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            safety_flush_interval_ms: DEFAULT_SAFETY_FLUSH_INTERVAL_MS,
            max_reading_age_ms: None,
            sea_level_hpa: STANDARD_ATMOSPHERE_HPA,
            altitude: AltitudeFusionConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }

    /// Set tick interval and batch size together, deriving the safety-flush
    /// interval as one nominal batch duration
    pub fn with_cadence(mut self, tick_interval_ms: u64, batch_size: usize) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self.batch_size = batch_size;
        self.safety_flush_interval_ms = tick_interval_ms.saturating_mul(batch_size as u64);
        self
    }

    /// Override the safety-flush interval independently of the cadence
    pub fn with_safety_flush_interval_ms(mut self, interval_ms: u64) -> Self {
        self.safety_flush_interval_ms = interval_ms;
        self
    }

    /// Enable or disable stale-value eviction
    pub fn with_max_reading_age_ms(mut self, age_ms: Option<u64>) -> Self {
        self.max_reading_age_ms = age_ms;
        self
    }

    /// Set the sea-level reference pressure, e.g. a local QNH
    pub fn with_sea_level_hpa(mut self, hpa: f64) -> Self {
        self.sea_level_hpa = hpa;
        self
    }

    /// Replace the altitude fusion thresholds
    pub fn with_altitude(mut self, altitude: AltitudeFusionConfig) -> Self {
        self.altitude = altitude;
        self
    }

    /// Replace the admission gates
    pub fn with_admission(mut self, admission: AdmissionConfig) -> Self {
        self.admission = admission;
        self
    }

    /// Nominal wall-clock span of one batch, in milliseconds
    pub fn nominal_batch_duration_ms(&self) -> u64 {
        self.tick_interval_ms.saturating_mul(self.batch_size as u64)
    }

    /// Reject impossible cadences, out-of-range sizes, and non-finite
    /// thresholds before the pipeline starts
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.safety_flush_interval_ms == 0 {
            return Err(ConfigError::ZeroSafetyFlushInterval);
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::BatchSizeOutOfRange {
                requested: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.max_reading_age_ms == Some(0) {
            return Err(ConfigError::ZeroMaxReadingAge);
        }
        if !self.sea_level_hpa.is_finite() || self.sea_level_hpa <= 0.0 {
            return Err(ConfigError::InvalidReferencePressure {
                hpa: self.sea_level_hpa,
            });
        }
        self.altitude.validate()?;
        self.admission.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PipelineConfig {
        PipelineConfig::new(DeviceId::new("test-device").unwrap())
    }

    #[test]
    fn defaults_validate() {
        assert!(base().validate().is_ok());
        assert_eq!(base().nominal_batch_duration_ms(), 30_000);
    }

    #[test]
    fn cadence_derives_safety_interval() {
        let config = base().with_cadence(500, 60);
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.batch_size, 60);
        assert_eq!(config.safety_flush_interval_ms, 30_000);

        let overridden = config.with_safety_flush_interval_ms(5_000);
        assert_eq!(overridden.safety_flush_interval_ms, 5_000);
    }

    #[test]
    fn zero_intervals_rejected() {
        assert_eq!(
            base().with_cadence(0, 30).validate(),
            Err(ConfigError::ZeroTickInterval)
        );
        assert_eq!(
            base().with_safety_flush_interval_ms(0).validate(),
            Err(ConfigError::ZeroSafetyFlushInterval)
        );
        assert_eq!(
            base().with_max_reading_age_ms(Some(0)).validate(),
            Err(ConfigError::ZeroMaxReadingAge)
        );
    }

    #[test]
    fn batch_size_bounds() {
        assert_eq!(
            base().with_cadence(1_000, 0).validate(),
            Err(ConfigError::ZeroSafetyFlushInterval)
        );
        assert_eq!(
            base()
                .with_cadence(1_000, 0)
                .with_safety_flush_interval_ms(1_000)
                .validate(),
            Err(ConfigError::BatchSizeOutOfRange {
                requested: 0,
                max: MAX_BATCH_SIZE,
            })
        );
        assert_eq!(
            base().with_cadence(1_000, MAX_BATCH_SIZE + 1).validate(),
            Err(ConfigError::BatchSizeOutOfRange {
                requested: MAX_BATCH_SIZE + 1,
                max: MAX_BATCH_SIZE,
            })
        );
    }

    #[test]
    fn reference_pressure_bounds() {
        assert!(matches!(
            base().with_sea_level_hpa(f64::NAN).validate(),
            Err(ConfigError::InvalidReferencePressure { .. })
        ));
        assert_eq!(
            base().with_sea_level_hpa(-10.0).validate(),
            Err(ConfigError::InvalidReferencePressure { hpa: -10.0 })
        );
        assert!(base().with_sea_level_hpa(1020.7).validate().is_ok());
    }
}
