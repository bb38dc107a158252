//! Altitude Fusion Filter
//!
//! ## Overview
//!
//! Smooths raw barometric altitude using motion evidence from the inertial
//! streams. The core question on every sample is: *did the device actually
//! move, or did the pressure just twitch?* Pressure sensors jump meters at a
//! time when a door opens or the weather shifts; the accelerometer and
//! gyroscope know whether the device was in motion when it happened.
//!
//! ## Algorithm
//!
//! Each update classifies the sample along two axes and applies the first
//! matching policy:
//!
//! | altitude jump? | motion evidence? | policy                                  |
//! |----------------|------------------|-----------------------------------------|
//! | yes            | yes              | accept raw outright                     |
//! | yes            | no               | damp: `filtered += delta * (1 - alpha)` |
//! | no             | any              | damp: `filtered += delta * (1 - alpha)` |
//!
//! where `delta = raw - last_raw`. A jump is `|delta|` above the jump threshold;
//! motion is vertical acceleration or angular rate magnitude above their
//! thresholds, with missing evidence counting as *no* motion. The damping
//! factor `alpha` trades inertia against responsiveness (higher = more inertia).
//!
//! Note the deliberate asymmetry: a jump with motion resets the filter to
//! the raw value, while a jump without motion is damped exactly like small
//! noise. The filter therefore never oscillates between policies; the
//! classification is re-derived from scratch on every sample.
//!
//! ## Example
//!
//! ```rust
//! use streamfuse_core::fusion::AltitudeFusionFilter;
//!
//! let mut filter = AltitudeFusionFilter::default();
//!
//! // First sample initializes the filter
//! assert_eq!(filter.update(100.0, None, None), 100.0);
//!
//! // A 3 m jump with no motion evidence is damped, not accepted
//! let damped = filter.update(103.0, Some(0.1), None);
//! assert!(damped > 100.0 && damped < 103.0);
//! ```

use crate::constants::{
    DEFAULT_ACCEL_THRESHOLD, DEFAULT_GYRO_THRESHOLD, DEFAULT_JUMP_THRESHOLD_M,
    DEFAULT_SMOOTHING_ALPHA,
};
use crate::errors::{ConfigError, ConfigResult};

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

/// Tuning thresholds for the altitude fusion filter
///
/// All fields are domain-tuned and deployment-specific; the defaults come
/// from handheld/vehicle field logs and suit barometers in the 1 to 10 Hz
/// class. Validate with [`AltitudeFusionConfig::validate`] before use.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AltitudeFusionConfig {
    /// Altitude change (meters) between consecutive raw samples that counts
    /// as a jump rather than noise
    pub jump_threshold_m: f64,

    /// Vertical acceleration magnitude (m/s²) above which the device counts
    /// as moving
    pub accel_threshold: f64,

    /// Angular rate magnitude (rad/s) above which the device counts as
    /// moving
    pub gyro_threshold: f64,

    /// Smoothing factor `alpha` in [0, 1]: damped updates apply
    /// `delta * (1 - alpha)`, so higher alpha means more inertia
    pub smoothing_alpha: f64,
}

impl Default for AltitudeFusionConfig {
    fn default() -> Self {
        Self {
            jump_threshold_m: DEFAULT_JUMP_THRESHOLD_M,
            accel_threshold: DEFAULT_ACCEL_THRESHOLD,
            gyro_threshold: DEFAULT_GYRO_THRESHOLD,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
        }
    }
}

impl AltitudeFusionConfig {
    /// Check that every threshold is finite and alpha lies in [0, 1]
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.jump_threshold_m.is_finite() {
            return Err(ConfigError::NonFiniteThreshold {
                name: "jump_threshold_m",
            });
        }
        if !self.accel_threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold {
                name: "accel_threshold",
            });
        }
        if !self.gyro_threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold {
                name: "gyro_threshold",
            });
        }
        if !(0.0..=1.0).contains(&self.smoothing_alpha) {
            return Err(ConfigError::InvalidAlpha {
                alpha: self.smoothing_alpha,
            });
        }
        Ok(())
    }
}

/// Internal filter state, advanced once per pressure sample
///
/// Owned by [`AltitudeFusionFilter`]; other components see only the filtered
/// output, never this state.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AltitudeFusionState {
    pub(crate) last_raw_altitude: f64,
    pub(crate) filtered_altitude: f64,
    pub(crate) last_vertical_accel: Option<f64>,
    pub(crate) last_angular_rate_magnitude: Option<f64>,
}

/// Advance the filter by one raw sample
///
/// Pure except for the warning log: takes the previous state (`None` before
/// the first sample) and returns the next state plus the filtered output.
/// A non-finite raw altitude leaves the state untouched and yields the last
/// good output (or the input itself when uninitialized).
pub(crate) fn step(
    config: &AltitudeFusionConfig,
    state: Option<AltitudeFusionState>,
    raw_altitude: f64,
    vertical_accel: Option<f64>,
    angular_rate_magnitude: Option<f64>,
) -> (Option<AltitudeFusionState>, f64) {
    if !raw_altitude.is_finite() {
        log_warn!("non-finite raw altitude {}, holding last output", raw_altitude);
        let held = match state {
            Some(s) => s.filtered_altitude,
            None => raw_altitude,
        };
        return (state, held);
    }

    let prev = match state {
        Some(s) => s,
        None => {
            let init = AltitudeFusionState {
                last_raw_altitude: raw_altitude,
                filtered_altitude: raw_altitude,
                last_vertical_accel: vertical_accel,
                last_angular_rate_magnitude: angular_rate_magnitude,
            };
            return (Some(init), raw_altitude);
        }
    };

    let delta = raw_altitude - prev.last_raw_altitude;

    // Missing or non-finite evidence counts as stationary
    let has_motion = matches!(vertical_accel, Some(a) if libm::fabs(a) > config.accel_threshold)
        || matches!(angular_rate_magnitude, Some(w) if w > config.gyro_threshold);
    let is_jump = libm::fabs(delta) > config.jump_threshold_m;

    let filtered = if is_jump && has_motion {
        // Real movement: trust the sensor
        raw_altitude
    } else {
        // Noise or drift: damp toward the raw value
        prev.filtered_altitude + delta * (1.0 - config.smoothing_alpha)
    };

    let next = AltitudeFusionState {
        last_raw_altitude: raw_altitude,
        filtered_altitude: filtered,
        last_vertical_accel: vertical_accel,
        last_angular_rate_magnitude: angular_rate_magnitude,
    };
    (Some(next), filtered)
}

/// Stateful altitude smoother fed by raw altitude plus motion evidence
///
/// See the [module documentation](self) for the policy table. State lives
/// for one logging session; call [`reset`](Self::reset) on session restart.
#[derive(Debug, Clone)]
pub struct AltitudeFusionFilter {
    config: AltitudeFusionConfig,
    state: Option<AltitudeFusionState>,
}

impl AltitudeFusionFilter {
    /// Create a filter with the given thresholds
    pub fn new(config: AltitudeFusionConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Feed one raw altitude sample and receive the filtered estimate
    ///
    /// `vertical_accel` and `angular_rate_magnitude` are the most recent
    /// motion evidence; pass `None` when the corresponding stream has not
    /// produced data. Missing evidence is treated as no motion.
    pub fn update(
        &mut self,
        raw_altitude: f64,
        vertical_accel: Option<f64>,
        angular_rate_magnitude: Option<f64>,
    ) -> f64 {
        let (state, filtered) = step(
            &self.config,
            self.state,
            raw_altitude,
            vertical_accel,
            angular_rate_magnitude,
        );
        self.state = state;
        filtered
    }

    /// Forget all state, as on session restart
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Most recent filtered output, or `None` before the first sample
    pub fn last_filtered(&self) -> Option<f64> {
        self.state.map(|s| s.filtered_altitude)
    }

    /// The thresholds this filter runs with
    pub fn config(&self) -> &AltitudeFusionConfig {
        &self.config
    }
}

impl Default for AltitudeFusionFilter {
    fn default() -> Self {
        Self::new(AltitudeFusionConfig::default())
    }
}


#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn output_finite_for_finite_input(
            raw0 in -500.0..9000.0f64,
            raw1 in -500.0..9000.0f64,
            accel in proptest::option::of(-30.0..30.0f64),
            gyro in proptest::option::of(0.0..20.0f64),
        ) {
            let mut filter = AltitudeFusionFilter::default();
            filter.update(raw0, None, None);
            let out = filter.update(raw1, accel, gyro);
            prop_assert!(out.is_finite());
        }

        #[test]
        fn stationary_output_stays_between_previous_and_raw(
            base in -500.0..9000.0f64,
            delta in -50.0..50.0f64,
        ) {
            prop_assume!(delta.abs() > 1e-6);
            let mut filter = AltitudeFusionFilter::default();
            filter.update(base, None, None);

            let out = filter.update(base + delta, None, None);
            let (lo, hi) = if delta > 0.0 {
                (base, base + delta)
            } else {
                (base + delta, base)
            };
            prop_assert!(out > lo && out < hi, "out {} outside ({}, {})", out, lo, hi);
        }

        #[test]
        fn moving_jump_accepted_exactly(
            base in -500.0..9000.0f64,
            jump in 2.5..500.0f64,
            accel in 0.6..30.0f64,
        ) {
            let mut filter = AltitudeFusionFilter::default();
            filter.update(base, None, None);

            let raw = base + jump;
            prop_assert_eq!(filter.update(raw, Some(accel), None), raw);
        }
    }
}
