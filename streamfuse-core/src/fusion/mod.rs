//! Sensor Fusion for Derived Quantities
//!
//! ## Overview
//!
//! Barometric altitude is derived, not measured: the sensor reports pressure,
//! and the conversion amplifies every hPa of noise into meters of apparent
//! movement. Worse, pressure drifts with weather and HVAC transients, so a
//! stationary device can "climb" a staircase without moving. This module
//! fuses the derived altitude with auxiliary motion evidence from the
//! inertial streams to decide, jump by jump, whether a change is real.
//!
//! ## Architecture
//!
//! ```text
//! pressure ──► pressure_to_altitude ──► AltitudeFusionFilter ──► filtered
//!                                            ▲       ▲
//!                              vertical accel┘       └─angular rate
//!                               (magnitude evidence, both optional)
//! ```
//!
//! The filter is deliberately not a Kalman filter: the streams are too
//! loosely coupled for a shared state covariance to earn its tuning burden
//! at 1 Hz output. A threshold classifier with exponential damping matches
//! the actual failure modes (pressure spikes, slow drift) and stays
//! explainable in the field.

pub mod altitude;

pub use altitude::{AltitudeFusionConfig, AltitudeFusionFilter, AltitudeFusionState};
pub(crate) use altitude::step;

use crate::constants::{BARO_ALTITUDE_SCALE_M, BARO_PRESSURE_EXPONENT};

/// Convert barometric pressure to altitude via the international barometric
/// formula
///
/// `sea_level_hpa` is the reference pressure at zero altitude; pass
/// [`STANDARD_ATMOSPHERE_HPA`](crate::constants::STANDARD_ATMOSPHERE_HPA)
/// unless a local QNH is available.
///
/// ## Example
///
/// ```rust
/// use streamfuse_core::fusion::pressure_to_altitude;
/// use streamfuse_core::constants::STANDARD_ATMOSPHERE_HPA;
///
/// let at_sea_level = pressure_to_altitude(1013.25, STANDARD_ATMOSPHERE_HPA);
/// assert!(at_sea_level.abs() < 1e-9);
/// ```
pub fn pressure_to_altitude(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    BARO_ALTITUDE_SCALE_M * (1.0 - libm::pow(pressure_hpa / sea_level_hpa, BARO_PRESSURE_EXPONENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STANDARD_ATMOSPHERE_HPA;

    #[test]
    fn standard_pressure_is_zero_altitude() {
        let alt = pressure_to_altitude(STANDARD_ATMOSPHERE_HPA, STANDARD_ATMOSPHERE_HPA);
        assert!(alt.abs() < 1e-9);
    }

    #[test]
    fn lower_pressure_is_higher_altitude() {
        // 900 hPa sits near 988 m in the standard atmosphere
        let alt = pressure_to_altitude(900.0, STANDARD_ATMOSPHERE_HPA);
        assert!((alt - 988.6).abs() < 1.0, "got {alt}");

        // And above-reference pressure dips below zero
        let below = pressure_to_altitude(1030.0, STANDARD_ATMOSPHERE_HPA);
        assert!(below < 0.0);
    }
}
