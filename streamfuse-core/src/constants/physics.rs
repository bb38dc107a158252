//! Physical Constants for Barometric Altitude
//!
//! Values for converting barometric pressure to altitude via the
//! international standard atmosphere (ISA) model. The conversion matches
//! what handset sensor stacks ship, so altitudes recorded by this pipeline
//! line up with data logged by the original mobile clients.

// ===== STANDARD ATMOSPHERE =====

/// Sea-level standard atmospheric pressure in hectopascals.
///
/// Reference pressure of the ISA model. Used as the default sea-level
/// reference when a deployment does not supply a local QNH value.
///
/// Source: ICAO standard atmosphere
pub const STANDARD_ATMOSPHERE_HPA: f64 = 1013.25;

/// Standard gravitational acceleration in m/s².
///
/// Subtracted from the acceleration vector magnitude to expose the
/// motion-induced component used as fusion evidence.
///
/// Source: CODATA standard value
pub const STANDARD_GRAVITY_MS2: f64 = 9.80665;

// ===== BAROMETRIC FORMULA =====

/// Scale height coefficient of the ISA barometric formula, in meters.
///
/// `altitude = 44330 * (1 - (p / p0)^0.1903)`, valid through the
/// troposphere and accurate to a few meters below 11 km.
///
/// Source: ISA barometric formula, troposphere layer
pub const BARO_ALTITUDE_SCALE_M: f64 = 44330.0;

/// Pressure-ratio exponent of the ISA barometric formula.
///
/// Equals `R * L / (g * M)` for the tropospheric lapse rate, commonly
/// written as `1 / 5.255`.
///
/// Source: ISA barometric formula, troposphere layer
pub const BARO_PRESSURE_EXPONENT: f64 = 0.1903;
