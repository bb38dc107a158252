//! Altitude Fusion Filter Constants
//!
//! Default thresholds for the jump/motion classification and the smoothing
//! factor of the altitude filter. All of them are starting points exposed
//! through `AltitudeFusionConfig`; deployments tune them per device class.

// ===== CLASSIFICATION THRESHOLDS =====

/// Altitude change between consecutive raw samples treated as a jump, in meters.
///
/// Consumer barometers drift by fractions of a meter between samples; a
/// 2 m step within one sample period is either a real elevation change or
/// a pressure transient (door slam, HVAC kick). The motion evidence decides
/// which.
///
/// Source: field tuning on handset barometer traces
pub const DEFAULT_JUMP_THRESHOLD_M: f64 = 2.0;

/// Vertical acceleration magnitude that counts as motion evidence, in m/s².
///
/// Compared against the gravity-compensated acceleration magnitude. Walking
/// produces 1-3 m/s² of residual; resting devices stay well below 0.3.
///
/// Source: field tuning on handset accelerometer traces
pub const DEFAULT_ACCEL_THRESHOLD: f64 = 0.5;

/// Angular rate magnitude that counts as motion evidence, in rad/s.
///
/// A device lying still reads gyro noise below 0.02 rad/s; handling it
/// exceeds 0.1 immediately.
///
/// Source: field tuning on handset gyroscope traces
pub const DEFAULT_GYRO_THRESHOLD: f64 = 0.1;

// ===== SMOOTHING =====

/// Exponential smoothing factor for damped altitude updates.
///
/// Each damped update moves the filtered altitude by `delta * (1 - alpha)`,
/// so higher alpha means more inertia. 0.7 keeps ~1 m of barometer noise
/// to ~0.3 m while following a stair climb within a few samples.
///
/// Source: field tuning; classic single-pole low-pass trade-off
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.7;
