//! Data Model for Readings, Unified Records, and Batches
//!
//! ## Overview
//!
//! Three shapes move through the pipeline:
//!
//! 1. **[`Reading`]**: what one producer submits, a partial view carrying
//!    only the fields of its own physical stream. Ephemeral; consumed by the
//!    aggregator on arrival.
//! 2. **[`UnifiedRecord`]**: one tick's snapshot merging every stream's
//!    latest known value. Absent groups mean the stream has never reported
//!    (or aged out), never zero.
//! 3. **[`Batch`]**: a sealed, immutable run of unified records released to
//!    the transport as one unit.
//!
//! ## Memory Model
//!
//! Records are plain `Copy` data: the device identifier is stored inline
//! ([`DeviceId`]), and stream groups are small `Option` aggregates. Nothing
//! in a record touches the heap, so snapshots and batch swaps are memmoves.
//!
//! Grouping is deliberate: a record holds `Option<MotionVector>` rather than
//! three independently optional axes, so a torn gyro triple cannot be
//! represented, let alone serialized.
//!
//! ## Wire Shape
//!
//! The serialized form is flat, with field names pinned by the external
//! storage collaborators:
//!
//! ```text
//! timestamp                       int64 ms since epoch
//! gyro_x, gyro_y, gyro_z          float64 | null
//! accel_x, accel_y, accel_z       float64 | null
//! latitude, longitude, accuracy   float64 | null
//! pressure, altitude              float64 | null
//! device_id                       string
//! type                            string, always "unified"
//! ```
//!
//! Serialization is implemented by hand (rather than derived) precisely so
//! the grouped in-memory model and the flat wire model can differ.

use core::fmt;

use crate::constants::buffers::MAX_DEVICE_ID_LEN;
use crate::errors::ConfigError;
use crate::time::Timestamp;

extern crate alloc;
use alloc::vec::Vec;

/// Device identifier stored inline
///
/// Sized for `android-<uuid>` style identifiers. Unlike a plain truncating
/// inline string, construction validates: device identity on the wire must
/// never be silently cut short.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    len: u8,
    data: [u8; MAX_DEVICE_ID_LEN],
}

impl DeviceId {
    /// Create from a string slice, rejecting empty or oversized identifiers
    pub fn new(s: &str) -> Result<Self, ConfigError> {
        let bytes = s.as_bytes();
        if bytes.is_empty() {
            return Err(ConfigError::DeviceIdEmpty);
        }
        if bytes.len() > MAX_DEVICE_ID_LEN {
            return Err(ConfigError::DeviceIdTooLong {
                len: bytes.len(),
                max: MAX_DEVICE_ID_LEN,
            });
        }

        let mut data = [0u8; MAX_DEVICE_ID_LEN];
        data[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            len: bytes.len() as u8,
            data,
        })
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        // Only valid UTF-8 enters through new(), and slicing at the stored
        // length cannot split a code point it did not contain.
        core::str::from_utf8(&self.data[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for DeviceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for DeviceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = DeviceId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a device id of 1..={} bytes", MAX_DEVICE_ID_LEN)
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<DeviceId, E> {
                DeviceId::new(v).map_err(|_| {
                    E::invalid_length(v.len(), &self)
                })
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

/// Three-axis sample from a motion sensor (rad/s for gyro, m/s² for accel)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionVector {
    /// X axis component
    pub x: f64,
    /// Y axis component
    pub y: f64,
    /// Z axis component
    pub z: f64,
}

impl MotionVector {
    /// Construct from components
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean magnitude of the vector
    pub fn magnitude(&self) -> f64 {
        libm::sqrt(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// All components are ordinary numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Geodetic position with horizontal accuracy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
}

impl PositionFix {
    /// Construct from components
    pub const fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    /// All components are ordinary numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.accuracy.is_finite()
    }
}

/// Barometric sample: raw pressure plus the altitude derived from it
///
/// The altitude stored here has already been through the fusion filter;
/// raw derived altitude never leaves the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaroSample {
    /// Station pressure in hectopascals
    pub pressure_hpa: f64,
    /// Filtered altitude in meters
    pub altitude_m: f64,
}

/// Identifies a physical input stream
///
/// Used for logging, statistics, and observer notifications; the wire
/// format never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamKind {
    /// Angular rate stream (gyroscope)
    Gyro = 0,
    /// Linear acceleration stream (accelerometer)
    Accel = 1,
    /// Barometric pressure stream
    Baro = 2,
    /// Geodetic position stream (GNSS)
    Gps = 3,
}

impl StreamKind {
    /// Human-readable stream name
    pub const fn name(&self) -> &'static str {
        match self {
            StreamKind::Gyro => "gyro",
            StreamKind::Accel => "accel",
            StreamKind::Baro => "baro",
            StreamKind::Gps => "gps",
        }
    }
}

/// One producer's partial update
///
/// Carries only the fields of the producing stream; every other stream is
/// untouched by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Angular rate triple in rad/s
    AngularRate(MotionVector),
    /// Linear acceleration triple in m/s² (gravity included)
    LinearAcceleration(MotionVector),
    /// Station pressure in hectopascals
    Pressure {
        /// Measured pressure
        hpa: f64,
    },
    /// Position fix with accuracy
    Position(PositionFix),
}

impl Reading {
    /// Which stream this reading belongs to
    pub const fn stream(&self) -> StreamKind {
        match self {
            Reading::AngularRate(_) => StreamKind::Gyro,
            Reading::LinearAcceleration(_) => StreamKind::Accel,
            Reading::Pressure { .. } => StreamKind::Baro,
            Reading::Position(_) => StreamKind::Gps,
        }
    }

    /// Every component is an ordinary number
    pub fn is_finite(&self) -> bool {
        match self {
            Reading::AngularRate(v) | Reading::LinearAcceleration(v) => v.is_finite(),
            Reading::Pressure { hpa } => hpa.is_finite(),
            Reading::Position(fix) => fix.is_finite(),
        }
    }
}

/// Constant `type` discriminator on the wire
pub const RECORD_TYPE_UNIFIED: &str = "unified";

/// One tick's merged snapshot of all streams
///
/// `timestamp` is the tick time; groups are `None` for streams that have
/// never reported (or whose last report aged out). The aggregator never
/// emits a record with every group absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedRecord {
    /// Tick timestamp, ms since epoch
    pub timestamp: Timestamp,
    /// Latest angular rate triple
    pub gyro: Option<MotionVector>,
    /// Latest linear acceleration triple
    pub accel: Option<MotionVector>,
    /// Latest position fix
    pub position: Option<PositionFix>,
    /// Latest barometric sample (pressure + filtered altitude)
    pub baro: Option<BaroSample>,
    /// Identifier of the recording device
    pub device_id: DeviceId,
}

impl UnifiedRecord {
    /// Record with no stream data yet
    pub const fn empty(timestamp: Timestamp, device_id: DeviceId) -> Self {
        Self {
            timestamp,
            gyro: None,
            accel: None,
            position: None,
            baro: None,
            device_id,
        }
    }

    /// True when every stream group is absent
    ///
    /// Such a record is never emitted by the aggregator; the check exists
    /// for the suppression logic and for tests.
    pub fn is_empty(&self) -> bool {
        self.gyro.is_none() && self.accel.is_none() && self.position.is_none() && self.baro.is_none()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UnifiedRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("UnifiedRecord", 14)?;
        s.serialize_field("timestamp", &self.timestamp)?;
        s.serialize_field("gyro_x", &self.gyro.map(|v| v.x))?;
        s.serialize_field("gyro_y", &self.gyro.map(|v| v.y))?;
        s.serialize_field("gyro_z", &self.gyro.map(|v| v.z))?;
        s.serialize_field("accel_x", &self.accel.map(|v| v.x))?;
        s.serialize_field("accel_y", &self.accel.map(|v| v.y))?;
        s.serialize_field("accel_z", &self.accel.map(|v| v.z))?;
        s.serialize_field("latitude", &self.position.map(|p| p.latitude))?;
        s.serialize_field("longitude", &self.position.map(|p| p.longitude))?;
        s.serialize_field("accuracy", &self.position.map(|p| p.accuracy))?;
        s.serialize_field("pressure", &self.baro.map(|b| b.pressure_hpa))?;
        s.serialize_field("altitude", &self.baro.map(|b| b.altitude_m))?;
        s.serialize_field("device_id", &self.device_id)?;
        s.serialize_field("type", RECORD_TYPE_UNIFIED)?;
        s.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UnifiedRecord {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        /// Flat wire shape; groups are reassembled after parsing
        #[derive(serde::Deserialize)]
        struct Wire {
            timestamp: Timestamp,
            gyro_x: Option<f64>,
            gyro_y: Option<f64>,
            gyro_z: Option<f64>,
            accel_x: Option<f64>,
            accel_y: Option<f64>,
            accel_z: Option<f64>,
            latitude: Option<f64>,
            longitude: Option<f64>,
            accuracy: Option<f64>,
            pressure: Option<f64>,
            altitude: Option<f64>,
            device_id: DeviceId,
            #[serde(rename = "type", default)]
            kind: Option<alloc::string::String>,
        }

        fn group3(a: Option<f64>, b: Option<f64>, c: Option<f64>) -> Option<(f64, f64, f64)> {
            match (a, b, c) {
                (Some(a), Some(b), Some(c)) => Some((a, b, c)),
                _ => None,
            }
        }

        let w = Wire::deserialize(deserializer)?;
        if let Some(kind) = &w.kind {
            if kind != RECORD_TYPE_UNIFIED {
                return Err(serde::de::Error::custom("unknown record type"));
            }
        }

        Ok(Self {
            timestamp: w.timestamp,
            gyro: group3(w.gyro_x, w.gyro_y, w.gyro_z).map(|(x, y, z)| MotionVector::new(x, y, z)),
            accel: group3(w.accel_x, w.accel_y, w.accel_z)
                .map(|(x, y, z)| MotionVector::new(x, y, z)),
            position: group3(w.latitude, w.longitude, w.accuracy)
                .map(|(latitude, longitude, accuracy)| PositionFix::new(latitude, longitude, accuracy)),
            baro: match (w.pressure, w.altitude) {
                (Some(pressure_hpa), Some(altitude_m)) => Some(BaroSample {
                    pressure_hpa,
                    altitude_m,
                }),
                _ => None,
            },
            device_id: w.device_id,
        })
    }
}

/// An immutable, completed run of unified records
///
/// Sealed by the accumulator when the in-progress buffer reaches the target
/// size (or by the explicit shutdown flush, which may seal a short final
/// batch). Nothing can be appended afterwards; consumers take the records
/// out by value.
#[derive(Debug)]
pub struct Batch {
    records: Vec<UnifiedRecord>,
    completed_at: Timestamp,
}

impl Batch {
    /// Seal a batch. Accumulator-internal.
    pub(crate) fn seal(records: Vec<UnifiedRecord>, completed_at: Timestamp) -> Self {
        Self {
            records,
            completed_at,
        }
    }

    /// Records in emission order
    pub fn records(&self) -> &[UnifiedRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the batch holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamp of the moment the batch was sealed
    pub fn completed_at(&self) -> Timestamp {
        self.completed_at
    }

    /// Device identifier shared by the batch's records
    pub fn device_id(&self) -> Option<DeviceId> {
        self.records.first().map(|r| r.device_id)
    }

    /// Consume the batch, yielding its records
    pub fn into_records(self) -> Vec<UnifiedRecord> {
        self.records
    }
}
