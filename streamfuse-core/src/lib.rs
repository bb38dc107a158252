//! Multi-rate sensor fusion, alignment, and batching pipeline
//!
//! Ingests asynchronous, independently-clocked streams of physical
//! measurements (angular rate, acceleration, barometric pressure,
//! position) and produces a single, regularly-spaced, schema-complete
//! time series released in fixed-size batches for transmission.
//!
//! Key constraints:
//! - Producers never block: every shared structure is lock-free
//! - No timer or thread ownership: all cadences are driven from outside
//! - A completed batch is never lost between sealing and hand-off
//! - `no_std` + `alloc` capable for embedded targets
//!
//! ```rust
//! use std::sync::Arc;
//! use streamfuse_core::{PipelineConfig, SamplingPipeline};
//! use streamfuse_core::record::DeviceId;
//! use streamfuse_core::time::SystemTime;
//!
//! # fn main() -> Result<(), streamfuse_core::ConfigError> {
//! let config = PipelineConfig::new(DeviceId::new("unit-1")?);
//! let mut pipeline = SamplingPipeline::new(config, Arc::new(SystemTime))?;
//!
//! // One cloneable handle per sensor context
//! let recorder = pipeline.recorder();
//! recorder.pressure(1013.25);
//! recorder.angular_rate(0.01, 0.02, 0.03);
//!
//! // Externally-driven cadence: tick, then drain completed batches
//! pipeline.tick(1_000);
//! let completed = pipeline.drain_completed(); // hand these to a transport
//! assert!(completed.is_empty()); // batch still in progress here
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod aggregator;
pub mod batcher;
pub mod cell;
pub mod config;
pub mod constants;
pub mod drainer;
pub mod errors;
pub mod fusion;
pub mod pipeline;
pub mod record;
pub mod time;

// Public API
pub use aggregator::{AdmissionConfig, AggregatorStats, ReadingObserver, StreamAggregator};
pub use batcher::{AccumulatorStats, BatchAccumulator, CompletedQueue};
pub use config::PipelineConfig;
pub use drainer::{BatchSink, DrainReport, UploadDrainer};
pub use errors::{BatchError, ConfigError, ConfigResult};
pub use fusion::{AltitudeFusionConfig, AltitudeFusionFilter};
pub use pipeline::{Recorder, SamplingPipeline};
pub use record::{Batch, DeviceId, Reading, UnifiedRecord};
pub use time::{TimeSource, Timestamp};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
