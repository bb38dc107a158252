//! Upload Transport and Session Runtime for streamfuse
//!
//! ## Overview
//!
//! `streamfuse-core` stops at the completed-batch queue: it seals batches and
//! hands them to whatever [`BatchSink`](streamfuse_core::BatchSink) the host
//! provides. This crate supplies the reference sink (a plain HTTPS
//! uploader) and a tokio session runtime that drives the pipeline's three cadences
//! (tick, safety flush, drain) so a host binary only wires sensors to a
//! [`Recorder`](streamfuse_core::Recorder).
//!
//! Everything here assumes `std`. Embedded targets keep `streamfuse-core`
//! and bring their own transport.
//!
//! ## Upload Contract
//!
//! One POST per completed batch, JSON body:
//!
//! ```json
//! {
//!   "deviceId": "field-unit-7",
//!   "count": 30,
//!   "data": [
//!     {
//!       "timestamp": 1700000000000,
//!       "gyro_x": 0.01, "gyro_y": -0.02, "gyro_z": 0.0,
//!       "accel_x": 0.1, "accel_y": 0.2, "accel_z": 9.81,
//!       "latitude": null, "longitude": null, "accuracy": null,
//!       "pressure": 1013.05, "altitude": 1.65,
//!       "device_id": "field-unit-7", "type": "unified",
//!       "created_at": "2023-11-14 22:13:20"
//!     }
//!   ]
//! }
//! ```
//!
//! Streams that never produced a value serialize as `null` so the server
//! schema stays fixed. Empty batches are never posted.
//!
//! ## Why Plain HTTP
//!
//! The reference transport favors compatibility over efficiency:
//!
//! - Works through any firewall and proxy
//! - One request per batch keeps server handlers trivial
//! - Bearer/basic/API-key auth covers common ingestion services
//! - Retries with exponential backoff absorb transient outages
//!
//! A deployment that needs MQTT or CoAP framing implements
//! [`BatchSink`](streamfuse_core::BatchSink) over its own client and reuses
//! the session runtime unchanged.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use streamfuse_connectors::http::{HttpConfig, HttpUploader};
//! use streamfuse_connectors::runtime::{RunnerConfig, SessionRunner};
//! use streamfuse_core::config::PipelineConfig;
//! use streamfuse_core::pipeline::SamplingPipeline;
//! use streamfuse_core::record::DeviceId;
//! use streamfuse_core::time::SystemTime;
//!
//! # async fn session() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new(DeviceId::new("field-unit-7")?)
//!     .with_cadence(1_000, 30);
//! let clock = Arc::new(SystemTime);
//! let pipeline = SamplingPipeline::new(config.clone(), clock.clone())?;
//! let recorder = pipeline.recorder();
//!
//! let uploader = HttpUploader::new(
//!     HttpConfig::new("https://ingest.example.com/upload").bearer_token("secret"),
//! )?;
//! let runner = SessionRunner::spawn(
//!     pipeline,
//!     clock,
//!     uploader,
//!     RunnerConfig::from_pipeline(&config),
//! )?;
//!
//! // Producers feed the recorder from their own threads or tasks.
//! recorder.pressure(1013.05);
//!
//! let (summary, uploader) = runner.shutdown().await?;
//! println!(
//!     "shipped {} records in {} batches ({} bytes)",
//!     summary.records_dispatched,
//!     summary.batches_dispatched,
//!     uploader.stats().bytes_sent,
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod payload;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "runtime")]
pub mod runtime;

// Public API
#[cfg(feature = "http")]
pub use http::{AuthMethod, HttpConfig, HttpUploader};
#[cfg(feature = "runtime")]
pub use runtime::{RunnerConfig, SessionRunner, SessionSummary};

use thiserror::Error;

/// Errors shared by every connector in this crate
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid connector configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Request never produced an HTTP response
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("server error {code}: {body}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body, possibly truncated or empty
        body: String,
    },

    /// A background session task failed
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Transfer counters common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Batches delivered successfully
    pub batches_sent: u64,
    /// Batches given up on after exhausting retries
    pub batches_failed: u64,
    /// Payload bytes delivered successfully
    pub bytes_sent: u64,
    /// Individual retry attempts across all batches
    pub retries: u32,
    /// Most recent delivery error, if any
    pub last_error: Option<String>,
}
