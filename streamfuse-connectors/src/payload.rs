//! Upload Envelope Construction
//!
//! ## Overview
//!
//! Every transport in this crate ships the same JSON body: one envelope per
//! completed batch, carrying the device identity, a record count, and the
//! flat record objects the ingestion server inserts row-by-row. The record
//! shape is owned by `streamfuse-core`; this module only wraps it and stamps
//! each record with a human-readable `created_at`.
//!
//! ## Shape
//!
//! ```json
//! {"deviceId": "...", "count": 2, "data": [{...}, {...}]}
//! ```
//!
//! Field names are part of the server contract and pinned by tests. The
//! `created_at` string renders the record's tick timestamp in UTC; servers
//! that want the precise instant use the numeric `timestamp` field instead.

use serde::Serialize;
use streamfuse_core::record::{Batch, UnifiedRecord};
use streamfuse_core::time::Timestamp;

use crate::ConnectorError;

/// Wall-clock rendering attached to each uploaded record
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One record plus its rendered timestamp
#[derive(Serialize)]
struct StampedRecord<'a> {
    #[serde(flatten)]
    record: &'a UnifiedRecord,
    created_at: String,
}

/// Top-level upload body
#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    count: usize,
    data: Vec<StampedRecord<'a>>,
}

/// Renders a millisecond timestamp as UTC `YYYY-MM-DD HH:MM:SS`.
///
/// Timestamps outside chrono's representable range render as an empty
/// string rather than failing the whole upload.
pub fn created_at(timestamp: Timestamp) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|utc| utc.format(CREATED_AT_FORMAT).to_string())
        .unwrap_or_default()
}

/// Serializes one batch into the upload body.
///
/// Returns `Ok(None)` for a batch with no records; callers skip the
/// transport call entirely in that case.
pub fn upload_body(batch: &Batch) -> Result<Option<String>, ConnectorError> {
    let device_id = match batch.device_id() {
        Some(id) => id,
        None => return Ok(None),
    };

    let envelope = Envelope {
        device_id: device_id.as_str(),
        count: batch.len(),
        data: batch
            .records()
            .iter()
            .map(|record| StampedRecord {
                record,
                created_at: created_at(record.timestamp),
            })
            .collect(),
    };

    serde_json::to_string(&envelope)
        .map(Some)
        .map_err(|e| ConnectorError::Serialization(e.to_string()))
}
