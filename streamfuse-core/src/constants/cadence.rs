//! Timing Defaults
//!
//! Default cadences for ticking, batching, and the safety-net flush. The
//! pipeline never schedules itself; these defaults parameterize whatever
//! external driver calls `tick` and `safety_flush`.

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Default interval between aggregation ticks, in milliseconds.
///
/// One unified record per second balances upload volume against temporal
/// resolution for the target streams (2 Hz motion sensors, ~0.1 Hz GPS).
///
/// Source: original deployment cadence
pub const DEFAULT_TICK_INTERVAL_MS: u64 = MS_PER_SECOND;

/// Default number of unified records per batch.
///
/// With the 1 Hz default tick, one batch spans a 30-second wall-clock
/// window, keeping individual uploads small while bounding data loss on
/// device failure to half a minute.
///
/// Source: original deployment cadence
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// Default interval of the safety-net flush check, in milliseconds.
///
/// One nominal batch duration. In the steady state the size-triggered swap
/// fires first and the safety check is a no-op; it only matters when the
/// tick driver stalls mid-batch.
pub const DEFAULT_SAFETY_FLUSH_INTERVAL_MS: u64 =
    DEFAULT_TICK_INTERVAL_MS * DEFAULT_BATCH_SIZE as u64;
