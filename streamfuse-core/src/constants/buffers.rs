//! Capacity Caps
//!
//! Compile-time bounds on runtime-configurable sizes. Runtime configuration
//! may pick any value up to these caps; the caps themselves size inline
//! arrays and the lock-free ring, so changing them is an ABI-affecting
//! decision, not a tuning knob.

/// Maximum configurable records per batch.
///
/// Bounds `PipelineConfig::batch_size`. At the default 1 Hz tick this is a
/// four-minute batch window, far beyond any sensible upload cadence.
pub const MAX_BATCH_SIZE: usize = 256;

/// Slots in the completed-batch ring (must be a power of two).
///
/// One slot stays empty to distinguish full from empty, so 7 batches can be
/// pending at once. With default cadence that is 3.5 minutes of drainer
/// outage before the accumulator starts deferring swaps.
pub const COMPLETED_QUEUE_SLOTS: usize = 8;

/// Growth factor for the in-progress buffer when the completed ring is full.
///
/// A due swap that finds no free slot leaves records accumulating
/// in-progress up to `batch_size * PENDING_OVERFLOW_FACTOR`; beyond that,
/// new records are dropped and counted rather than unbounding memory.
pub const PENDING_OVERFLOW_FACTOR: usize = 2;

/// Maximum byte length of a device identifier.
///
/// Sized for `android-<uuid>` style identifiers (44 bytes) with headroom,
/// stored inline so records stay heap-free.
pub const MAX_DEVICE_ID_LEN: usize = 47;

/// Maximum number of observers on one aggregator.
pub const MAX_OBSERVERS: usize = 4;
