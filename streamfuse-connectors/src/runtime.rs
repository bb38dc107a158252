//! Tokio Session Runtime
//!
//! ## Overview
//!
//! A [`SamplingPipeline`] needs three recurring calls: `tick` to seal
//! snapshots, `safety_flush` to catch a jammed swap, and a drain that feeds
//! completed batches to the sink. [`SessionRunner`] owns those cadences as
//! tokio tasks so the host binary only wires producers to a
//! [`Recorder`](streamfuse_core::Recorder) handle:
//!
//! ```text
//!  producer threads --> recorder.record() --> aggregator cells (lock-free)
//!
//!  tick task   ---------+
//!  safety task ---------+--> Mutex<SamplingPipeline> --> CompletedQueue
//!                                                             |
//!  drain task  --> spawn_blocking --> UploadDrainer --> BatchSink (blocking I/O)
//! ```
//!
//! Producers never touch the mutex; it serializes only the consumer-side
//! calls, which run at millisecond-to-second cadence. The sink runs inside
//! `spawn_blocking` because the reference transport does blocking I/O.
//!
//! ## Shutdown
//!
//! [`SessionRunner::shutdown`] signals a watch channel that wakes every task
//! mid-sleep, then sweeps the queue, optionally flushes the in-progress tail
//! (`flush_on_shutdown`), and sweeps once more so the tail ships in the same
//! call. The sink comes back to the caller for inspection.

use std::sync::Arc;
use std::time::Duration;

use streamfuse_core::config::PipelineConfig;
use streamfuse_core::drainer::{BatchSink, DrainReport, UploadDrainer};
use streamfuse_core::pipeline::SamplingPipeline;
use streamfuse_core::time::TimeSource;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::ConnectorError;

/// Cadence and shutdown policy for a [`SessionRunner`]
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Snapshot cadence, drives `SamplingPipeline::tick`
    pub tick_interval_ms: u64,
    /// Jam-recovery cadence, drives `SamplingPipeline::safety_flush`
    pub safety_flush_interval_ms: u64,
    /// Upload cadence, drives the queue drain
    pub drain_interval_ms: u64,
    /// Flush the in-progress tail batch during shutdown
    pub flush_on_shutdown: bool,
}

impl RunnerConfig {
    /// Cadences mirroring the pipeline's own configuration
    ///
    /// The drain interval defaults to the safety-flush interval: by then at
    /// least one batch is due, so draining more often buys nothing.
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            tick_interval_ms: config.tick_interval_ms,
            safety_flush_interval_ms: config.safety_flush_interval_ms,
            drain_interval_ms: config.safety_flush_interval_ms,
            flush_on_shutdown: true,
        }
    }

    /// Override the upload cadence
    pub fn with_drain_interval_ms(mut self, ms: u64) -> Self {
        self.drain_interval_ms = ms;
        self
    }

    /// Override the shutdown flush policy
    pub fn with_flush_on_shutdown(mut self, flush: bool) -> Self {
        self.flush_on_shutdown = flush;
        self
    }

    fn validate(&self) -> Result<(), ConnectorError> {
        if self.tick_interval_ms == 0
            || self.safety_flush_interval_ms == 0
            || self.drain_interval_ms == 0
        {
            return Err(ConnectorError::Config(
                "runner intervals must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Totals for one completed session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Batches delivered to the sink
    pub batches_dispatched: usize,
    /// Records delivered to the sink
    pub records_dispatched: usize,
    /// Batches the sink gave up on
    pub batches_failed: usize,
    /// Records moved out of the in-progress tail during shutdown
    pub tail_records_flushed: usize,
}

impl SessionSummary {
    /// Folds one drain report into the session totals
    fn absorb(&mut self, report: &DrainReport) {
        self.batches_dispatched += report.batches_dispatched;
        self.records_dispatched += report.records_dispatched;
        self.batches_failed += report.batches_failed;
    }
}

/// Sleeps `period`, returning `true` when shutdown was signalled meanwhile
async fn shutdown_or_elapsed(shutdown: &mut watch::Receiver<bool>, period: Duration) -> bool {
    // A closed channel also means stop: the runner handle is gone.
    tokio::time::timeout(period, shutdown.changed()).await.is_ok()
}

/// Runs one queue sweep on the blocking pool, handing the drainer back
async fn sweep<S>(
    mut drainer: UploadDrainer<S>,
) -> Result<(UploadDrainer<S>, DrainReport), ConnectorError>
where
    S: BatchSink + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let report = drainer.drain_and_dispatch();
        (drainer, report)
    })
    .await
    .map_err(|e| ConnectorError::Runtime(format!("drain worker panicked: {e}")))
}

/// Background driver for a pipeline's tick, safety-flush, and drain cadences
pub struct SessionRunner<S: BatchSink + Send + 'static> {
    shutdown_tx: watch::Sender<bool>,
    tick_task: JoinHandle<()>,
    safety_task: JoinHandle<()>,
    drain_task: JoinHandle<Result<(UploadDrainer<S>, SessionSummary), ConnectorError>>,
    pipeline: Arc<Mutex<SamplingPipeline>>,
    flush_on_shutdown: bool,
}

impl<S: BatchSink + Send + 'static> std::fmt::Debug for SessionRunner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("flush_on_shutdown", &self.flush_on_shutdown)
            .finish_non_exhaustive()
    }
}

impl<S> SessionRunner<S>
where
    S: BatchSink + Send + 'static,
{
    /// Starts the session tasks on the current tokio runtime.
    ///
    /// The pipeline moves into the runner; keep a
    /// [`Recorder`](streamfuse_core::Recorder) from before the call to feed
    /// it. `clock` must be the same time source the pipeline was built with,
    /// or tick timestamps will disagree with record timestamps.
    pub fn spawn(
        pipeline: SamplingPipeline,
        clock: Arc<dyn TimeSource>,
        sink: S,
        config: RunnerConfig,
    ) -> Result<Self, ConnectorError> {
        config.validate()?;

        let drainer = UploadDrainer::new(pipeline.completed_queue(), sink);
        let pipeline = Arc::new(Mutex::new(pipeline));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tick_task = {
            let pipeline = pipeline.clone();
            let mut shutdown = shutdown_rx.clone();
            let period = Duration::from_millis(config.tick_interval_ms);
            tokio::spawn(async move {
                loop {
                    if shutdown_or_elapsed(&mut shutdown, period).await {
                        break;
                    }
                    let now = clock.now();
                    pipeline.lock().await.tick(now);
                }
            })
        };

        let safety_task = {
            let pipeline = pipeline.clone();
            let mut shutdown = shutdown_rx.clone();
            let period = Duration::from_millis(config.safety_flush_interval_ms);
            tokio::spawn(async move {
                loop {
                    if shutdown_or_elapsed(&mut shutdown, period).await {
                        break;
                    }
                    let sealed = pipeline.lock().await.safety_flush();
                    if sealed > 0 {
                        log::info!("safety flush sealed {sealed} batch(es)");
                    }
                }
            })
        };

        let drain_task = {
            let mut shutdown = shutdown_rx;
            let period = Duration::from_millis(config.drain_interval_ms);
            tokio::spawn(async move {
                let mut drainer = drainer;
                let mut totals = SessionSummary::default();
                loop {
                    if shutdown_or_elapsed(&mut shutdown, period).await {
                        break;
                    }
                    let (back, report) = sweep(drainer).await?;
                    drainer = back;
                    totals.absorb(&report);
                    if report.batches_failed > 0 {
                        log::warn!("{} batch(es) failed to upload", report.batches_failed);
                    }
                }
                Ok((drainer, totals))
            })
        };

        Ok(Self {
            shutdown_tx,
            tick_task,
            safety_task,
            drain_task,
            pipeline,
            flush_on_shutdown: config.flush_on_shutdown,
        })
    }

    /// Stops the session and ships everything still queued.
    ///
    /// Order matters: the cadence tasks stop first, then a sweep empties the
    /// queue so the tail flush cannot hit a full queue, then the flushed
    /// tail ships in a last sweep.
    pub async fn shutdown(self) -> Result<(SessionSummary, S), ConnectorError> {
        let _ = self.shutdown_tx.send(true);

        let _ = self.tick_task.await;
        let _ = self.safety_task.await;
        let (drainer, mut summary) = match self.drain_task.await {
            Ok(result) => result?,
            Err(join_err) => {
                return Err(ConnectorError::Runtime(format!(
                    "drain task failed: {join_err}"
                )))
            }
        };

        let (mut drainer, report) = sweep(drainer).await?;
        summary.absorb(&report);

        if self.flush_on_shutdown {
            match self.pipeline.lock().await.flush_partial() {
                Ok(flushed) => summary.tail_records_flushed = flushed,
                Err(err) => log::error!("shutdown flush failed: {err}"),
            }
            let (back, report) = sweep(drainer).await?;
            drainer = back;
            summary.absorb(&report);
        }

        Ok((summary, drainer.into_sink()))
    }
}
