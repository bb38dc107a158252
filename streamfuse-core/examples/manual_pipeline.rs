//! Hand-Driven Pipeline Walkthrough
//!
//! Drives a complete fusion/batching session with a manual clock: three
//! simulated producers at different rates, 1 Hz ticks, a safety-flush
//! check, and a final shutdown flush. No threads and no timers; every
//! cadence is a plain loop, which is exactly how the pipeline is meant to
//! be embedded and tested.
//!
//! ## What You'll See
//!
//! - Building a [`PipelineConfig`] and validating it once
//! - A live-value observer printing readings as they arrive
//! - Slow streams (position) repeating into every record
//! - A spurious pressure jump being damped by the fusion filter
//! - The exact-size batch release and the shutdown flush of the tail
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example manual_pipeline
//! ```

use std::sync::Arc;

use streamfuse_core::config::PipelineConfig;
use streamfuse_core::pipeline::SamplingPipeline;
use streamfuse_core::record::{DeviceId, Reading};
use streamfuse_core::time::{FixedTime, TimeSource, Timestamp};
use streamfuse_core::ReadingObserver;

/// Prints every accepted reading, the way a live display would consume it
struct ConsoleDisplay;

impl ReadingObserver for ConsoleDisplay {
    fn on_reading(&self, reading: &Reading, at: Timestamp) {
        println!("  [{at:>6} ms] {} updated", reading.stream().name());
    }
}

fn main() {
    println!("streamfuse manual pipeline walkthrough");
    println!("======================================\n");

    // 1 Hz records, 10-record batches => one batch per 10 s
    let config = PipelineConfig::new(DeviceId::new("walkthrough-unit").unwrap())
        .with_cadence(1_000, 10);
    println!(
        "cadence: tick {} ms, batch {} records, safety check {} ms\n",
        config.tick_interval_ms, config.batch_size, config.safety_flush_interval_ms
    );

    let clock = Arc::new(FixedTime::new(0));
    let mut pipeline = SamplingPipeline::new(config, clock.clone()).unwrap();
    pipeline.add_observer(Box::new(ConsoleDisplay)).unwrap();

    let recorder = pipeline.recorder();

    println!("-- 25 seconds of simulated producers --");
    for t in (100..=25_000u64).step_by(100) {
        clock.set(t);

        // Gyro at 10 Hz, accel at 4 Hz: a gently moving handheld
        recorder.angular_rate(0.02, -0.01, 0.03);
        if t % 250 == 0 {
            recorder.linear_acceleration(0.1, 0.2, 9.81);
        }

        // Barometer at 2 Hz, with one spurious spike at rest
        if t % 500 == 0 {
            let hpa = if t == 12_500 { 1011.0 } else { 1013.05 };
            recorder.pressure(hpa);
        }

        // GPS every 10 s: repeats into every record in between
        if t % 10_000 == 0 {
            recorder.position(59.3293, 18.0686, 5.0);
        }

        if t % 1_000 == 0 {
            if let Some(rec) = pipeline.tick(t) {
                let altitude = rec
                    .baro
                    .map(|b| b.altitude_m)
                    .unwrap_or(f64::NAN);
                println!(
                    "tick {:>6} ms -> record (altitude {:.2} m, position {})",
                    t,
                    altitude,
                    if rec.position.is_some() { "yes" } else { "no" }
                );
            }
        }
        if t % 10_000 == 0 {
            let sealed = pipeline.safety_flush();
            if sealed > 0 {
                println!("safety flush sealed {sealed} batch(es)");
            }
        }
    }

    println!("\n-- draining completed batches --");
    for batch in pipeline.drain_completed() {
        println!(
            "batch of {} records, sealed at {} ms, device {:?}",
            batch.len(),
            batch.completed_at(),
            batch.device_id().unwrap()
        );
    }

    println!("\n-- shutdown: flushing the in-progress tail --");
    clock.advance(1);
    match pipeline.flush_partial() {
        Ok(count) => println!("flushed {count} tail record(s)"),
        Err(err) => println!("tail kept pending: {err}"),
    }
    for batch in pipeline.drain_completed() {
        println!("final batch of {} records at {} ms", batch.len(), batch.completed_at());
    }

    let stats = pipeline.aggregator().stats();
    println!(
        "\nsession: {} ticks emitted, {} suppressed, clock now {} ms",
        stats.ticks_emitted(),
        stats.ticks_suppressed(),
        clock.now()
    );
}
