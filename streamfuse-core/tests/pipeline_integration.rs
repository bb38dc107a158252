//! End-to-end pipeline flow: three producers, fixed ticks, one batch
//!
//! Drives the full aggregate→tick→batch path deterministically with a
//! hand-advanced clock and producers at three independent cadences, then
//! checks the sealed batch record by record.

mod common;

use common::{accel_at, gyro_at, pressure_at, test_pipeline, TEST_DEVICE};

#[test]
fn thirty_ticks_of_three_producers_seal_one_batch() {
    let (mut pipeline, clock) = test_pipeline(30);
    let recorder = pipeline.recorder();

    // Gyro at 10 Hz, accel at 4 Hz, pressure at 2 Hz, ticks at 1 Hz
    for t in (100..=30_000).step_by(100) {
        clock.set(t);
        recorder.angular_rate(gyro_at(t).0, gyro_at(t).1, gyro_at(t).2);
        if t % 250 == 0 {
            let (x, y, z) = accel_at(t);
            recorder.linear_acceleration(x, y, z);
        }
        if t % 500 == 0 {
            recorder.pressure(pressure_at(t));
        }
        if t % 1_000 == 0 {
            pipeline.tick(t);
        }
    }

    let batches = pipeline.drain_completed();
    assert_eq!(batches.len(), 1, "exactly one completed batch");
    let batch = &batches[0];
    assert_eq!(batch.len(), 30);
    assert_eq!(pipeline.batch_stats().batches_completed, 1);

    for (i, rec) in batch.records().iter().enumerate() {
        let tick_at = (i as u64 + 1) * 1_000;
        assert_eq!(rec.timestamp, tick_at, "records one second apart");
        assert_eq!(rec.device_id.as_str(), TEST_DEVICE);

        // Every producer emitted at this very instant, so the snapshot
        // must carry exactly that emission
        let (gx, gy, gz) = gyro_at(tick_at);
        let gyro = rec.gyro.expect("gyro populated");
        assert_eq!((gyro.x, gyro.y, gyro.z), (gx, gy, gz));

        let (ax, ay, az) = accel_at(tick_at);
        let accel = rec.accel.expect("accel populated");
        assert_eq!((accel.x, accel.y, accel.z), (ax, ay, az));

        let baro = rec.baro.expect("baro populated");
        assert_eq!(baro.pressure_hpa, pressure_at(tick_at));
        assert!(baro.altitude_m.is_finite());

        // Nothing ever produced position data
        assert!(rec.position.is_none());
    }

    // Nothing left over: the 30th tick sealed the batch synchronously
    assert!(pipeline.drain_completed().is_empty());
}

#[test]
fn silent_pressure_stream_stays_null_without_blocking_others() {
    let (mut pipeline, clock) = test_pipeline(10);
    let recorder = pipeline.recorder();

    for t in (100..=10_000).step_by(100) {
        clock.set(t);
        recorder.angular_rate(gyro_at(t).0, gyro_at(t).1, gyro_at(t).2);
        if t % 250 == 0 {
            let (x, y, z) = accel_at(t);
            recorder.linear_acceleration(x, y, z);
        }
        if t % 1_000 == 0 {
            pipeline.tick(t);
        }
    }

    let batches = pipeline.drain_completed();
    assert_eq!(batches.len(), 1);
    for rec in batches[0].records() {
        assert!(rec.baro.is_none(), "no pressure, no altitude");
        assert!(rec.gyro.is_some());
        assert!(rec.accel.is_some());
    }
}

#[test]
fn ticks_without_any_producer_never_reach_the_batcher() {
    let (mut pipeline, clock) = test_pipeline(5);

    for t in (1_000..=5_000).step_by(1_000) {
        clock.set(t);
        assert!(pipeline.tick(t).is_none());
    }
    assert!(pipeline.drain_completed().is_empty());
    assert_eq!(pipeline.batch_stats().records_added, 0);
    assert_eq!(pipeline.aggregator().stats().ticks_suppressed(), 5);
}

#[test]
fn safety_flush_stays_quiet_in_steady_state() {
    let (mut pipeline, clock) = test_pipeline(10);
    let recorder = pipeline.recorder();

    for t in (100..=25_000).step_by(100) {
        clock.set(t);
        recorder.angular_rate(gyro_at(t).0, gyro_at(t).1, gyro_at(t).2);
        if t % 1_000 == 0 {
            pipeline.tick(t);
        }
        // Nominal batch duration: every 10 s
        if t % 10_000 == 0 {
            assert_eq!(pipeline.safety_flush(), 0, "add() already sealed");
        }
    }

    // 25 ticks at batch size 10: two sealed batches, five in progress
    assert_eq!(pipeline.drain_completed().len(), 2);
    assert_eq!(pipeline.batch_stats().safety_flushes, 0);
}
