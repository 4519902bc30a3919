//! Bounded-window integration tests.
//!
//! A task whose target hour is already in progress ticks once per
//! minute for the remainder of that clock hour, then falls back to its
//! daily cadence.

use cadence::testing::{CountingTrigger, ManualClock};
use cadence::{RecurrenceSpec, Scheduler};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::common::wait_for_fire_count;

#[tokio::test(start_paused = true)]
async fn hour_pattern_runs_window_then_daily_cadence() {
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap(),
    ));
    let scheduler = Scheduler::new().with_clock(Arc::clone(&clock) as _);
    let trigger = Arc::new(CountingTrigger::new());
    let spec = RecurrenceSpec::new().with_hour(10);

    let id = scheduler
        .schedule(spec, Arc::clone(&trigger) as _, None)
        .await
        .unwrap();

    // Scheduled an hour ahead of the target: no window yet.
    let handle = scheduler.registry().get(id).await.unwrap();
    assert_eq!(
        handle.next_at().await,
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    );
    assert_eq!(scheduler.lifetime_of(id).await.unwrap(), Duration::ZERO);

    // The 10:00 firing lands inside the target hour, so the re-arm
    // enters the every-minute window.
    clock.set(Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap());
    tokio::time::sleep(Duration::from_secs(3600)).await;
    wait_for_fire_count(&trigger, 1, Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        handle.next_at().await,
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 1, 0).unwrap()
    );
    assert_eq!(
        scheduler.lifetime_of(id).await.unwrap(),
        Duration::from_secs(58 * 60)
    );

    // One tick per minute through 10:59.
    for minute in 1..=59u32 {
        clock.set(Utc.with_ymd_and_hms(2025, 1, 15, 10, minute, 0).unwrap());
        tokio::time::sleep(Duration::from_secs(60)).await;
        wait_for_fire_count(&trigger, minute as usize + 1, Duration::from_secs(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(trigger.count(), 60);

    // Window exhausted: back to the daily cadence.
    assert_eq!(
        handle.next_at().await,
        Utc.with_ymd_and_hms(2025, 1, 16, 10, 0, 0).unwrap()
    );
    assert_eq!(scheduler.lifetime_of(id).await.unwrap(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn schedule_inside_target_hour_starts_windowed() {
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
    ));
    let scheduler = Scheduler::new().with_clock(Arc::clone(&clock) as _);
    let trigger = Arc::new(CountingTrigger::new());
    let spec = RecurrenceSpec::new().with_hour(10);

    let id = scheduler
        .schedule(spec, Arc::clone(&trigger) as _, None)
        .await
        .unwrap();

    let handle = scheduler.registry().get(id).await.unwrap();
    assert_eq!(
        handle.next_at().await,
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 31, 0).unwrap()
    );
    assert_eq!(
        scheduler.lifetime_of(id).await.unwrap(),
        Duration::from_secs(28 * 60)
    );

    clock.set(Utc.with_ymd_and_hms(2025, 1, 15, 10, 31, 0).unwrap());
    tokio::time::sleep(Duration::from_secs(60)).await;
    wait_for_fire_count(&trigger, 1, Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        scheduler.lifetime_of(id).await.unwrap(),
        Duration::from_secs(27 * 60)
    );
}

#[tokio::test(start_paused = true)]
async fn stop_cuts_a_window_short() {
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
    ));
    let scheduler = Scheduler::new().with_clock(Arc::clone(&clock) as _);
    let trigger = Arc::new(CountingTrigger::new());
    let spec = RecurrenceSpec::new().with_hour(10);

    let id = scheduler
        .schedule(spec, Arc::clone(&trigger) as _, None)
        .await
        .unwrap();

    clock.set(Utc.with_ymd_and_hms(2025, 1, 15, 10, 1, 0).unwrap());
    tokio::time::sleep(Duration::from_secs(60)).await;
    wait_for_fire_count(&trigger, 1, Duration::from_secs(5)).await;

    scheduler.stop(id).await.unwrap();

    clock.set(Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());
    tokio::time::sleep(Duration::from_secs(30 * 60)).await;

    assert_eq!(trigger.count(), 1);
}
