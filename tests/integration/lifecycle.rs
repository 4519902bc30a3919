//! Scheduling lifecycle integration tests.
//!
//! Tests that follow a task from an accepted pattern through repeated
//! firings to cancellation, driving time with a manual clock and
//! tokio's paused timer.

use cadence::testing::{CountingTrigger, ManualClock};
use cadence::{RecurrenceSpec, Scheduler, SchedulerError, TaskState};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::common::wait_for_fire_count;

fn clock_at(h: u32, m: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap(),
    ))
}

#[tokio::test(start_paused = true)]
async fn every_minute_pattern_keeps_firing() {
    let clock = clock_at(9, 0);
    let scheduler = Scheduler::new().with_clock(Arc::clone(&clock) as _);
    let trigger = Arc::new(CountingTrigger::new());

    scheduler
        .schedule(RecurrenceSpec::new(), Arc::clone(&trigger) as _, None)
        .await
        .unwrap();

    for _ in 0..3 {
        clock.advance(chrono::Duration::minutes(1));
        tokio::time::sleep(Duration::from_secs(60)).await;
    }

    wait_for_fire_count(&trigger, 3, Duration::from_secs(5)).await;
    assert_eq!(trigger.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_day_of_month_rejected_at_schedule_time() {
    let scheduler = Scheduler::new().with_clock(clock_at(9, 0));
    let trigger = Arc::new(CountingTrigger::new());
    let spec = RecurrenceSpec::new().with_day_of_month(32);

    let err = scheduler
        .schedule(spec, trigger as _, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::InvalidSpec(_)));
    assert!(scheduler.registry().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn stop_suppresses_future_firings() {
    let clock = clock_at(9, 0);
    let scheduler = Scheduler::new().with_clock(Arc::clone(&clock) as _);
    let trigger = Arc::new(CountingTrigger::new());

    let id = scheduler
        .schedule(RecurrenceSpec::new(), Arc::clone(&trigger) as _, None)
        .await
        .unwrap();

    clock.advance(chrono::Duration::minutes(1));
    tokio::time::sleep(Duration::from_secs(60)).await;
    wait_for_fire_count(&trigger, 1, Duration::from_secs(5)).await;

    let handle = scheduler.registry().get(id).await.unwrap();
    scheduler.stop(id).await.unwrap();

    clock.advance(chrono::Duration::minutes(10));
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(trigger.count(), 1);
    assert_eq!(handle.state().await, TaskState::Stopped);
    assert!(scheduler.registry().get(id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_right_after_schedule_never_fires() {
    let scheduler = Scheduler::new().with_clock(clock_at(9, 0));
    let trigger = Arc::new(CountingTrigger::new());

    let id = scheduler
        .schedule(RecurrenceSpec::new(), Arc::clone(&trigger) as _, None)
        .await
        .unwrap();
    scheduler.stop(id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(trigger.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stopped_task_is_gone_from_every_surface() {
    let scheduler = Scheduler::new().with_clock(clock_at(9, 0));
    let trigger = Arc::new(CountingTrigger::new());

    let id = scheduler
        .schedule(RecurrenceSpec::new(), trigger as _, None)
        .await
        .unwrap();
    scheduler.stop(id).await.unwrap();

    assert!(matches!(
        scheduler.lifetime_of(id).await.unwrap_err(),
        SchedulerError::NotFound(missing) if missing == id
    ));
    assert!(matches!(
        scheduler.stop(id).await.unwrap_err(),
        SchedulerError::NotFound(missing) if missing == id
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_silences_all_tasks() {
    let clock = clock_at(9, 0);
    let scheduler = Scheduler::new().with_clock(Arc::clone(&clock) as _);
    let first = Arc::new(CountingTrigger::new());
    let second = Arc::new(CountingTrigger::new());

    scheduler
        .schedule(RecurrenceSpec::new(), Arc::clone(&first) as _, None)
        .await
        .unwrap();
    scheduler
        .schedule(
            RecurrenceSpec::new().with_minute(30),
            Arc::clone(&second) as _,
            None,
        )
        .await
        .unwrap();
    assert_eq!(scheduler.registry().len().await, 2);

    scheduler.shutdown().await;

    clock.advance(chrono::Duration::hours(2));
    tokio::time::sleep(Duration::from_secs(2 * 3600)).await;

    assert!(scheduler.registry().is_empty().await);
    assert_eq!(first.count(), 0);
    assert_eq!(second.count(), 0);
}
