//! Integration tests for the capture → classify/belt → bucket cycle.
//!
//! The controller runs against recording pins, a recording servo, a
//! scripted camera and a scripted classifier peer, all writing to one
//! timeline.

use std::time::Duration;

use futures_lite::future;

use sorter::app::events::SortEvent;
use sorter::app::service::SortController;
use sorter::classes::ClassLabel;
use sorter::error::{CaptureError, ConfigError, Error, LinkError};
use sorter::fsm::SortState;

use super::mock_hw::*;

type Rig = SortController<ScriptedCamera, RecordingPin, RecordingServo, ScriptedPeer>;

fn rig(camera: ScriptedCamera, replies: Vec<Reply>, timeline: &Timeline) -> Rig {
    let mut c = SortController::from_config(
        &test_config(),
        camera,
        belt_pins(timeline),
        RecordingServo::new(timeline),
        ScriptedPeer::new(timeline, replies),
    );
    c.start(&mut RecordingSink::default());
    c
}

// ── End to end ────────────────────────────────────────────────

#[test]
fn label_two_drives_one_belt_sequence_then_one_servo_command() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::label(2)], &tl);
    let mut sink = RecordingSink::default();

    let report = future::block_on(c.run_cycle(&mut sink)).unwrap();
    let finished = tl.now();

    assert_eq!(report.label, ClassLabel(2));
    assert_eq!(report.bucket.angle_deg, 45);
    assert_eq!(report.bucket.pulse.as_micros(), 1000);
    assert_eq!(report.steps, STEPS);
    assert_eq!(report.cycle, 1);

    // One phase energised per step, then everything released.
    assert_eq!(tl.count(is_pin_high), STEPS as usize);
    assert_eq!(tl.pin_levels(), [false; 4]);

    // Exactly one servo command, after the belt is done.
    assert_eq!(tl.servo_duties(), vec![1000]);
    let servo_at = tl.first(is_servo).unwrap();
    assert!(tl.last(is_pin_write).unwrap() <= servo_at);

    // Rotation blocks for the settle time.
    assert!(finished - servo_at >= Duration::from_millis(SETTLE_MS));
    assert_eq!(c.state(), SortState::Idle);
}

#[test]
fn classify_request_carries_public_reference() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::label(1)], &tl);
    future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap();
    assert_eq!(
        c.link().transport().classify_requests(),
        vec![(1, "/currentBlock.jpg".to_string())]
    );
}

#[test]
fn states_are_visited_in_order() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::label(5)], &tl);
    let mut sink = RecordingSink::default();
    future::block_on(c.run_cycle(&mut sink)).unwrap();

    let moves: Vec<(SortState, SortState)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            SortEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        moves,
        vec![
            (SortState::Idle, SortState::Capturing),
            (SortState::Capturing, SortState::AwaitingResult),
            (SortState::AwaitingResult, SortState::Rotating),
            (SortState::Rotating, SortState::Idle),
        ]
    );
    assert!(sink.events.contains(&SortEvent::Classified {
        label: ClassLabel(5),
        name: Some("gears".into())
    }));
    assert!(sink.events.contains(&SortEvent::CycleCompleted { cycle: 1 }));
}

// ── Overlap of belt and classification ────────────────────────

#[test]
fn slow_classifier_delays_rotation_but_not_belt() {
    let latency = Duration::from_millis(250);
    let tl = Timeline::new();
    let mut c = rig(
        ScriptedCamera::always(&tl),
        vec![Reply::label_after(2, latency)],
        &tl,
    );

    future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap();

    let sent = tl.first(is_classify).unwrap();
    let belt_start = tl.first(is_pin_high).unwrap();
    let belt_end = tl.last(is_pin_write).unwrap();
    let delivered = tl.first(|c| *c == HwCall::ResultDelivered).unwrap();
    let servo_at = tl.first(is_servo).unwrap();

    // Request goes out first and the belt starts right after it.
    assert!(sent <= belt_start);
    assert!(belt_start - sent < Duration::from_millis(PHASE_HOLD_MS * 2));
    // The belt finished long before the answer arrived.
    assert!(belt_end < delivered);
    // Rotation waited for the answer.
    assert!(servo_at >= delivered);
    assert!(servo_at - sent >= latency);
}

#[test]
fn fast_classifier_still_waits_for_belt() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::label(1)], &tl);
    future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap();

    let delivered = tl.first(|c| *c == HwCall::ResultDelivered).unwrap();
    let belt_end = tl.last(is_pin_write).unwrap();
    let servo_at = tl.first(is_servo).unwrap();
    assert!(delivered < belt_end, "answer should beat the belt");
    assert!(servo_at >= belt_end);
    assert_eq!(tl.servo_duties(), vec![500]);
}

// ── Failure paths ─────────────────────────────────────────────

#[test]
fn absent_capture_aborts_before_belt_and_bucket() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::scripted(&tl, &[false]), vec![], &tl);
    let mut sink = RecordingSink::default();

    let err = future::block_on(c.run_cycle(&mut sink)).unwrap_err();

    assert_eq!(err, Error::Capture(CaptureError::NoImageCaptured));
    assert_eq!(tl.count(is_pin_high), 0);
    assert_eq!(tl.count(is_servo), 0);
    assert_eq!(tl.count(is_classify), 0);
    assert_eq!(c.state(), SortState::Idle);
    assert!(sink.aborted());
}

#[test]
fn label_missing_from_table_is_fatal_before_servo() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::label(3)], &tl);
    let err = future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap_err();
    assert_eq!(err, Error::Config(ConfigError::UnknownLabel(ClassLabel(3))));
    assert_eq!(tl.count(is_servo), 0);
    assert_eq!(c.state(), SortState::Idle);
}

#[test]
fn peer_disconnect_aborts_cycle_with_belt_released() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::Disconnect], &tl);
    let err = future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap_err();
    assert_eq!(err, Error::Link(LinkError::Disconnected));
    assert_eq!(tl.pin_levels(), [false; 4]);
    assert_eq!(tl.count(is_servo), 0);
    assert_eq!(c.link().outstanding(), None);
}

#[test]
fn silent_classifier_hangs_the_cycle() {
    let tl = Timeline::new();
    let mut c = rig(ScriptedCamera::always(&tl), vec![Reply::silent()], &tl);
    let mut sink = RecordingSink::default();

    let finished = future::block_on(future::or(
        async {
            let _ = c.run_cycle(&mut sink).await;
            true
        },
        async {
            async_io_mini::Timer::after(Duration::from_millis(300)).await;
            false
        },
    ));

    assert!(!finished, "cycle must not resolve without an answer");
    assert_eq!(c.state(), SortState::AwaitingResult);
    // The belt ran to completion while waiting.
    assert_eq!(tl.count(is_pin_high), STEPS as usize);
    assert_eq!(tl.count(is_servo), 0);
}

#[test]
fn answer_for_another_request_is_ignored() {
    let tl = Timeline::new();
    let reply = Reply::Answer(vec![
        Response {
            data: serde_json::json!(5),
            latency: Duration::ZERO,
            id: IdEcho::Wrong(99),
        },
        Response {
            data: serde_json::json!("2"),
            latency: Duration::from_millis(60),
            id: IdEcho::Matching,
        },
    ]);
    let mut c = rig(ScriptedCamera::always(&tl), vec![reply], &tl);
    let report = future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap();
    assert_eq!(report.label, ClassLabel(2));
    assert_eq!(tl.servo_duties(), vec![1000]);
}

#[test]
fn answer_without_id_resolves_request() {
    let tl = Timeline::new();
    let reply = Reply::Answer(vec![Response {
        data: serde_json::json!(5),
        latency: Duration::ZERO,
        id: IdEcho::Omitted,
    }]);
    let mut c = rig(ScriptedCamera::always(&tl), vec![reply], &tl);
    let report = future::block_on(c.run_cycle(&mut RecordingSink::default())).unwrap();
    assert_eq!(report.bucket.angle_deg, 180);
}

// ── Multiple cycles ───────────────────────────────────────────

#[test]
fn handles_are_reused_across_cycles() {
    let tl = Timeline::new();
    let mut c = rig(
        ScriptedCamera::always(&tl),
        vec![Reply::label(1), Reply::label(5), Reply::label(2)],
        &tl,
    );
    let mut sink = RecordingSink::default();

    for expected in 1..=3u64 {
        let report = future::block_on(c.run_cycle(&mut sink)).unwrap();
        assert_eq!(report.cycle, expected);
    }

    assert_eq!(tl.servo_duties(), vec![500, 2500, 1000]);
    assert_eq!(tl.count(is_pin_high), 3 * STEPS as usize);
    assert_eq!(c.belt().advance_count(), 3);
    assert_eq!(c.completed_cycles(), 3);
    let ids: Vec<u32> = c
        .link()
        .transport()
        .classify_requests()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn run_stops_on_first_failed_cycle() {
    let tl = Timeline::new();
    let mut c = rig(
        ScriptedCamera::scripted(&tl, &[true, true, false]),
        vec![Reply::label(1), Reply::label(2)],
        &tl,
    );
    let mut sink = RecordingSink::default();
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    let err = future::block_on(executor.run(c.run(&mut sink))).unwrap_err();

    assert_eq!(err, Error::Capture(CaptureError::NoImageCaptured));
    assert_eq!(c.completed_cycles(), 2);
    assert_eq!(tl.servo_duties(), vec![500, 1000]);
}
