//! Integration tests for the DispatchSession → FSM → notifier pipeline.
//!
//! Scan and completion events are fed by hand so each test controls the
//! exact interleaving the event queue would produce on the device.

use crate::mocks::{
    NoDelay, RecordingNotifier, RecordingSink, SONG_X_TABLE, ScriptedSource, TWO_SONG_TABLE,
};

use sonotify::app::events::{AppEvent, IgnoreReason};
use sonotify::app::service::DispatchSession;
use sonotify::config::{DispatchConfig, DispatchMode};
use sonotify::dispatch::tag::TagId;
use sonotify::error::{AcquisitionError, NotificationError, ParseError, TableError};
use sonotify::events::{EVENT_QUEUE_DEPTH, EventQueue, SessionEvent};
use sonotify::fsm::StateId;

const SONG_X_BODY: &str = "uri=spotify:track:X&entity_id=media_player.roam_2";

struct Rig {
    session: DispatchSession,
    notifier: RecordingNotifier,
    sink: RecordingSink,
    delay: NoDelay,
}

impl Rig {
    fn start(config: DispatchConfig, source: &mut ScriptedSource) -> Self {
        let mut rig = Self {
            session: DispatchSession::new(config),
            notifier: RecordingNotifier::default(),
            sink: RecordingSink::default(),
            delay: NoDelay::default(),
        };
        rig.session
            .start(source, &mut rig.notifier, &mut rig.delay, &mut rig.sink);
        rig
    }

    fn matched(table: &[u8]) -> Self {
        Self::start(DispatchConfig::default(), &mut ScriptedSource::ok(table))
    }

    fn present(&mut self, tag: &str) {
        self.event(SessionEvent::Presented(TagId::from(tag)));
    }

    fn remove(&mut self, tag: &str) {
        self.event(SessionEvent::Removed(TagId::from(tag)));
    }

    fn complete(&mut self, result: Result<u16, NotificationError>) {
        let cycle = self.session.cycle();
        self.event(SessionEvent::NotificationCompleted { cycle, result });
    }

    fn event(&mut self, event: SessionEvent) {
        self.session
            .handle_event(event, &mut self.notifier, &mut self.sink);
    }

    fn tick(&mut self, n: u64) {
        for _ in 0..n {
            self.session.tick(&mut self.notifier, &mut self.sink);
        }
    }
}

// ── Scan scenarios ────────────────────────────────────────────

#[test]
fn known_tag_sends_exactly_one_notification() {
    let mut rig = Rig::matched(SONG_X_TABLE);
    assert_eq!(rig.session.state(), StateId::AwaitingScan);

    rig.present("04A1B2C3");
    assert_eq!(rig.notifier.bodies(), vec![SONG_X_BODY]);
    assert_eq!(rig.session.state(), StateId::Notifying);
    assert!(rig.sink.contains(&AppEvent::Dispatching {
        cycle: 1,
        tag: Some(TagId::from("04A1B2C3")),
        uri: "spotify:track:X".into(),
        description: Some("Song X".into()),
    }));

    rig.complete(Ok(200));
    assert_eq!(rig.session.state(), StateId::AwaitingScan);
    assert!(rig.sink.contains(&AppEvent::Notified {
        cycle: 1,
        status: 200
    }));
}

#[test]
fn unknown_tag_reports_not_found_and_sends_nothing() {
    let mut rig = Rig::matched(SONG_X_TABLE);
    rig.present("FFFFFFFF");
    assert!(rig.notifier.submitted.is_empty());
    assert!(rig.sink.contains(&AppEvent::NotFound(TagId::from("FFFFFFFF"))));
    assert_eq!(rig.session.state(), StateId::AwaitingScan);

    // The session stays live for the next scan.
    rig.present("04A1B2C3");
    assert_eq!(rig.notifier.submitted.len(), 1);
}

#[test]
fn empty_table_in_matched_mode_is_not_found() {
    let mut rig = Rig::matched(b"[]");
    assert_eq!(rig.session.table().map(|t| t.len()), Some(0));
    rig.present("04A1B2C3");
    assert!(rig.notifier.submitted.is_empty());
    assert!(rig.sink.contains(&AppEvent::NotFound(TagId::from("04A1B2C3"))));
}

#[test]
fn dwelling_tag_is_coalesced_until_removed() {
    let mut rig = Rig::matched(SONG_X_TABLE);
    for _ in 0..5 {
        rig.present("04A1B2C3");
    }
    rig.complete(Ok(200));
    for _ in 0..5 {
        rig.present("04A1B2C3");
    }
    assert_eq!(rig.notifier.submitted.len(), 1);

    rig.remove("04A1B2C3");
    rig.present("04A1B2C3");
    assert_eq!(rig.notifier.submitted.len(), 2);
    assert_eq!(rig.notifier.last_cycle(), Some(2));
}

#[test]
fn distinct_tag_waits_for_in_flight_cycle() {
    let mut rig = Rig::matched(TWO_SONG_TABLE);
    rig.present("04A1B2C3");
    rig.present("0499AABB");
    assert_eq!(rig.notifier.submitted.len(), 1);
    assert_eq!(rig.session.pending_tag(), Some(&TagId::from("0499AABB")));

    rig.complete(Ok(200));
    assert_eq!(
        rig.notifier.bodies(),
        vec![SONG_X_BODY, "uri=spotify:album:Y&entity_id=media_player.roam_2"]
    );
    assert_eq!(rig.session.state(), StateId::Notifying);
    assert_eq!(rig.session.active_tag(), Some(&TagId::from("0499AABB")));
}

#[test]
fn pending_queue_keeps_only_the_newest_scan() {
    let mut rig = Rig::matched(TWO_SONG_TABLE);
    rig.present("04A1B2C3");
    rig.present("11111111");
    rig.present("0499AABB");
    assert!(rig.sink.contains(&AppEvent::ScanIgnored {
        tag: TagId::from("11111111"),
        reason: IgnoreReason::Superseded,
    }));

    rig.complete(Ok(200));
    assert_eq!(rig.notifier.submitted.len(), 2);
    assert_eq!(rig.session.pending_tag(), None);
}

#[test]
fn queued_tag_lifted_before_its_cycle_can_be_tapped_again() {
    let mut rig = Rig::matched(TWO_SONG_TABLE);
    rig.present("04A1B2C3");
    rig.present("0499AABB");
    rig.remove("0499AABB");
    rig.remove("04A1B2C3");

    rig.complete(Ok(200));
    assert_eq!(rig.notifier.submitted.len(), 2);
    assert_eq!(rig.session.active_tag(), None);
    rig.complete(Ok(200));
    assert_eq!(rig.session.state(), StateId::AwaitingScan);

    rig.present("0499AABB");
    assert_eq!(rig.notifier.submitted.len(), 3);
    assert_eq!(rig.notifier.last_cycle(), Some(3));
}

#[test]
fn queued_tag_lifted_and_replaced_stays_armed() {
    let mut rig = Rig::matched(TWO_SONG_TABLE);
    rig.present("04A1B2C3");
    rig.present("0499AABB");
    rig.remove("0499AABB");
    rig.present("0499AABB");

    rig.complete(Ok(200));
    assert_eq!(rig.session.active_tag(), Some(&TagId::from("0499AABB")));
    rig.complete(Ok(200));
    rig.present("0499AABB");
    assert_eq!(rig.notifier.submitted.len(), 2);
}

#[test]
fn removal_after_saturated_queue_rearms_the_tag() {
    let queue = EventQueue::new();
    let mut rig = Rig::matched(SONG_X_TABLE);
    rig.present("04A1B2C3");
    rig.complete(Ok(200));

    for _ in 0..EVENT_QUEUE_DEPTH {
        queue.push(SessionEvent::Presented(TagId::from("04A1B2C3")));
    }
    queue.push(SessionEvent::Removed(TagId::from("04A1B2C3")));
    queue.drain(|event| rig.event(event));
    assert_eq!(rig.session.active_tag(), None);

    rig.present("04A1B2C3");
    assert_eq!(rig.notifier.submitted.len(), 2);
}

// ── Notification outcomes ─────────────────────────────────────

#[test]
fn failed_notification_does_not_block_next_scan() {
    let mut rig = Rig::matched(TWO_SONG_TABLE);
    rig.present("04A1B2C3");
    rig.complete(Err(NotificationError::NonSuccessStatus(500)));
    assert!(rig.sink.contains(&AppEvent::NotificationFailed {
        cycle: 1,
        error: NotificationError::NonSuccessStatus(500),
    }));
    assert_eq!(rig.session.state(), StateId::AwaitingScan);

    rig.present("0499AABB");
    assert_eq!(rig.notifier.submitted.len(), 2);
}

#[test]
fn unanswered_notification_times_out() {
    let mut rig = Rig::matched(SONG_X_TABLE);
    rig.present("04A1B2C3");
    let limit = rig.session.config().notify_timeout_ticks();

    rig.tick(limit - 1);
    assert_eq!(rig.session.state(), StateId::Notifying);
    rig.tick(1);
    assert_eq!(rig.session.state(), StateId::AwaitingScan);
    assert!(rig.sink.contains(&AppEvent::NotificationFailed {
        cycle: 1,
        error: NotificationError::Timeout,
    }));

    // The late answer for cycle 1 is stale and must not be reported.
    rig.event(SessionEvent::NotificationCompleted {
        cycle: 1,
        result: Ok(200),
    });
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::Notified { .. })),
        0
    );
}

#[test]
fn rejected_submission_is_reported_and_cycle_ends() {
    let mut rig = Rig::matched(SONG_X_TABLE);
    rig.notifier.reject_with = Some(NotificationError::Busy);
    rig.present("04A1B2C3");
    assert_eq!(rig.session.state(), StateId::AwaitingScan);
    assert_eq!(
        rig.session.last_notification(),
        Some(Err(NotificationError::Busy))
    );
}

// ── Table loading ─────────────────────────────────────────────

#[test]
fn load_retries_then_succeeds() {
    let mut source = ScriptedSource::new(vec![
        Err(AcquisitionError::Timeout),
        Err(AcquisitionError::Status(503)),
        Ok(SONG_X_TABLE.to_vec()),
    ]);
    let rig = Rig::start(DispatchConfig::default(), &mut source);

    assert_eq!(source.calls, 3);
    assert_eq!(rig.session.state(), StateId::AwaitingScan);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::TableLoadFailed { .. })),
        2
    );
    let retry_ns = u64::from(DispatchConfig::default().table_retry_delay_ms) * 1_000_000;
    assert_eq!(rig.delay.total_ns, 2 * retry_ns);
}

#[test]
fn exhausted_retries_are_unrecoverable() {
    let mut source = ScriptedSource::failing(AcquisitionError::Truncated {
        read: 4095,
        declared: None,
    });
    let mut rig = Rig::start(DispatchConfig::default(), &mut source);

    let attempts = DispatchConfig::default().table_max_attempts;
    assert_eq!(source.calls, attempts);
    assert_eq!(rig.session.state(), StateId::Unrecoverable);
    assert!(rig.session.is_finished());
    assert!(rig.sink.contains(&AppEvent::Unrecoverable { attempts }));

    rig.present("04A1B2C3");
    assert!(rig.notifier.submitted.is_empty());
    assert!(rig.sink.contains(&AppEvent::ScanIgnored {
        tag: TagId::from("04A1B2C3"),
        reason: IgnoreReason::NotReady(StateId::Unrecoverable),
    }));
}

#[test]
fn malformed_table_counts_as_load_failure() {
    let mut source = ScriptedSource::ok(b"{}");
    let rig = Rig::start(DispatchConfig::default(), &mut source);
    assert_eq!(rig.session.state(), StateId::Unrecoverable);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::TableLoadFailed {
            error: TableError::Parse(ParseError::Malformed(_)),
            ..
        }
    )));
}

#[test]
fn refresh_swaps_table_between_cycles() {
    let mut rig = Rig::matched(SONG_X_TABLE);
    rig.present("0499AABB");
    assert!(rig.sink.contains(&AppEvent::NotFound(TagId::from("0499AABB"))));

    assert!(
        rig.session
            .refresh_table(&mut ScriptedSource::ok(TWO_SONG_TABLE), &mut rig.sink)
    );
    rig.remove("0499AABB");
    rig.present("0499AABB");
    assert_eq!(
        rig.notifier.bodies(),
        vec!["uri=spotify:album:Y&entity_id=media_player.roam_2"]
    );
}

// ── Positional mode ───────────────────────────────────────────

fn positional() -> DispatchConfig {
    DispatchConfig {
        mode: DispatchMode::Positional,
        ..DispatchConfig::default()
    }
}

#[test]
fn positional_dispatches_first_row_once() {
    let mut rig = Rig::start(positional(), &mut ScriptedSource::ok(TWO_SONG_TABLE));
    assert_eq!(rig.notifier.bodies(), vec![SONG_X_BODY]);
    assert_eq!(rig.session.state(), StateId::Notifying);

    rig.present("0499AABB");
    assert!(rig.sink.contains(&AppEvent::ScanIgnored {
        tag: TagId::from("0499AABB"),
        reason: IgnoreReason::PositionalMode,
    }));

    rig.complete(Ok(200));
    assert_eq!(rig.session.state(), StateId::Finished);
    assert!(rig.session.is_finished());
    assert_eq!(rig.notifier.submitted.len(), 1);
}

#[test]
fn positional_rows_need_no_tag_id() {
    let mut rig = Rig::start(
        positional(),
        &mut ScriptedSource::ok(br#"[{"spotifyUri":"spotify:track:1uxNXHgtww0yfbF9PKghHi"}]"#),
    );
    assert_eq!(
        rig.notifier.bodies(),
        vec!["uri=spotify:track:1uxNXHgtww0yfbF9PKghHi&entity_id=media_player.roam_2"]
    );
    rig.complete(Ok(200));
    assert_eq!(rig.session.state(), StateId::Finished);
}

#[test]
fn positional_empty_table_finishes_without_dispatch() {
    let rig = Rig::start(positional(), &mut ScriptedSource::ok(b"[]"));
    assert!(rig.notifier.submitted.is_empty());
    assert!(rig.sink.contains(&AppEvent::EmptyTable));
    assert_eq!(rig.session.state(), StateId::Finished);
}
