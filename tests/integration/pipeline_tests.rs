//! End-to-end host pipeline: reader bytes → event queue → session →
//! inline notifier → completion → session.
//!
//! Mirrors the device main loop with the threads replaced by explicit
//! polls and drains.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::mocks::{FixedTransport, NoDelay, RecordingSink, SONG_X_TABLE};

use sonotify::adapters::notifier::InlineNotifier;
use sonotify::adapters::nvs::NvsAdapter;
use sonotify::adapters::reader::{ReaderError, ReaderLink, ReaderPoller};
use sonotify::adapters::table_source::{self, FileTableSource};
use sonotify::app::events::AppEvent;
use sonotify::app::ports::ConfigPort;
use sonotify::app::service::DispatchSession;
use sonotify::config::{DispatchConfig, DispatchMode, TableSourceKind};
use sonotify::dispatch::tag::TagFormat;
use sonotify::error::NotificationError;
use sonotify::events::{EVENT_QUEUE_DEPTH, EventQueue};
use sonotify::fsm::StateId;

/// One entry per poll; an empty entry is a poll with nothing pending.
struct PollScript(VecDeque<Vec<u8>>);

impl PollScript {
    fn new(polls: &[&[u8]]) -> Self {
        let mut script = VecDeque::new();
        for poll in polls {
            if !poll.is_empty() {
                script.push_back(poll.to_vec());
            }
            script.push_back(Vec::new());
        }
        Self(script)
    }
}

impl ReaderLink for PollScript {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ReaderError> {
        let Some(next) = self.0.pop_front() else {
            return Ok(0);
        };
        let n = next.len().min(buf.len());
        buf[..n].copy_from_slice(&next[..n]);
        Ok(n)
    }
}

fn temp_table(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "sonotify-{}-{}.json",
        name,
        std::process::id()
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn reader_to_webhook_round_trip() {
    let path = temp_table("round-trip", SONG_X_TABLE);
    let queue = EventQueue::new();
    let mut notifier = InlineNotifier::new(FixedTransport::new(Ok(200)), &queue);
    let mut sink = RecordingSink::default();
    let mut session = DispatchSession::new(DispatchConfig::default());
    session.start(
        &mut FileTableSource::new(path.to_string_lossy(), 4096),
        &mut notifier,
        &mut NoDelay::default(),
        &mut sink,
    );
    assert_eq!(session.state(), StateId::AwaitingScan);

    let mut reader = ReaderPoller::new(
        PollScript::new(&[b"04:a1:b2:c3\r\n", b"04A1B2C3\n", b"", b"04 A1 B2 C3\n"]),
        TagFormat::Plain,
        1,
    );
    for _ in 0..4 {
        reader.poll(&queue).unwrap();
        queue.drain(|event| session.handle_event(event, &mut notifier, &mut sink));
    }

    let posted = &notifier.transport().posted;
    assert_eq!(posted.len(), 2);
    assert_eq!(
        posted[0].body,
        "uri=spotify:track:X&entity_id=media_player.roam_2"
    );
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::Notified { status: 200, .. })),
        2
    );
    assert_eq!(session.state(), StateId::AwaitingScan);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn tag_dwelling_through_a_stalled_loop_is_released() {
    let path = temp_table("stall", SONG_X_TABLE);
    let queue = EventQueue::new();
    let mut notifier = InlineNotifier::new(FixedTransport::new(Ok(200)), &queue);
    let mut sink = RecordingSink::default();
    let mut session = DispatchSession::new(DispatchConfig::default());
    session.start(
        &mut FileTableSource::new(path.to_string_lossy(), 4096),
        &mut notifier,
        &mut NoDelay::default(),
        &mut sink,
    );

    // The main loop is busy for far more polls than the queue holds.
    let mut polls: Vec<&[u8]> = vec![&b"04A1B2C3\n"[..]; 4 * EVENT_QUEUE_DEPTH];
    polls.push(b"");
    polls.push(b"04A1B2C3\n");
    let mut reader = ReaderPoller::new(PollScript::new(&polls), TagFormat::Plain, 1);
    for _ in 0..=4 * EVENT_QUEUE_DEPTH {
        reader.poll(&queue).unwrap();
    }
    queue.drain(|event| session.handle_event(event, &mut notifier, &mut sink));
    assert_eq!(notifier.transport().posted.len(), 1);
    assert_eq!(session.active_tag(), None);

    reader.poll(&queue).unwrap();
    queue.drain(|event| session.handle_event(event, &mut notifier, &mut sink));
    assert_eq!(notifier.transport().posted.len(), 2);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn gateway_rejection_is_reported_through_queue() {
    let path = temp_table("rejection", SONG_X_TABLE);
    let queue = EventQueue::new();
    let mut notifier = InlineNotifier::new(
        FixedTransport::new(Err(NotificationError::NonSuccessStatus(404))),
        &queue,
    );
    let mut sink = RecordingSink::default();
    let mut session = DispatchSession::new(DispatchConfig::default());
    session.start(
        &mut FileTableSource::new(path.to_string_lossy(), 4096),
        &mut notifier,
        &mut NoDelay::default(),
        &mut sink,
    );

    let mut reader = ReaderPoller::new(PollScript::new(&[b"04A1B2C3\n"]), TagFormat::Plain, 3);
    reader.poll(&queue).unwrap();
    queue.drain(|event| session.handle_event(event, &mut notifier, &mut sink));

    assert!(sink.contains(&AppEvent::NotificationFailed {
        cycle: 1,
        error: NotificationError::NonSuccessStatus(404),
    }));
    assert_eq!(session.state(), StateId::AwaitingScan);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn stored_config_drives_positional_boot() {
    let path = temp_table("positional", SONG_X_TABLE);
    let nvs = NvsAdapter::new().unwrap();
    nvs.save(&DispatchConfig {
        mode: DispatchMode::Positional,
        table_source: TableSourceKind::Local,
        table_path: path.to_string_lossy().into_owned(),
        target_device: "media_player.kitchen".into(),
        ..DispatchConfig::default()
    })
    .unwrap();

    let config = nvs.load().unwrap();
    let queue = EventQueue::new();
    let mut notifier = InlineNotifier::new(FixedTransport::new(Ok(200)), &queue);
    let mut sink = RecordingSink::default();
    let mut session = DispatchSession::new(config.clone());
    session.start(
        &mut table_source::from_config(&config),
        &mut notifier,
        &mut NoDelay::default(),
        &mut sink,
    );
    queue.drain(|event| session.handle_event(event, &mut notifier, &mut sink));

    assert_eq!(session.state(), StateId::Finished);
    assert_eq!(
        notifier.transport().posted[0].body,
        "uri=spotify:track:X&entity_id=media_player.kitchen"
    );
    std::fs::remove_file(path).unwrap();
}

#[test]
fn remote_with_fallback_uses_local_file_on_host() {
    let path = temp_table("fallback", SONG_X_TABLE);
    let config = DispatchConfig {
        table_source: TableSourceKind::RemoteWithLocalFallback,
        table_path: path.to_string_lossy().into_owned(),
        ..DispatchConfig::default()
    };
    let queue = EventQueue::new();
    let mut notifier = InlineNotifier::new(FixedTransport::new(Ok(200)), &queue);
    let mut sink = RecordingSink::default();
    let mut session = DispatchSession::new(config.clone());
    session.start(
        &mut table_source::from_config(&config),
        &mut notifier,
        &mut NoDelay::default(),
        &mut sink,
    );

    assert!(sink.contains(&AppEvent::TableLoaded {
        entries: 1,
        source: "file"
    }));
    assert_eq!(session.state(), StateId::AwaitingScan);
    std::fs::remove_file(path).unwrap();
}
