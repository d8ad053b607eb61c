//! Integration tests for the drive watcher
//!
//! Drives the notification loop with scripted subscriptions: classification,
//! insertion confirmation, handler isolation, and the start/stop lifecycle.

use common::{Error, Result};
use discovery::source::{
    DeviceQuery, RawDeviceRow, VolumeEventSource, VolumeNotice, VolumeSubscription, WaitOutcome,
};
use discovery::watcher::{DriveWatcher, WatcherSettings, WatcherState};
use records::{DriveAction, DriveEvent, DriveKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn notice(drive_name: &str, event_type: u32) -> WaitOutcome {
    WaitOutcome::Event(VolumeNotice {
        drive_name: drive_name.to_string(),
        event_type,
    })
}

/// Event source replaying a fixed script, then idling on timeouts.
struct ScriptedEvents {
    script: Arc<Mutex<VecDeque<WaitOutcome>>>,
    fail_subscribe: bool,
    subscribes: AtomicUsize,
}

impl ScriptedEvents {
    fn new(script: Vec<WaitOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(Mutex::new(script.into())),
            fail_subscribe: false,
            subscribes: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fail_subscribe: true,
            subscribes: AtomicUsize::new(0),
        })
    }

    fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

impl VolumeEventSource for ScriptedEvents {
    fn subscribe(&self) -> Result<Box<dyn VolumeSubscription>> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe {
            return Err(Error::Subscription("no notification stream".to_string()));
        }
        Ok(Box::new(ScriptedSubscription {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedSubscription {
    script: Arc<Mutex<VecDeque<WaitOutcome>>>,
}

impl VolumeSubscription for ScriptedSubscription {
    fn wait_next(&mut self, timeout: Duration) -> WaitOutcome {
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        // Script exhausted: behave like a quiet stream.
        thread::sleep(timeout.min(Duration::from_millis(5)));
        WaitOutcome::TimedOut
    }
}

/// Confirmation query answering from a fixed kind, counting invocations.
struct FixedKindQuery {
    kind: DriveKind,
    calls: AtomicUsize,
}

impl FixedKindQuery {
    fn new(kind: DriveKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeviceQuery for FixedKindQuery {
    fn usb_devices(&self) -> Vec<RawDeviceRow> {
        Vec::new()
    }

    fn drive_kind(&self, _drive_letter: &str) -> DriveKind {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.kind
    }
}

fn fast_settings() -> WatcherSettings {
    WatcherSettings {
        poll_interval: Duration::from_millis(10),
        join_timeout: Duration::from_secs(1),
    }
}

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
fn confirmed_insertion_is_delivered() {
    let events = ScriptedEvents::new(vec![notice("G:\\", 2)]);
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events, confirm.clone(), fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
    });

    let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.action, DriveAction::Inserted);
    assert_eq!(event.drive_letter, "G:");
    assert_eq!(confirm.calls(), 1);

    watcher.stop();
    assert_eq!(watcher.state(), WatcherState::Idle);
}

#[test]
fn unconfirmed_insertion_is_suppressed_and_loop_continues() {
    let events = ScriptedEvents::new(vec![notice("C:\\", 2), notice("G:\\", 3)]);
    let confirm = FixedKindQuery::new(DriveKind::Other);
    let watcher = DriveWatcher::new(events, confirm.clone(), fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
    });

    // Only the removal surfaces; the non-removable insertion is dropped.
    let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.action, DriveAction::Removed);
    assert_eq!(event.drive_letter, "G:");
    assert!(rx.try_recv().is_err());

    watcher.stop();
}

#[test]
fn removal_needs_no_confirmation() {
    let events = ScriptedEvents::new(vec![notice("G:\\", 3)]);
    let confirm = FixedKindQuery::new(DriveKind::Unknown);
    let watcher = DriveWatcher::new(events, confirm.clone(), fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
    });

    let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.action, DriveAction::Removed);
    assert_eq!(confirm.calls(), 0);

    watcher.stop();
}

#[test]
fn unknown_event_codes_are_ignored() {
    let events = ScriptedEvents::new(vec![notice("G:\\", 1), notice("G:\\", 4), notice("G:\\", 3)]);
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events, confirm, fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
    });

    let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.action, DriveAction::Removed);
    assert!(rx.try_recv().is_err());

    watcher.stop();
}

#[test]
fn stop_before_start_is_safe() {
    let events = ScriptedEvents::new(Vec::new());
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events, confirm, fast_settings());

    assert_eq!(watcher.state(), WatcherState::Idle);
    watcher.stop();
    watcher.stop();
    assert_eq!(watcher.state(), WatcherState::Idle);
}

#[test]
fn second_start_is_a_no_op() {
    let events = ScriptedEvents::new(Vec::new());
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events.clone(), confirm, fast_settings());

    watcher.start(|_| {});
    assert!(wait_until(
        || watcher.state() == WatcherState::Watching,
        RECV_TIMEOUT
    ));
    watcher.start(|_| {});

    assert_eq!(events.subscribes(), 1);
    watcher.stop();
}

#[test]
fn subscribe_failure_returns_to_idle() {
    let events = ScriptedEvents::failing();
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events.clone(), confirm, fast_settings());

    watcher.start(|_| {});
    assert!(wait_until(
        || watcher.state() == WatcherState::Idle,
        RECV_TIMEOUT
    ));
    assert_eq!(events.subscribes(), 1);
}

#[test]
fn handler_panic_does_not_kill_the_loop() {
    let events = ScriptedEvents::new(vec![notice("P:\\", 3), notice("G:\\", 3)]);
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events, confirm, fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        if event.drive_letter == "P:" {
            panic!("consumer bug");
        }
        tx.send(event).unwrap();
    });

    let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.drive_letter, "G:");

    watcher.stop();
}

#[test]
fn stop_from_inside_the_handler() {
    let events = ScriptedEvents::new(vec![notice("G:\\", 3), notice("H:\\", 3)]);
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = Arc::new(DriveWatcher::new(events, confirm, fast_settings()));

    let (tx, rx) = mpsc::channel();
    let inner = Arc::clone(&watcher);
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
        inner.stop();
    });

    let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.drive_letter, "G:");

    assert!(wait_until(
        || watcher.state() == WatcherState::Idle,
        RECV_TIMEOUT
    ));
    // The second scripted event was never delivered.
    assert!(rx.try_recv().is_err());
}

#[test]
fn watcher_can_be_restarted_after_stop() {
    let events = ScriptedEvents::new(vec![notice("G:\\", 3)]);
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events.clone(), confirm, fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
    });
    rx.recv_timeout(RECV_TIMEOUT).unwrap();
    watcher.stop();
    assert_eq!(watcher.state(), WatcherState::Idle);

    // Refill the script and go again.
    events
        .script
        .lock()
        .unwrap()
        .push_back(notice("H:\\", 3));
    let (tx2, rx2) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx2.send(event).unwrap();
    });

    let event = rx2.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(event.drive_letter, "H:");
    assert_eq!(events.subscribes(), 2);

    watcher.stop();
}

#[test]
fn stream_close_ends_the_run() {
    let events = ScriptedEvents::new(vec![notice("G:\\", 3), WaitOutcome::Closed]);
    let confirm = FixedKindQuery::new(DriveKind::Removable);
    let watcher = DriveWatcher::new(events, confirm, fast_settings());

    let (tx, rx) = mpsc::channel();
    watcher.start(move |event: DriveEvent| {
        tx.send(event).unwrap();
    });

    rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(wait_until(
        || watcher.state() == WatcherState::Idle,
        RECV_TIMEOUT
    ));
}
