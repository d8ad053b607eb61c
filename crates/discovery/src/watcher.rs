//! Drive change-event watcher
//!
//! Owns one dedicated notification thread subscribed to the OS
//! volume-change stream. Raw notifications are classified into
//! insertion/removal, insertions are re-validated against the device
//! interface to weed out non-removable volumes sharing the channel, and
//! validated events are delivered synchronously to the registered handler
//! on the watcher's own thread.
//!
//! Cancellation is cooperative: every wait on the subscription is bounded
//! by the poll interval, and the stop flag is rechecked between waits and
//! after each received event.

use crate::source::{DeviceQuery, VolumeEventSource, VolumeNotice, WaitOutcome};
use records::{DriveAction, DriveEvent, DriveKind};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`DriveWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No notification thread.
    Idle,
    /// Thread launched, subscription not open yet.
    Starting,
    /// Blocking on the next event with a bounded poll interval.
    Watching,
    /// Stop requested, in-flight wait being cancelled.
    Stopping,
}

impl WatcherState {
    fn as_u8(self) -> u8 {
        match self {
            WatcherState::Idle => 0,
            WatcherState::Starting => 1,
            WatcherState::Watching => 2,
            WatcherState::Stopping => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WatcherState::Starting,
            2 => WatcherState::Watching,
            3 => WatcherState::Stopping,
            _ => WatcherState::Idle,
        }
    }
}

/// Tunables for the notification loop.
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    /// Upper bound on one blocking wait; the stop flag is rechecked at
    /// least this often even with no events.
    pub poll_interval: Duration,
    /// How long `stop()` waits for the thread before detaching it.
    pub join_timeout: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            join_timeout: Duration::from_secs(2),
        }
    }
}

struct RunningThread {
    handle: JoinHandle<()>,
    id: ThreadId,
}

/// Volume-change watcher with a dedicated notification thread.
///
/// `start` is a no-op while a run is live; `stop` is idempotent, safe
/// before `start`, and safe from inside the handler. A watcher may cycle
/// through start/stop repeatedly.
pub struct DriveWatcher {
    events: Arc<dyn VolumeEventSource>,
    confirm: Arc<dyn DeviceQuery>,
    settings: WatcherSettings,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<RunningThread>>,
}

impl DriveWatcher {
    pub fn new(
        events: Arc<dyn VolumeEventSource>,
        confirm: Arc<dyn DeviceQuery>,
        settings: WatcherSettings,
    ) -> Self {
        Self {
            events,
            confirm,
            settings,
            state: Arc::new(AtomicU8::new(WatcherState::Idle.as_u8())),
            stop: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Launch the notification loop. Does nothing if a run is already
    /// live.
    pub fn start<F>(&self, handler: F)
    where
        F: Fn(DriveEvent) + Send + Sync + 'static,
    {
        let mut slot = self.thread.lock().unwrap();
        if slot
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            debug!("Drive watcher already running");
            return;
        }
        // Reap a previous, already-exited run.
        if let Some(finished) = slot.take() {
            let _ = finished.handle.join();
        }

        self.stop.store(false, Ordering::SeqCst);
        self.state
            .store(WatcherState::Starting.as_u8(), Ordering::SeqCst);

        let events = Arc::clone(&self.events);
        let confirm = Arc::clone(&self.confirm);
        let settings = self.settings.clone();
        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop);
        let handler: Arc<dyn Fn(DriveEvent) + Send + Sync> = Arc::new(handler);

        let handle = thread::Builder::new()
            .name("drive-watcher".to_string())
            .spawn(move || notification_loop(events, confirm, settings, state, stop, handler))
            .expect("Failed to spawn drive watcher thread");

        *slot = Some(RunningThread {
            id: handle.thread().id(),
            handle,
        });
    }

    /// Request cancellation and wait (bounded) for the thread to exit.
    ///
    /// Safe to call multiple times, before `start`, and from within the
    /// handler itself; in the latter case it only signals, since the loop
    /// is already on the current thread and exits on its next check.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);

        let running = self.thread.lock().unwrap().take();
        let Some(running) = running else {
            return;
        };

        if running.id == thread::current().id() {
            self.state
                .store(WatcherState::Stopping.as_u8(), Ordering::SeqCst);
            return;
        }

        if !running.handle.is_finished() {
            self.state
                .store(WatcherState::Stopping.as_u8(), Ordering::SeqCst);
        }

        let deadline = Instant::now() + self.settings.join_timeout;
        while !running.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        if running.handle.is_finished() {
            if running.handle.join().is_err() {
                error!("Drive watcher thread panicked");
            }
        } else {
            warn!(
                "Drive watcher did not stop within {:?}; detaching thread",
                self.settings.join_timeout
            );
        }
        self.state.store(WatcherState::Idle.as_u8(), Ordering::SeqCst);
    }
}

fn notification_loop(
    events: Arc<dyn VolumeEventSource>,
    confirm: Arc<dyn DeviceQuery>,
    settings: WatcherSettings,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    handler: Arc<dyn Fn(DriveEvent) + Send + Sync>,
) {
    let mut subscription = match events.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            // Terminal for this run; callers may retry start().
            error!("Failed to open volume notification stream: {}", e);
            state.store(WatcherState::Idle.as_u8(), Ordering::SeqCst);
            return;
        }
    };

    state.store(WatcherState::Watching.as_u8(), Ordering::SeqCst);
    info!("Drive watcher started");

    while !stop.load(Ordering::SeqCst) {
        match subscription.wait_next(settings.poll_interval) {
            WaitOutcome::TimedOut => continue,
            WaitOutcome::Closed => {
                warn!("Volume notification stream closed");
                break;
            }
            WaitOutcome::Event(notice) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let Some(event) = classify(&notice) else {
                    continue;
                };

                // Other volume types share the notification channel;
                // confirm insertions before surfacing them. Removal needs
                // no confirmation (the device is already gone).
                if event.action == DriveAction::Inserted
                    && confirm.drive_kind(&event.drive_letter) != DriveKind::Removable
                {
                    debug!(
                        "Suppressed insertion of non-removable volume {}",
                        event.drive_letter
                    );
                    continue;
                }

                debug!("Drive {} {}", event.drive_letter, event.action);
                deliver(&handler, event);
            }
        }
    }

    // Release the subscription before reporting idle.
    drop(subscription);
    state.store(WatcherState::Idle.as_u8(), Ordering::SeqCst);
    info!("Drive watcher stopped");
}

/// Map a raw notification onto a drive event. Returns `None` for unknown
/// event codes and unusable drive names.
fn classify(notice: &VolumeNotice) -> Option<DriveEvent> {
    let action = match notice.event_type {
        2 => DriveAction::Inserted,
        3 => DriveAction::Removed,
        _ => return None,
    };

    let name = notice.drive_name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?;
    let colon = chars.next()?;
    let drive_letter: String = [letter, colon].iter().collect();

    Some(DriveEvent {
        action,
        drive_letter,
    })
}

/// Handler failures degrade notifications, never the loop.
fn deliver(handler: &Arc<dyn Fn(DriveEvent) + Send + Sync>, event: DriveEvent) {
    let label = format!("{} {}", event.drive_letter, event.action);
    if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
        error!("Panic in drive event handler for {}", label);
    }
}
