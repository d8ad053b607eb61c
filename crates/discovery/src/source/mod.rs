//! Collaborator boundaries for system data sources
//!
//! The discovery core talks to the OS through these traits only. The real
//! backend lives in [`system`] and is compiled on Windows; tests substitute
//! scripted implementations.

use common::Result;
use records::DriveKind;
use std::time::Duration;

#[cfg(windows)]
pub mod system;
#[cfg(windows)]
pub use system::SystemSource;

/// One raw candidate row from the structured device interface.
#[derive(Debug, Clone, Default)]
pub struct RawDeviceRow {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub instance_path: Option<String>,
    pub service: Option<String>,
}

/// Structured device-management interface.
pub trait DeviceQuery: Send + Sync {
    /// All devices whose identity path indicates USB attachment.
    ///
    /// A device vanishing mid-query is skipped by the implementation; a
    /// total query failure degrades to an empty list.
    fn usb_devices(&self) -> Vec<RawDeviceRow>;

    /// Volume type behind a mounted drive letter such as `"G:"`.
    /// Failure degrades to [`DriveKind::Unknown`].
    fn drive_kind(&self, drive_letter: &str) -> DriveKind;
}

/// Unstructured diagnostic text source.
pub trait DiagnosticSource: Send + Sync {
    /// Captured tool output. Empty when the tool is unavailable or exited
    /// non-zero; never an error.
    fn capture(&self) -> String;
}

/// One raw event from the volume-change notification stream.
#[derive(Debug, Clone)]
pub struct VolumeNotice {
    /// Volume name as reported by the OS, e.g. `"G:\\"`.
    pub drive_name: String,
    /// Numeric event-type code; 2 is arrival, 3 is removal.
    pub event_type: u32,
}

/// Outcome of one bounded wait on a subscription.
#[derive(Debug)]
pub enum WaitOutcome {
    Event(VolumeNotice),
    /// Nothing arrived within the timeout. A retry, not an error.
    TimedOut,
    /// The stream is gone; terminal for this subscription.
    Closed,
}

/// A live subscription to the volume-change stream.
///
/// Dropping the subscription releases the underlying resources; the
/// backend must keep every wait bounded so the owner can observe a stop
/// request between waits.
pub trait VolumeSubscription: Send {
    fn wait_next(&mut self, timeout: Duration) -> WaitOutcome;
}

/// Factory for volume-change subscriptions, filtered to volume arrival and
/// removal events.
pub trait VolumeEventSource: Send + Sync {
    fn subscribe(&self) -> Result<Box<dyn VolumeSubscription>>;
}
