//! Windows system backend
//!
//! Implements the collaborator traits against WMI (`Win32_PnPEntity` for
//! the structured query, `Win32_LogicalDisk` for drive-type confirmation,
//! `Win32_VolumeChangeEvent` for change notifications) and the `pnputil`
//! diagnostic tool.
//!
//! WMI connections are created per call. COM initialization is
//! per-thread, and both the provider and the watcher may call in from
//! threads this crate does not control.

use crate::source::{
    DeviceQuery, DiagnosticSource, RawDeviceRow, VolumeEventSource, VolumeNotice,
    VolumeSubscription, WaitOutcome,
};
use crate::volume::sanitize_drive_letter;
use common::{Error, Result};
use records::DriveKind;
use serde::Deserialize;
use std::process::Command;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wmi::{COMLibrary, WMIConnection};

const USB_DEVICE_QUERY: &str =
    "SELECT Name, Manufacturer, PNPDeviceID, Service FROM Win32_PnPEntity \
     WHERE PNPDeviceID LIKE 'USB%'";

const VOLUME_CHANGE_QUERY: &str =
    "SELECT * FROM Win32_VolumeChangeEvent WHERE EventType = 2 OR EventType = 3";

/// `Win32_LogicalDisk.DriveType` value for removable disks.
const DRIVE_TYPE_REMOVABLE: u32 = 2;

/// How long `subscribe` waits for the notification stream to open.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// System-backed device, diagnostic, and volume-event source.
#[derive(Debug, Default)]
pub struct SystemSource;

impl SystemSource {
    pub fn new() -> Self {
        Self
    }
}

/// WMI connection with fresh COM initialization, falling back to an
/// already-initialized COM apartment (e.g. when the caller's runtime set
/// one up first).
pub(crate) fn wmi_connection() -> Result<WMIConnection> {
    if let Ok(com) = COMLibrary::new() {
        if let Ok(conn) = WMIConnection::new(com) {
            return Ok(conn);
        }
    }

    let com = unsafe { COMLibrary::assume_initialized() };
    WMIConnection::new(com).map_err(|e| Error::Query(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Win32_PnPEntity")]
#[serde(rename_all = "PascalCase")]
struct PnpEntityRow {
    name: Option<String>,
    manufacturer: Option<String>,
    #[serde(rename = "PNPDeviceID")]
    pnp_device_id: Option<String>,
    service: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Win32_LogicalDisk")]
#[serde(rename_all = "PascalCase")]
struct LogicalDiskRow {
    drive_type: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Win32_VolumeChangeEvent")]
#[serde(rename_all = "PascalCase")]
struct VolumeChangeRow {
    drive_name: Option<String>,
    event_type: Option<u16>,
}

impl DeviceQuery for SystemSource {
    fn usb_devices(&self) -> Vec<RawDeviceRow> {
        let conn = match wmi_connection() {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Device query connection failed: {}", e);
                return Vec::new();
            }
        };

        let rows: Vec<PnpEntityRow> = match conn.raw_query(USB_DEVICE_QUERY) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("USB device query failed: {}", e);
                return Vec::new();
            }
        };

        rows.into_iter()
            .map(|row| RawDeviceRow {
                name: row.name,
                manufacturer: row.manufacturer,
                instance_path: row.pnp_device_id,
                service: row.service,
            })
            .collect()
    }

    fn drive_kind(&self, drive_letter: &str) -> DriveKind {
        let Some(letter) = sanitize_drive_letter(drive_letter) else {
            return DriveKind::Unknown;
        };
        let conn = match wmi_connection() {
            Ok(conn) => conn,
            Err(e) => {
                debug!("Drive-type query connection failed: {}", e);
                return DriveKind::Unknown;
            }
        };

        let query = format!(
            "SELECT DriveType FROM Win32_LogicalDisk WHERE DeviceID = '{}'",
            letter
        );
        let rows: Vec<LogicalDiskRow> = match conn.raw_query(&query) {
            Ok(rows) => rows,
            Err(e) => {
                debug!("Drive-type query for {} failed: {}", letter, e);
                return DriveKind::Unknown;
            }
        };

        match rows.first().and_then(|row| row.drive_type) {
            Some(DRIVE_TYPE_REMOVABLE) => DriveKind::Removable,
            Some(_) => DriveKind::Other,
            None => DriveKind::Unknown,
        }
    }
}

impl DiagnosticSource for SystemSource {
    fn capture(&self) -> String {
        let output = match Command::new("pnputil")
            .args(["/enum-devices", "/connected", "/properties"])
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!("pnputil unavailable: {}", e);
                return String::new();
            }
        };

        if !output.status.success() {
            debug!("pnputil exited with {}", output.status);
            return String::new();
        }

        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

impl VolumeEventSource for SystemSource {
    fn subscribe(&self) -> Result<Box<dyn VolumeSubscription>> {
        let (status_tx, status_rx) = sync_channel(1);
        let (event_tx, event_rx) = sync_channel(64);

        thread::Builder::new()
            .name("volume-notify".to_string())
            .spawn(move || forward_notifications(status_tx, event_tx))
            .map_err(|e| Error::Subscription(e.to_string()))?;

        match status_rx.recv_timeout(SUBSCRIBE_TIMEOUT) {
            Ok(Ok(())) => Ok(Box::new(SystemSubscription { events: event_rx })),
            Ok(Err(message)) => Err(Error::Subscription(message)),
            Err(_) => Err(Error::Subscription(
                "timed out opening the volume notification stream".to_string(),
            )),
        }
    }
}

/// Drains the blocking WMI notification iterator on its own thread and
/// forwards decoded events into a bounded channel. Exits when a forward
/// fails, i.e. when the receiving subscription has been dropped.
fn forward_notifications(
    status_tx: SyncSender<std::result::Result<(), String>>,
    event_tx: SyncSender<VolumeNotice>,
) {
    let conn = match wmi_connection() {
        Ok(conn) => conn,
        Err(e) => {
            let _ = status_tx.send(Err(e.to_string()));
            return;
        }
    };

    let stream = match conn.raw_notification::<VolumeChangeRow>(VOLUME_CHANGE_QUERY) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = status_tx.send(Err(e.to_string()));
            return;
        }
    };

    let _ = status_tx.send(Ok(()));

    for item in stream {
        let row = match item {
            Ok(row) => row,
            Err(e) => {
                debug!("Undecodable volume notification: {}", e);
                continue;
            }
        };
        let Some(drive_name) = row.drive_name else {
            continue;
        };
        let notice = VolumeNotice {
            drive_name,
            event_type: u32::from(row.event_type.unwrap_or(0)),
        };
        if event_tx.send(notice).is_err() {
            break;
        }
    }

    debug!("Volume notification forwarder exiting");
}

/// Receiver half of the notification forwarder.
struct SystemSubscription {
    events: Receiver<VolumeNotice>,
}

impl VolumeSubscription for SystemSubscription {
    fn wait_next(&mut self, timeout: Duration) -> WaitOutcome {
        match self.events.recv_timeout(timeout) {
            Ok(notice) => WaitOutcome::Event(notice),
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Closed,
        }
    }
}
