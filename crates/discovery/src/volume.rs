//! Volume operations: removable-drive listing, capacity, safe eject
//!
//! Thin wrappers over single OS queries and one shell verb. Only the
//! Windows backend exists; elsewhere every operation reports
//! [`common::Error::Unsupported`] so callers can surface a clear message.

use common::Result;
use records::DiskSpace;

/// Normalize a drive designator (`"g"`, `"G:"`, `"G:\"`) to the canonical
/// `"G:"` form.
///
/// Returns `None` for anything that is not a single ASCII letter plus
/// optional colon and trailing backslash; the result is interpolated into
/// WQL and shell commands, so nothing else may pass.
pub fn sanitize_drive_letter(raw: &str) -> Option<String> {
    let body = raw.trim().trim_end_matches('\\');
    let body = body.strip_suffix(':').unwrap_or(body);
    let mut chars = body.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() || chars.next().is_some() {
        return None;
    }
    Some(format!("{}:", letter.to_ascii_uppercase()))
}

#[cfg(windows)]
mod imp {
    use super::sanitize_drive_letter;
    use crate::source::system::wmi_connection;
    use common::{Error, Result};
    use records::DiskSpace;
    use serde::Deserialize;
    use std::process::Command;
    use tracing::info;

    #[derive(Debug, Deserialize)]
    #[serde(rename = "Win32_LogicalDisk")]
    #[serde(rename_all = "PascalCase")]
    struct RemovableDiskRow {
        #[serde(rename = "DeviceID")]
        device_id: Option<String>,
    }

    // CIM uint64 values come back as strings.
    #[derive(Debug, Deserialize)]
    #[serde(rename = "Win32_LogicalDisk")]
    #[serde(rename_all = "PascalCase")]
    struct DiskSpaceRow {
        size: Option<String>,
        free_space: Option<String>,
    }

    pub fn removable_drives() -> Result<Vec<String>> {
        let conn = wmi_connection()?;
        let rows: Vec<RemovableDiskRow> = conn
            .raw_query("SELECT DeviceID FROM Win32_LogicalDisk WHERE DriveType = 2")
            .map_err(|e| Error::Query(e.to_string()))?;
        Ok(rows.into_iter().filter_map(|row| row.device_id).collect())
    }

    pub fn disk_space(drive: &str) -> Result<DiskSpace> {
        let letter = sanitize_drive_letter(drive)
            .ok_or_else(|| Error::Query(format!("invalid drive letter: {:?}", drive)))?;
        let conn = wmi_connection()?;
        let query = format!(
            "SELECT Size, FreeSpace FROM Win32_LogicalDisk WHERE DeviceID = '{}'",
            letter
        );
        let rows: Vec<DiskSpaceRow> = conn
            .raw_query(&query)
            .map_err(|e| Error::Query(e.to_string()))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::Query(format!("no volume mounted at {}", letter)))?;

        Ok(DiskSpace {
            total_bytes: row.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
            free_bytes: row
                .free_space
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        })
    }

    pub fn eject_drive(drive: &str) -> Result<()> {
        let letter = sanitize_drive_letter(drive)
            .ok_or_else(|| Error::Query(format!("invalid drive letter: {:?}", drive)))?;
        let script = format!(
            "(New-Object -ComObject Shell.Application).Namespace(17).ParseName('{}').InvokeVerb('Eject')",
            letter
        );

        let status = Command::new("powershell")
            .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", &script])
            .status()?;
        if !status.success() {
            return Err(Error::Query(format!("eject command failed for {}", letter)));
        }
        info!("Requested eject of {}", letter);
        Ok(())
    }
}

#[cfg(not(windows))]
mod imp {
    use common::{Error, Result};
    use records::DiskSpace;

    pub fn removable_drives() -> Result<Vec<String>> {
        Err(Error::Unsupported("removable drive listing".to_string()))
    }

    pub fn disk_space(_drive: &str) -> Result<DiskSpace> {
        Err(Error::Unsupported("disk space query".to_string()))
    }

    pub fn eject_drive(_drive: &str) -> Result<()> {
        Err(Error::Unsupported("safe eject".to_string()))
    }
}

/// Drive letters of currently mounted removable volumes, e.g. `["E:", "G:"]`.
pub fn removable_drives() -> Result<Vec<String>> {
    imp::removable_drives()
}

/// Total and free capacity of the volume mounted at `drive`.
pub fn disk_space(drive: &str) -> Result<DiskSpace> {
    imp::disk_space(drive)
}

/// Ask the shell to safely eject the volume mounted at `drive`.
pub fn eject_drive(drive: &str) -> Result<()> {
    imp::eject_drive(drive)
}
