//! USB device snapshot
//!
//! A [`DeviceRecord`] is assembled once per enumeration pass by merging the
//! structured device query with the diagnostic property dump. Records are
//! never mutated afterwards; a rescan produces an entirely new list.

use serde::{Deserialize, Serialize};

/// One USB device as seen at enumeration time.
///
/// Fields sourced from the diagnostic dump (`bus_number`, `address`, and
/// usually `usb_version`) are `None` when the device was missing from that
/// source or the value could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Hierarchical instance path assigned by the OS,
    /// e.g. `USB\VID_0951&PID_1666\001A92053B6A`. Unique per physical
    /// attachment point; also the merge key between data sources.
    pub instance_path: String,
    /// Vendor ID normalized to `0x` + four lowercase hex digits.
    pub vendor_id: Option<String>,
    /// Product ID normalized to `0x` + four lowercase hex digits.
    pub product_id: Option<String>,
    /// Manufacturer string from the device registry; may be empty.
    pub manufacturer: Option<String>,
    /// Display name from the device registry; may be empty.
    pub product_name: Option<String>,
    /// Last segment of a three-segment instance path.
    pub serial_number: Option<String>,
    /// Driver/service binding (e.g. `USBSTOR` for mass storage).
    pub service: Option<String>,
    /// Bus number from the diagnostic dump.
    pub bus_number: Option<u32>,
    /// Device address on the bus from the diagnostic dump.
    pub address: Option<u32>,
    /// USB protocol version string such as `"3.0"` or `"2.0"`.
    pub usb_version: Option<String>,
}

impl DeviceRecord {
    /// Short human-readable identity used in log lines.
    pub fn label(&self) -> String {
        match (&self.vendor_id, &self.product_id) {
            (Some(vid), Some(pid)) => format!("{}:{}", vid, pid),
            _ => self
                .product_name
                .clone()
                .unwrap_or_else(|| self.instance_path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeviceRecord {
        DeviceRecord {
            instance_path: "USB\\VID_0951&PID_1666\\001A92053B6A".to_string(),
            vendor_id: Some("0x0951".to_string()),
            product_id: Some("0x1666".to_string()),
            manufacturer: Some("Kingston".to_string()),
            product_name: Some("DataTraveler 3.0".to_string()),
            serial_number: Some("001A92053B6A".to_string()),
            service: Some("USBSTOR".to_string()),
            bus_number: Some(2),
            address: Some(7),
            usb_version: Some("3.0".to_string()),
        }
    }

    #[test]
    fn test_label_prefers_vid_pid() {
        assert_eq!(record().label(), "0x0951:0x1666");
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let mut rec = record();
        rec.vendor_id = None;
        assert_eq!(rec.label(), "DataTraveler 3.0");
    }

    #[test]
    fn test_serde_round_trip() {
        let rec = record();
        let json = serde_json::to_string(&rec).unwrap();
        let back: DeviceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
