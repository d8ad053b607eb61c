//! Test utilities for rust-usb-watch
//!
//! Provides mock record builders and helper constants for testing across
//! crates.

use records::DeviceRecord;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a mock DeviceRecord for testing
///
/// # Example
/// ```
/// use common::test_utils::mock_record;
///
/// let rec = mock_record("USB\\VID_1234&PID_5678\\SN0001", Some("USBSTOR"));
/// assert_eq!(rec.vendor_id.as_deref(), Some("0x1234"));
/// ```
pub fn mock_record(instance_path: &str, service: Option<&str>) -> DeviceRecord {
    let serial = instance_path.rsplit('\\').next().map(str::to_string);
    DeviceRecord {
        instance_path: instance_path.to_string(),
        vendor_id: Some("0x1234".to_string()),
        product_id: Some("0x5678".to_string()),
        manufacturer: Some("Test Manufacturer".to_string()),
        product_name: Some("Test Product".to_string()),
        serial_number: serial,
        service: service.map(str::to_string),
        bus_number: None,
        address: None,
        usb_version: None,
    }
}
