//! Diagnostic dump parser
//!
//! The diagnostic tool prints a sequence of device blocks: an instance-id
//! line, then indented property lines, where the interesting properties
//! put their value on the line after the property name. This module turns
//! one captured dump into a map from normalized instance id to the
//! supplementary properties the structured query cannot provide.
//!
//! Parsing is a line-oriented state machine and never fails; malformed or
//! truncated blocks are dropped, failed value extractions leave the
//! previous value untouched.

use crate::identity::{normalize_instance_path, usb_version_token};
use crate::scan::{contains_ignore_case, labeled_value, numeric_value};
use std::collections::HashMap;

const INSTANCE_ID_LABEL: &str = "Instance ID";
const DESCRIPTION_LABEL: &str = "Device Description";
const ADDRESS_PROPERTY: &str = "DEVPKEY_Device_Address";
const BUS_NUMBER_PROPERTY: &str = "DEVPKEY_Device_BusNumber";
const BUS_DESCRIPTION_PROPERTY: &str = "DEVPKEY_Device_BusReportedDeviceDesc";

/// Supplementary per-device properties recovered from the diagnostic dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplementalProps {
    pub address: Option<u32>,
    pub bus_number: Option<u32>,
    pub usb_version: Option<String>,
}

/// Which property name was seen last, awaiting its value on the next
/// non-blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expecting {
    None,
    Address,
    BusNumber,
    BusDescription,
}

/// Parse a full diagnostic dump into per-device property records.
///
/// Empty input (tool missing, non-zero exit) yields an empty map.
pub fn parse_property_dump(text: &str) -> HashMap<String, SupplementalProps> {
    let mut map = HashMap::new();
    let mut current: Option<(String, SupplementalProps)> = None;
    let mut expecting = Expecting::None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        // A new instance-id line starts a block and flushes the previous one.
        if let Some(id) = labeled_value(line, INSTANCE_ID_LABEL) {
            if let Some((key, props)) = current.take() {
                map.insert(key, props);
            }
            current = Some((normalize_instance_path(id), SupplementalProps::default()));
            expecting = Expecting::None;
            continue;
        }

        // Lines before the first instance id are headers and noise.
        let Some((_, props)) = current.as_mut() else {
            continue;
        };

        // The plain description line often carries the version already.
        if let Some(desc) = labeled_value(line, DESCRIPTION_LABEL) {
            if let Some(version) = usb_version_token(desc) {
                props.usb_version = Some(version);
            }
            continue;
        }

        if expecting != Expecting::None {
            match expecting {
                Expecting::Address => {
                    if let Some(value) = numeric_value(line) {
                        props.address = Some(value);
                    }
                }
                Expecting::BusNumber => {
                    if let Some(value) = numeric_value(line) {
                        props.bus_number = Some(value);
                    }
                }
                Expecting::BusDescription => {
                    if let Some(version) = usb_version_token(line) {
                        props.usb_version = Some(version);
                    }
                }
                Expecting::None => unreachable!(),
            }
            expecting = Expecting::None;
            continue;
        }

        if contains_ignore_case(line, ADDRESS_PROPERTY) {
            expecting = Expecting::Address;
        } else if contains_ignore_case(line, BUS_NUMBER_PROPERTY) {
            expecting = Expecting::BusNumber;
        } else if contains_ignore_case(line, BUS_DESCRIPTION_PROPERTY) {
            expecting = Expecting::BusDescription;
        }
        // Anything else is diagnostic noise.
    }

    if let Some((key, props)) = current {
        map.insert(key, props);
    }

    map
}
