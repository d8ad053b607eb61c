//! Identity extraction from instance paths
//!
//! An instance path like `USB\VID_0951&PID_1666\001A92053B6A` carries the
//! vendor/product identity and, when it has the three-segment shape, the
//! device serial. Extraction is total: malformed input yields `None`,
//! never an error.

use crate::scan::find_ignore_case;

/// Normalized form of an instance path, used as the merge key between the
/// structured query and the diagnostic dump.
pub fn normalize_instance_path(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Extract `(vendor_id, product_id)` from an instance path.
///
/// Matches a `VID_xxxx` token followed anywhere later by `PID_yyyy` (four
/// hex digits each, any case). Both ids are returned together or not at
/// all, normalized to `0x` + lowercase hex.
pub fn vid_pid(instance_path: &str) -> (Option<String>, Option<String>) {
    let Some((vid_end, vid)) = hex_id_token(instance_path, "VID_", 0) else {
        return (None, None);
    };
    let Some((_, pid)) = hex_id_token(instance_path, "PID_", vid_end) else {
        return (None, None);
    };
    (Some(format!("0x{}", vid)), Some(format!("0x{}", pid)))
}

/// Find `marker` followed by exactly four hex digits, starting the search
/// at byte offset `from`. Returns the offset past the digits and the
/// lowercased digits. Occurrences of the marker without four hex digits
/// are skipped.
fn hex_id_token(s: &str, marker: &str, from: usize) -> Option<(usize, String)> {
    let mut at = from;
    while let Some(rel) = find_ignore_case(&s[at..], marker) {
        let start = at + rel + marker.len();
        let end = start + 4;
        if let Some(digits) = s.get(start..end) {
            if digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Some((end, digits.to_lowercase()));
            }
        }
        at += rel + 1;
    }
    None
}

/// Extract the serial number: the last segment of a path shaped exactly
/// `USB\<class>\<serial>`. Any other shape yields `None`.
pub fn serial(instance_path: &str) -> Option<String> {
    let mut parts = instance_path.split('\\');
    let bus = parts.next()?;
    let class = parts.next()?;
    let tail = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if !bus.eq_ignore_ascii_case("USB") || class.is_empty() || tail.is_empty() {
        return None;
    }
    Some(tail.to_string())
}

/// Find a USB protocol-version token (`2.0`, or `3.0` through `3.2`)
/// anywhere in the text.
pub fn usb_version_token(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 {
        return None;
    }
    for i in 0..bytes.len() - 2 {
        if bytes[i + 1] != b'.' {
            continue;
        }
        let matched = match bytes[i] {
            b'2' => bytes[i + 2] == b'0',
            b'3' => (b'0'..=b'2').contains(&bytes[i + 2]),
            _ => false,
        };
        if matched {
            return Some(text[i..i + 3].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vid_pid_standard_path() {
        let (vid, pid) = vid_pid("USB\\VID_0951&PID_1666\\001A92053B6A");
        assert_eq!(vid.as_deref(), Some("0x0951"));
        assert_eq!(pid.as_deref(), Some("0x1666"));
    }

    #[test]
    fn test_vid_pid_case_insensitive_and_lowercased() {
        let (vid, pid) = vid_pid("usb\\vid_ABCD&pid_EF01\\serial");
        assert_eq!(vid.as_deref(), Some("0xabcd"));
        assert_eq!(pid.as_deref(), Some("0xef01"));
    }

    #[test]
    fn test_vid_pid_requires_both() {
        assert_eq!(vid_pid("USB\\VID_1234\\X"), (None, None));
        assert_eq!(vid_pid("USB\\PID_5678\\X"), (None, None));
        assert_eq!(vid_pid(""), (None, None));
    }

    #[test]
    fn test_vid_pid_pid_must_follow_vid() {
        // PID before VID does not satisfy the pattern.
        assert_eq!(vid_pid("PID_5678&VID_1234"), (None, None));
    }

    #[test]
    fn test_vid_pid_skips_short_tokens() {
        let (vid, pid) = vid_pid("VID_12&VID_1234&PID_5678");
        assert_eq!(vid.as_deref(), Some("0x1234"));
        assert_eq!(pid.as_deref(), Some("0x5678"));
    }

    #[test]
    fn test_serial_three_segments() {
        assert_eq!(
            serial("USB\\VID_0951&PID_1666\\001A92053B6A").as_deref(),
            Some("001A92053B6A")
        );
        assert_eq!(serial("usb\\x\\y").as_deref(), Some("y"));
    }

    #[test]
    fn test_serial_rejects_other_shapes() {
        assert_eq!(serial("USB\\VID_0951&PID_1666"), None);
        assert_eq!(serial("USB\\a\\b\\c"), None);
        assert_eq!(serial("PCI\\x\\y"), None);
        assert_eq!(serial(""), None);
    }

    #[test]
    fn test_usb_version_token() {
        assert_eq!(usb_version_token("USB 3.0 Mass Storage").as_deref(), Some("3.0"));
        assert_eq!(usb_version_token("SuperSpeed 3.2 Gen 2").as_deref(), Some("3.2"));
        assert_eq!(usb_version_token("USB 2.0 Hub").as_deref(), Some("2.0"));
        assert_eq!(usb_version_token("USB 3.5 device"), None);
        assert_eq!(usb_version_token("plain disk"), None);
        assert_eq!(usb_version_token(""), None);
    }
}
