//! Line-scanning helpers shared by the identity extractor and the
//! diagnostic dump parser. All matching is ASCII case-insensitive and
//! byte-offset based; markers are ASCII so offsets stay on char
//! boundaries.

/// Case-insensitive substring search, returning the byte offset of the
/// first match.
pub(crate) fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}

/// Match a `Label : value` line. The label must start the line (compared
/// case-insensitively), followed by optional blanks and a colon. Returns
/// the trimmed value, or `None` when the value is empty.
pub(crate) fn labeled_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let bytes = line.as_bytes();
    let lab = label.as_bytes();
    if bytes.len() < lab.len() || !bytes[..lab.len()].eq_ignore_ascii_case(lab) {
        return None;
    }
    let mut i = lab.len();
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b':' {
        return None;
    }
    let value = line[i + 1..].trim();
    (!value.is_empty()).then_some(value)
}

/// Extract a numeric property value from a line: the first `0x...` hex
/// token if present, otherwise the first run of digits enclosed in
/// parentheses. A token that does not parse yields `None`.
pub(crate) fn numeric_value(line: &str) -> Option<u32> {
    if let Some(at) = find_ignore_case(line, "0x") {
        let rest = &line.as_bytes()[at + 2..];
        let len = rest.iter().take_while(|b| b.is_ascii_hexdigit()).count();
        if len > 0 {
            return u32::from_str_radix(&line[at + 2..at + 2 + len], 16).ok();
        }
    }

    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'(' {
            continue;
        }
        let digits = bytes[i + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 && bytes.get(i + 1 + digits) == Some(&b')') {
            return line[i + 1..i + 1 + digits].parse().ok();
        }
    }
    None
}
