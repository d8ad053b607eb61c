//! Drive change events and classification results

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveAction {
    /// A volume arrived (device configured and mounted).
    Inserted,
    /// A volume went away.
    Removed,
}

impl fmt::Display for DriveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveAction::Inserted => write!(f, "inserted"),
            DriveAction::Removed => write!(f, "removed"),
        }
    }
}

/// A validated volume change notification.
///
/// Produced only by the drive watcher and handed to the registered handler
/// exactly once; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEvent {
    pub action: DriveAction,
    /// Drive letter with colon, e.g. `"G:"`.
    pub drive_letter: String,
}

/// Result of the secondary drive-type confirmation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    /// Removable storage (the only kind the watcher surfaces insertions for).
    Removable,
    /// A volume of some other type sharing the notification channel.
    Other,
    /// The confirmation query failed or returned nothing.
    Unknown,
}
