//! Volume capacity figures

use serde::{Deserialize, Serialize};

/// Total and free capacity of a mounted volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpace {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DiskSpace {
    /// Used fraction as a percentage, `0.0` for an empty or zero-sized volume.
    pub fn percent_used(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.free_bytes);
        (used as f64 / self.total_bytes as f64) * 100.0
    }

    /// Capacity in whole-number gibibytes, rounded to two decimals.
    pub fn total_gib(&self) -> f64 {
        (self.total_bytes as f64 / (1024.0 * 1024.0 * 1024.0) * 100.0).round() / 100.0
    }

    pub fn free_gib(&self) -> f64 {
        (self.free_bytes as f64 / (1024.0 * 1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}
