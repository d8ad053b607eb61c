//! Device enumeration provider
//!
//! Produces the current merged device list by combining the structured
//! device query with the diagnostic dump, filtered to storage-class
//! devices when asked, behind a short time-boxed cache.
//!
//! `list_devices` never fails: every failure mode in either source
//! degrades to missing fields or an empty list. Callers that care about
//! the difference between "no devices" and "query broken" must layer
//! their own diagnostics.

use crate::diag::parse_property_dump;
use crate::identity::{normalize_instance_path, serial, usb_version_token, vid_pid};
use crate::source::{DeviceQuery, DiagnosticSource};
use records::DeviceRecord;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Service binding that marks USB mass-storage devices.
pub const STORAGE_SERVICE: &str = "USBSTOR";

/// Default window during which a fetched list is reused.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3);

struct CacheEntry {
    fetched_at: Instant,
    only_storage: bool,
    devices: Vec<DeviceRecord>,
}

/// Lock-guarded enumeration cache with an injectable TTL.
///
/// A hit requires the same storage-filter flag and an entry younger than
/// the TTL. The cache is owned by its provider; nothing else writes to it.
pub struct DeviceCache {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl DeviceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Cached list, if one exists for the same filter flag and is younger
    /// than the TTL.
    pub fn lookup(&self, only_storage: bool) -> Option<Vec<DeviceRecord>> {
        let guard = self.entry.lock().unwrap();
        let entry = guard.as_ref()?;
        (entry.only_storage == only_storage && entry.fetched_at.elapsed() < self.ttl)
            .then(|| entry.devices.clone())
    }

    /// Replace the cache contents and timestamp with a fresh fetch.
    pub fn store(&self, only_storage: bool, devices: Vec<DeviceRecord>) {
        *self.entry.lock().unwrap() = Some(CacheEntry {
            fetched_at: Instant::now(),
            only_storage,
            devices,
        });
    }

    pub fn clear(&self) {
        *self.entry.lock().unwrap() = None;
    }
}

/// Merged, cached USB device enumeration.
pub struct DeviceProvider {
    query: Arc<dyn DeviceQuery>,
    diagnostics: Arc<dyn DiagnosticSource>,
    cache: DeviceCache,
}

impl DeviceProvider {
    pub fn new(query: Arc<dyn DeviceQuery>, diagnostics: Arc<dyn DiagnosticSource>) -> Self {
        Self::with_cache_ttl(query, diagnostics, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(
        query: Arc<dyn DeviceQuery>,
        diagnostics: Arc<dyn DiagnosticSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            query,
            diagnostics,
            cache: DeviceCache::new(ttl),
        }
    }

    /// Current device list, restricted to mass storage when `only_storage`.
    ///
    /// Within the cache TTL, repeated calls with the same flag return the
    /// cached list without touching either source. Concurrent callers may
    /// both miss and both query; the last write wins, which is harmless
    /// since both lists are equally fresh.
    pub fn list_devices(&self, only_storage: bool) -> Vec<DeviceRecord> {
        if let Some(devices) = self.cache.lookup(only_storage) {
            debug!("Returning {} devices from cache", devices.len());
            return devices;
        }

        let rows = self.query.usb_devices();
        let supplements = parse_property_dump(&self.diagnostics.capture());
        debug!(
            "Merging {} structured rows with {} diagnostic entries",
            rows.len(),
            supplements.len()
        );

        let mut devices = Vec::new();
        for row in rows {
            // Without an instance path there is no identity to merge on.
            let Some(instance_path) = row.instance_path else {
                continue;
            };

            if only_storage
                && !row
                    .service
                    .as_deref()
                    .is_some_and(|s| s.trim().eq_ignore_ascii_case(STORAGE_SERVICE))
            {
                continue;
            }

            let (vendor_id, product_id) = vid_pid(&instance_path);
            let serial_number = serial(&instance_path);

            let key = normalize_instance_path(&instance_path);
            let supplement = supplements.get(&key);
            let bus_number = supplement.and_then(|p| p.bus_number);
            let address = supplement.and_then(|p| p.address);
            let mut usb_version = supplement.and_then(|p| p.usb_version.clone());
            // The display name is the fallback version source.
            if usb_version.is_none() {
                usb_version = row.name.as_deref().and_then(usb_version_token);
            }

            devices.push(DeviceRecord {
                instance_path,
                vendor_id,
                product_id,
                manufacturer: row.manufacturer,
                product_name: row.name,
                serial_number,
                service: row.service,
                bus_number,
                address,
                usb_version,
            });
        }

        self.cache.store(only_storage, devices.clone());
        devices
    }

    /// Drop any cached list; the next call re-queries both sources.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}
