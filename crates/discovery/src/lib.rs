//! USB storage discovery and change notification
//!
//! This crate discovers removable USB storage devices attached to the host
//! and watches the OS volume-change stream for attach/detach events.
//!
//! Discovery merges two independent data sources into one record per
//! device: the structured device-management interface (fast, covers
//! identity and driver binding) and the diagnostic tool's property dump
//! (slow, covers bus topology and protocol version). The merged list is
//! cached for a short window so UI polling stays cheap.
//!
//! The watcher owns a dedicated notification thread with cooperative
//! cancellation; see [`watcher::DriveWatcher`].
//!
//! System access goes through the traits in [`source`], so everything
//! above that boundary is testable with mock sources on any platform. The
//! real backend ([`source::system`]) is Windows-only.

pub mod diag;
pub mod identity;
pub mod provider;
mod scan;
pub mod source;
pub mod volume;
pub mod watcher;

pub use provider::{DEFAULT_CACHE_TTL, DeviceCache, DeviceProvider, STORAGE_SERVICE};
pub use records::{DeviceRecord, DiskSpace, DriveAction, DriveEvent, DriveKind};
pub use watcher::{DriveWatcher, WatcherSettings, WatcherState};
