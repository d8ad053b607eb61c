//! Shared data model for rust-usb-watch
//!
//! This crate defines the value types exchanged between the discovery
//! library, the watcher thread, and consumers such as the CLI: device
//! snapshots, drive change events, and volume capacity figures. Types here
//! are plain serde-serializable values with no I/O.

pub mod device;
pub mod event;
pub mod volume;

pub use device::DeviceRecord;
pub use event::{DriveAction, DriveEvent, DriveKind};
pub use volume::DiskSpace;
