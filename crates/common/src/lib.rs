//! Common utilities for rust-usb-watch
//!
//! This crate provides shared plumbing between the discovery library and
//! its consumers: error types, logging setup, the async channel bridge for
//! drive events crossing out of the watcher thread, and test helpers.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{EventFeed, EventStream, create_event_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
