//! Umbrella crate for the cloud save core.
//!
//! Hosts depend on `cloudsave-workspace` and pick features instead of wiring
//! each crate: `desktop-shims` brings the service façade with the rclone
//! engine and JSON settings store, `search` the standalone fuzzy scorer.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "search")]
pub use core_search as search;
