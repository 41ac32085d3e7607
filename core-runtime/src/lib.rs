//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the cloud save sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the sync crates depend on.
//! It establishes the logging conventions, the fail-fast configuration
//! builder and the event channel the host UI listens on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{BatchEvent, CoreEvent, EventBus, EventStream, SyncEvent};
