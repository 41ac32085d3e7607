//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - [`RcloneSyncEngine`]: `SyncEngine` driving the `rclone` command line tool
//! - [`JsonSettingsStore`]: `SettingsStore` and `SelectionStore` backed by
//!   JSON files in the user's config directory
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{GameLocation, JsonSettingsStore, RcloneOptions, RcloneSyncEngine};
//! use std::sync::Arc;
//!
//! let settings = Arc::new(JsonSettingsStore::default_location()?);
//! let engine = RcloneSyncEngine::new(RcloneOptions::default()).with_settings(settings.clone());
//! engine
//!     .register_game("hades".into(), GameLocation::new(save_dir, "cloudsave/hades"))
//!     .await;
//! ```

mod engine;
mod settings;

pub use engine::{GameLocation, RcloneOptions, RcloneSyncEngine};
pub use settings::JsonSettingsStore;
