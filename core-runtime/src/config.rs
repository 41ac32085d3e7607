//! # Core Configuration Module
//!
//! Provides configuration management for the cloud save sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every bridge and tunable the sync core needs. It
//! enforces fail-fast validation so a missing collaborator is reported at
//! start-up instead of on the first sync.
//!
//! ## Required Dependencies
//!
//! - `SyncEngine` - Runs the external sync process
//! - `ConfirmationPrompt` - Confirms destructive cancel/close actions
//! - `SettingsStore` - Sync preferences (desktop default: JSON file)
//! - `SelectionStore` - Remembered multi-sync selection (desktop default: JSON file)
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Job timestamps (default: system clock)
//! - `LoggerSink` - Mirror of core logs for the host
//!
//! When the `desktop-shims` feature is enabled, a `JsonSettingsStore` rooted
//! in the user's config directory is injected for both stores if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .engine(Arc::new(my_engine))
//!     .confirmation_prompt(Arc::new(my_dialog))
//!     .poll_interval(Duration::from_millis(250))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No SyncEngine: fails with CapabilityMissing
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, ConfirmationPrompt, LoggerSink, SelectionStore, SettingsStore, SyncEngine, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Delay between two engine log polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Capacity of the event bus ring buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Score above which a non-matching candidate still survives search filtering.
pub const DEFAULT_SEARCH_SCORE: i32 = 150;

const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Core configuration for the cloud save sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// External sync engine (required)
    pub engine: Arc<dyn SyncEngine>,

    /// Sync preferences storage (required, desktop default)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Multi-sync selection storage (required, desktop default)
    pub selection_store: Arc<dyn SelectionStore>,

    /// User confirmation dialog (required)
    pub confirmation_prompt: Arc<dyn ConfirmationPrompt>,

    /// Time source for job timestamps
    pub clock: Arc<dyn Clock>,

    /// Optional host log mirror
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Directory the desktop stores live in, when overridden
    pub config_dir: Option<PathBuf>,

    /// Delay between two polls of the same run
    pub poll_interval: Duration,

    /// Event bus capacity
    pub event_buffer: usize,

    /// Fuzzy search keep-threshold for non-matching candidates
    pub search_threshold: i32,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("engine", &"SyncEngine { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("selection_store", &"SelectionStore { ... }")
            .field("confirmation_prompt", &"ConfirmationPrompt { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("config_dir", &self.config_dir)
            .field("poll_interval", &self.poll_interval)
            .field("event_buffer", &self.event_buffer)
            .field("search_threshold", &self.search_threshold)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Poll interval is non-zero and at most one minute
    /// - Event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "Poll interval must be greater than 0ms".to_string(),
            ));
        }

        if self.poll_interval > MAX_POLL_INTERVAL {
            return Err(Error::Config(
                "Poll interval exceeds maximum of 60 seconds".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(Error::Config(
                "Event buffer must hold at least one event".to_string(),
            ));
        }

        Ok(())
    }
}

fn engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SyncEngine".to_string(),
        message: "SyncEngine implementation is required to run syncs. \
                 Desktop: construct an RcloneSyncEngine with the game locations and inject it."
            .to_string(),
    }
}

fn prompt_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ConfirmationPrompt".to_string(),
        message: "ConfirmationPrompt implementation is required to confirm cancelling a sync. \
                 Inject the host dialog, or FixedConfirmation for headless use."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for sync preferences. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default JsonSettingsStore."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn selection_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SelectionStore".to_string(),
        message: "SelectionStore implementation is required to remember the multi-sync selection. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default JsonSettingsStore."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn desktop_store(config_dir: Option<&PathBuf>) -> Result<Arc<bridge_desktop::JsonSettingsStore>> {
    use bridge_desktop::JsonSettingsStore;

    let store = match config_dir {
        Some(dir) => JsonSettingsStore::new(dir),
        None => JsonSettingsStore::default_location().map_err(|e| {
            Error::Internal(format!("Failed to locate default settings directory: {}", e))
        })?,
    };
    Ok(Arc::new(store))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(config_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    let store: Arc<dyn SettingsStore> = desktop_store(config_dir)?;
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_config_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_selection_store(
    config_dir: Option<&PathBuf>,
) -> Result<Arc<dyn SelectionStore>> {
    let store: Arc<dyn SelectionStore> = desktop_store(config_dir)?;
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_selection_store(
    _config_dir: Option<&PathBuf>,
) -> Result<Arc<dyn SelectionStore>> {
    Err(selection_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    engine: Option<Arc<dyn SyncEngine>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    selection_store: Option<Arc<dyn SelectionStore>>,
    confirmation_prompt: Option<Arc<dyn ConfirmationPrompt>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    config_dir: Option<PathBuf>,
    poll_interval: Option<Duration>,
    event_buffer: Option<usize>,
    search_threshold: Option<i32>,
}

impl CoreConfigBuilder {
    /// Sets the sync engine implementation (required).
    pub fn engine(mut self, engine: Arc<dyn SyncEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the settings store implementation.
    ///
    /// If not provided, the desktop default (JSON file) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the selection store implementation.
    ///
    /// If not provided, the desktop default (JSON file) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn selection_store(mut self, store: Arc<dyn SelectionStore>) -> Self {
        self.selection_store = Some(store);
        self
    }

    /// Sets the confirmation dialog implementation (required).
    pub fn confirmation_prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.confirmation_prompt = Some(prompt);
        self
    }

    /// Overrides the clock used for job timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Mirrors core logs into a host sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Directory used by the desktop default stores.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .config_dir("/tmp/cloudsave");
    /// ```
    pub fn config_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_dir = Some(path.into());
        self
    }

    /// Sets the delay between two polls of the same run.
    ///
    /// Default: 250 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Sets the fuzzy search keep-threshold.
    ///
    /// Default: 150
    pub fn search_threshold(mut self, threshold: i32) -> Self {
        self.search_threshold = Some(threshold);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if a required bridge is missing (and has no desktop
    /// default) or a tunable is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let engine = self.engine.ok_or_else(engine_missing_error)?;

        let confirmation_prompt = self.confirmation_prompt.ok_or_else(prompt_missing_error)?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.config_dir.as_ref())?,
        };

        let selection_store = match self.selection_store {
            Some(store) => store,
            None => provide_default_selection_store(self.config_dir.as_ref())?,
        };

        let config = CoreConfig {
            engine,
            settings_store,
            selection_store,
            confirmation_prompt,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
            config_dir: self.config_dir,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            event_buffer: self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER),
            search_threshold: self.search_threshold.unwrap_or(DEFAULT_SEARCH_SCORE),
        };

        config.validate()?;

        Ok(config)
    }
}
